//! `lagoon stats`: running sandboxes and their memory use.

use anyhow::Result;
use lagoon_core::config::CacheConfig;
use lagoon_sandbox::registry::{is_alive, process_memory, scan};

pub fn cmd_stats() -> Result<()> {
    if !cfg!(target_os = "linux") {
        eprintln!("⚠ lagoon stats is only available on Linux (/proc required)");
        return Ok(());
    }

    let records = scan(&CacheConfig::root());
    if records.is_empty() {
        println!("  no sandboxes found");
        return Ok(());
    }

    let mut running = 0;
    for (_, record) in records.iter().filter(|(_, r)| is_alive(r.pid)) {
        let mem = process_memory(record.pid)
            .map(|b| format!("{} MiB", b / (1024 * 1024)))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  ● pid {:<6}  {:<8}  {}",
            record.pid,
            mem,
            record.packages.join(" ")
        );
        println!("     {}  (since {})", record.project, record.started);
        running += 1;
    }

    if running == 0 {
        println!("  no sandboxes currently running");
    } else {
        println!("\n  {} sandbox(es) running", running);
    }
    Ok(())
}
