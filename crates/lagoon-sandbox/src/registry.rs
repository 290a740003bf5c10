//! Running-sandbox registry: one `pid.json` per project cache directory,
//! written just before the sandbox replaces the lagoon process.

use chrono::Utc;
use lagoon_core::paths::PID_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRecord {
    pub pid: u32,
    pub project: String,
    pub packages: Vec<String>,
    /// RFC 3339
    pub started: String,
}

impl SandboxRecord {
    pub fn for_current_process(project: &Path, packages: &[String]) -> Self {
        Self {
            pid: std::process::id(),
            project: project.to_string_lossy().to_string(),
            packages: packages.to_vec(),
            started: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }

    pub fn write(&self, cache_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let data = serde_json::to_vec(self).map_err(std::io::Error::other)?;
        std::fs::write(cache_dir.join(PID_FILE), data)
    }

    pub fn read(path: &Path) -> Option<Self> {
        let data = std::fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

/// Every readable record under `<cache_root>/*/pid.json`.
pub fn scan(cache_root: &Path) -> Vec<(PathBuf, SandboxRecord)> {
    let Ok(entries) = std::fs::read_dir(cache_root) else {
        return Vec::new();
    };
    let mut found: Vec<(PathBuf, SandboxRecord)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(PID_FILE))
        .filter_map(|p| SandboxRecord::read(&p).map(|r| (p, r)))
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

/// Whether `pid` names a live process (signal 0 probe).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => kill(Pid::from_raw(raw), None).is_ok(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Resident memory of a process in bytes, from `/proc/<pid>/status` VmRSS.
#[cfg(target_os = "linux")]
pub fn process_memory(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
pub fn process_memory(_pid: u32) -> Option<u64> {
    None
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    for line in status.lines() {
        if line.starts_with("VmRSS:") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(rss_kb) = parts[1].parse::<u64>() {
                    return Some(rss_kb * 1024);
                }
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_scan() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("aaaa0000");
        let b = tmp.path().join("bbbb1111");
        SandboxRecord::for_current_process(Path::new("/home/u/a"), &["jq".to_string()])
            .write(&a)
            .unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join(PID_FILE), b"garbage").unwrap();
        std::fs::create_dir_all(tmp.path().join("cccc2222")).unwrap();

        let found = scan(tmp.path());
        assert_eq!(found.len(), 1);
        let (path, record) = &found[0];
        assert_eq!(path, &a.join(PID_FILE));
        assert_eq!(record.pid, std::process::id());
        assert_eq!(record.packages, vec!["jq"]);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.started).is_ok());
    }

    #[test]
    fn test_scan_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(&tmp.path().join("nope")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tbash\nVmPeak:\t  9000 kB\nVmRSS:\t  2048 kB\nThreads:\t1\n";
        assert_eq!(parse_vm_rss(status), Some(2048 * 1024));
        assert_eq!(parse_vm_rss("Name:\tbash\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_own_memory_is_readable() {
        assert!(process_memory(std::process::id()).unwrap_or(0) > 0);
    }
}
