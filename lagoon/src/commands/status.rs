//! `lagoon status`

use anyhow::Result;
use lagoon_core::{ConfigError, EnvironmentSpec, ProjectPaths};
use lagoon_sandbox::env::cached_environment;

pub fn cmd_status() -> Result<()> {
    let root = std::env::current_dir()?;
    let spec = match EnvironmentSpec::read_from_project(&root) {
        Ok(s) => s,
        Err(ConfigError::NotFound(_)) => {
            eprintln!("⚠ no lagoon.toml found; create one in the project root");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let paths = ProjectPaths::for_project(&root);

    println!("  packages: {}", spec.packages.join(" "));
    println!("  profile:  {}", spec.profile);
    if let Some(hook) = &spec.on_enter {
        println!("  on_enter: {}", hook);
    }
    println!("  cache:    {}", paths.cache_dir.display());

    match cached_environment(&spec, &paths)? {
        Some((_, fingerprint)) => {
            println!("✓ cached ({}); next 'lagoon shell' starts instantly", fingerprint)
        }
        None => println!("⚠ not cached; run 'lagoon shell' to build"),
    }
    Ok(())
}
