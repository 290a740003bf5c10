//! `lagoon verify`: compare the environment's closure against its baseline.

use anyhow::{bail, Result};
use lagoon_core::config::ToolsConfig;
use lagoon_sandbox::closure::{closure_paths, verify_against_baseline, Verification};
use lagoon_sandbox::env::cached_environment;

use super::Project;

pub fn cmd_verify() -> Result<()> {
    let project = Project::current()?;
    let tools = ToolsConfig::from_env();

    let Some((env, _)) = cached_environment(&project.spec, &project.paths)? else {
        bail!("no cached environment; run 'lagoon shell' first to build it");
    };

    let paths = closure_paths(&env, &tools)?;
    let baseline_path = project.paths.closure_baseline();

    match verify_against_baseline(&paths, &baseline_path)? {
        Verification::BaselineCreated { current, paths } => {
            eprintln!("✓ baseline set: {} paths, fingerprint: {}…", paths, &current[..16]);
            eprintln!("  run 'lagoon verify' again to check against this baseline");
            Ok(())
        }
        Verification::Matches { current, paths } => {
            eprintln!(
                "✓ verified: {} paths, fingerprint: {}… matches baseline",
                paths,
                &current[..16]
            );
            Ok(())
        }
        Verification::Changed { baseline, current, .. } => {
            eprintln!("✗ environment has changed since baseline was set");
            eprintln!("  baseline:  {}…", prefix(&baseline));
            eprintln!("  current:   {}…", &current[..16]);
            eprintln!(
                "  if this is expected, delete the baseline: rm {}",
                baseline_path.display()
            );
            bail!("verification failed")
        }
    }
}

/// First 16 chars of a stored fingerprint, which may be short if hand-edited.
fn prefix(s: &str) -> &str {
    s.get(..16).unwrap_or(s)
}
