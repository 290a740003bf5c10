//! Closure verification: fingerprint every store path the environment
//! depends on and compare against a stored baseline.

use lagoon_core::config::ToolsConfig;
use lagoon_core::fingerprint::closure_fingerprint;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::env::ResolvedEnvironment;

#[derive(Debug, Error)]
pub enum ClosureError {
    #[error("{tool} not found; closure verification needs nix")]
    ToolUnavailable { tool: String },

    #[error("no nix store paths in environment PATH")]
    NoRoots,

    #[error("{tool} failed: {stderr}")]
    QueryFailed { tool: String, stderr: String },

    #[error("running {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("baseline {}: {source}", path.display())]
    Baseline {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of [`verify_against_baseline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No baseline existed; `current` was written as the new one.
    BaselineCreated { current: String, paths: usize },
    Matches { current: String, paths: usize },
    Changed {
        baseline: String,
        current: String,
        paths: usize,
    },
}

/// Top-level store paths behind the search path: the parent of each entry,
/// deduplicated, first-seen order.
pub fn env_store_paths(env: &ResolvedEnvironment, store: &Path) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut roots = Vec::new();
    for entry in env.path.split(':') {
        let Some(parent) = Path::new(entry).parent() else {
            continue;
        };
        if parent != store && parent.starts_with(store) {
            let s = parent.to_string_lossy().to_string();
            if seen.insert(s.clone()) {
                roots.push(s);
            }
        }
    }
    roots
}

/// Full transitive closure of the environment, via `nix-store -qR`.
pub fn closure_paths(env: &ResolvedEnvironment, tools: &ToolsConfig) -> Result<Vec<String>, ClosureError> {
    let roots = env_store_paths(env, &tools.store_prefix);
    if roots.is_empty() {
        return Err(ClosureError::NoRoots);
    }
    let program = which::which(&tools.nix_store).map_err(|_| ClosureError::ToolUnavailable {
        tool: tools.nix_store.clone(),
    })?;
    let output = Command::new(&program)
        .arg("-qR")
        .args(&roots)
        .output()
        .map_err(|e| ClosureError::Spawn {
            tool: tools.nix_store.clone(),
            source: e,
        })?;
    if !output.status.success() {
        return Err(ClosureError::QueryFailed {
            tool: tools.nix_store.clone(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(String::from)
        .collect())
}

/// Compare the fingerprint of `paths` with the baseline at `baseline_path`,
/// creating the baseline on first use.
pub fn verify_against_baseline(paths: &[String], baseline_path: &Path) -> Result<Verification, ClosureError> {
    let current = closure_fingerprint(paths);
    let count = paths.iter().collect::<BTreeSet<_>>().len();
    match std::fs::read_to_string(baseline_path) {
        Ok(stored) => {
            let stored = stored.trim().to_string();
            if stored == current {
                Ok(Verification::Matches {
                    current,
                    paths: count,
                })
            } else {
                Ok(Verification::Changed {
                    baseline: stored,
                    current,
                    paths: count,
                })
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = baseline_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ClosureError::Baseline {
                    path: baseline_path.to_path_buf(),
                    source: e,
                })?;
            }
            std::fs::write(baseline_path, &current).map_err(|e| ClosureError::Baseline {
                path: baseline_path.to_path_buf(),
                source: e,
            })?;
            Ok(Verification::BaselineCreated {
                current,
                paths: count,
            })
        }
        Err(e) => Err(ClosureError::Baseline {
            path: baseline_path.to_path_buf(),
            source: e,
        }),
    }
}
