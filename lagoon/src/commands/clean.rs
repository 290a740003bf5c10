//! `lagoon clean`: remove this project's cache directory.
//!
//! The directory holds the generated shell.nix, the resolution cache, the
//! closure baseline and the pid record; everything is rebuilt on demand.

use anyhow::{Context, Result};
use lagoon_core::ProjectPaths;
use std::fs;
use std::path::Path;

pub fn cmd_clean() -> Result<()> {
    let root = std::env::current_dir().context("getting working directory")?;
    let paths = ProjectPaths::for_project(&root);
    let dir = &paths.cache_dir;

    if !dir.exists() {
        eprintln!("No cache found for this project.");
        return Ok(());
    }
    let size = dir_size(dir);
    fs::remove_dir_all(dir).with_context(|| format!("removing cache {}", dir.display()))?;
    eprintln!("✓ Removed cache {}, freed {}", dir.display(), format_size(size));
    Ok(())
}

/// Compute total size of a directory recursively.
fn dir_size(path: &Path) -> u64 {
    let mut total: u64 = 0;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let p = entry.path();
            if p.is_dir() {
                total += dir_size(&p);
            } else if let Ok(meta) = p.metadata() {
                total += meta.len();
            }
        }
    }
    total
}

/// Format byte size to human-readable string.
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
