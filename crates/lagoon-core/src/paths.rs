//! Per-project cache directory layout.
//!
//! `<cache_root>/<project id>/` holds the generated descriptor, the resolution
//! cache record, the closure baseline and the running-sandbox pid record.

use crate::config::CacheConfig;
use crate::fingerprint::project_id;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "shell.nix";
pub const CACHE_RECORD_FILE: &str = "env.json";
pub const CLOSURE_BASELINE_FILE: &str = "closure.fingerprint";
pub const PID_FILE: &str = "pid.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Absolute project root (bound into the sandbox)
    pub project: PathBuf,
    /// Per-project cache directory
    pub cache_dir: PathBuf,
}

impl ProjectPaths {
    /// Layout under an explicit cache root.
    pub fn with_root(project: &Path, cache_root: &Path) -> Self {
        let id = project_id(&project.to_string_lossy());
        Self {
            project: project.to_path_buf(),
            cache_dir: cache_root.join(id),
        }
    }

    /// Layout under the configured cache root (see [`CacheConfig::root`]).
    pub fn for_project(project: &Path) -> Self {
        Self::with_root(project, &CacheConfig::root())
    }

    pub fn descriptor(&self) -> PathBuf {
        self.cache_dir.join(DESCRIPTOR_FILE)
    }

    pub fn cache_record(&self) -> PathBuf {
        self.cache_dir.join(CACHE_RECORD_FILE)
    }

    pub fn closure_baseline(&self) -> PathBuf {
        self.cache_dir.join(CLOSURE_BASELINE_FILE)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.cache_dir.join(PID_FILE)
    }
}
