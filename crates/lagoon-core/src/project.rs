//! Project-local declarative config (`lagoon.toml`).
//!
//! Read once per invocation and treated as immutable afterwards. Writing the
//! file is the init wizard's job; this module only parses and validates it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "lagoon.toml";

/// Isolation profile: whether the sandbox keeps a network namespace of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Minimal,
    Network,
}

impl Profile {
    pub fn network_enabled(self) -> bool {
        matches!(self, Profile::Network)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Minimal => f.write_str("minimal"),
            Profile::Network => f.write_str("network"),
        }
    }
}

/// The user's declared environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Package attribute names, in declared order.
    pub packages: Vec<String>,
    /// Pinned nixpkgs revision.
    pub nixpkgs_commit: String,
    /// Content hash of the pinned nixpkgs tarball.
    pub nixpkgs_sha256: String,
    #[serde(default)]
    pub profile: Profile,
    /// Command run inside the sandbox before the shell or one-shot command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no lagoon.toml found at {}. run 'lagoon init' first", .0.display())]
    NotFound(PathBuf),

    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("lagoon.toml: {0}")]
    Invalid(String),
}

fn attr_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_'-]*(\.[A-Za-z_][A-Za-z0-9_'-]*)*$")
            .expect("static regex")
    })
}

fn pin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9:+/=._-]+$").expect("static regex"))
}

impl EnvironmentSpec {
    /// Read and validate `lagoon.toml` at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let spec: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        spec.validate()
    }

    /// Read `lagoon.toml` from a project root.
    pub fn read_from_project(project: &Path) -> Result<Self, ConfigError> {
        Self::read(&project.join(CONFIG_FILENAME))
    }

    /// Normalise and check every field that ends up inside the generated
    /// descriptor. Values are interpolated into a Nix expression, so anything
    /// outside the allowed character sets is rejected.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.packages.is_empty() {
            return Err(ConfigError::Invalid("packages list is empty".to_string()));
        }
        for pkg in &mut self.packages {
            *pkg = pkg.trim().to_string();
            if !attr_path_re().is_match(pkg) {
                return Err(ConfigError::Invalid(format!(
                    "invalid package name {:?}",
                    pkg
                )));
            }
        }
        for (field, value) in [
            ("nixpkgs_commit", &self.nixpkgs_commit),
            ("nixpkgs_sha256", &self.nixpkgs_sha256),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} is empty", field)));
            }
            if !pin_re().is_match(value.trim()) {
                return Err(ConfigError::Invalid(format!(
                    "{} contains unexpected characters: {:?}",
                    field, value
                )));
            }
        }
        self.nixpkgs_commit = self.nixpkgs_commit.trim().to_string();
        self.nixpkgs_sha256 = self.nixpkgs_sha256.trim().to_string();
        self.on_enter = self
            .on_enter
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(self)
    }
}
