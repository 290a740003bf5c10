//! Configuration structs grouped by concern.
//!
//! Loaded from environment variables with a uniform fallback policy, then
//! passed explicitly to the components that need them.

use super::env_keys::{cache, host, observability as obv_keys, tools, watch};
use super::loader::{env_bool, env_optional, env_or, env_u64};
use std::path::PathBuf;
use std::time::Duration;

/// Default debounce window for watch mode.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default grace period between SIGTERM and SIGKILL when stopping a child.
pub const DEFAULT_GRACE_MS: u64 = 500;

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            let quiet = env_bool(obv_keys::LAGOON_QUIET, &[], false);
            let log_level = env_or(obv_keys::LAGOON_LOG_LEVEL, &[], || {
                "lagoon=warn".to_string()
            });
            let log_json = env_bool(obv_keys::LAGOON_LOG_JSON, &[], false);
            let audit_log = env_optional(obv_keys::LAGOON_AUDIT_LOG, &[]);
            Self {
                quiet,
                log_level,
                log_json,
                audit_log,
            }
        })
    }
}

/// Cache root configuration
#[derive(Debug, Clone)]
pub struct CacheConfig;

impl CacheConfig {
    /// Explicit override from `LAGOON_CACHE_DIR`, if any.
    pub fn cache_dir() -> Option<String> {
        env_optional(cache::LAGOON_CACHE_DIR, &[])
    }

    /// `<base>/lagoon`, where base is `$LAGOON_CACHE_DIR` or the platform
    /// cache dir (`$XDG_CACHE_HOME`, falling back to `~/.cache`).
    pub fn root() -> PathBuf {
        let base = match Self::cache_dir() {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir().unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".cache")
            }),
        };
        base.join("lagoon")
    }
}

/// External tools and trust anchors used by the resolver and launcher.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Isolation executor (bubblewrap)
    pub bwrap: String,
    /// Declarative package resolver
    pub nix_shell: String,
    /// Store query tool used by closure verification
    pub nix_store: String,
    /// Resource-scoping executor used for memory limits
    pub systemd_run: String,
    /// Trusted, read-only store every sandboxed executable must come from
    pub store_prefix: PathBuf,
    /// File name of the shell located inside the resolved environment
    pub shell_name: String,
    /// File name of the core utility used for `/usr/bin/env` lookups
    pub coreutil_name: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bwrap: "bwrap".to_string(),
            nix_shell: "nix-shell".to_string(),
            nix_store: "nix-store".to_string(),
            systemd_run: "systemd-run".to_string(),
            store_prefix: PathBuf::from("/nix/store"),
            shell_name: "bash".to_string(),
            coreutil_name: "env".to_string(),
        }
    }
}

impl ToolsConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bwrap: env_or(tools::LAGOON_BWRAP, &[], || d.bwrap.clone()),
            nix_shell: env_or(tools::LAGOON_NIX_SHELL, &[], || d.nix_shell.clone()),
            nix_store: env_or(tools::LAGOON_NIX_STORE, &[], || d.nix_store.clone()),
            systemd_run: env_or(tools::LAGOON_SYSTEMD_RUN, &[], || d.systemd_run.clone()),
            ..d
        }
    }
}

/// Watch mode timings
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub debounce: Duration,
    pub grace: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
        }
    }
}

impl WatchConfig {
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_u64(
                watch::LAGOON_WATCH_DEBOUNCE_MS,
                &[],
                DEFAULT_DEBOUNCE_MS,
            )),
            grace: Duration::from_millis(env_u64(
                watch::LAGOON_WATCH_GRACE_MS,
                &[],
                DEFAULT_GRACE_MS,
            )),
        }
    }
}

/// Host identity values copied into the sandbox's default environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub term: String,
    pub user: String,
}

impl HostIdentity {
    pub fn from_env() -> Self {
        Self {
            term: env_or(host::TERM, &[], || "dumb".to_string()),
            user: env_or(host::USER, host::USER_ALIASES, || "lagoon".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_default_store_prefix() {
        let t = ToolsConfig::default();
        assert_eq!(t.store_prefix, PathBuf::from("/nix/store"));
        assert_eq!(t.shell_name, "bash");
        assert_eq!(t.coreutil_name, "env");
    }

    #[test]
    fn test_watch_defaults() {
        let w = WatchConfig::default();
        assert_eq!(w.debounce, Duration::from_millis(300));
        assert_eq!(w.grace, Duration::from_millis(500));
    }
}
