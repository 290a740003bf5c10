//! Environment variable key constants.
//!
//! Primary variables use the `LAGOON_*` prefix.

/// Cache directory
pub mod cache {
    pub const LAGOON_CACHE_DIR: &str = "LAGOON_CACHE_DIR";
}

/// Observability and logging
pub mod observability {
    pub const LAGOON_QUIET: &str = "LAGOON_QUIET";
    pub const LAGOON_LOG_LEVEL: &str = "LAGOON_LOG_LEVEL";
    pub const LAGOON_LOG_JSON: &str = "LAGOON_LOG_JSON";
    pub const LAGOON_AUDIT_LOG: &str = "LAGOON_AUDIT_LOG";
}

/// External tool overrides (program names or absolute paths)
pub mod tools {
    pub const LAGOON_BWRAP: &str = "LAGOON_BWRAP";
    pub const LAGOON_NIX_SHELL: &str = "LAGOON_NIX_SHELL";
    pub const LAGOON_NIX_STORE: &str = "LAGOON_NIX_STORE";
    pub const LAGOON_SYSTEMD_RUN: &str = "LAGOON_SYSTEMD_RUN";
}

/// Watch mode timings
pub mod watch {
    pub const LAGOON_WATCH_DEBOUNCE_MS: &str = "LAGOON_WATCH_DEBOUNCE_MS";
    pub const LAGOON_WATCH_GRACE_MS: &str = "LAGOON_WATCH_GRACE_MS";
}

/// Host variables forwarded into the sandbox defaults
pub mod host {
    pub const TERM: &str = "TERM";
    pub const USER: &str = "USER";
    pub const USER_ALIASES: &[&str] = &["LOGNAME"];
}
