//! Unified configuration layer.
//!
//! All environment variable reads are centralised here; the rest of the code
//! consumes structured config values that are passed in explicitly.
//!
//! - `loader`: env_or, env_optional, env_bool helpers
//! - `schema`: ObservabilityConfig, CacheConfig, ToolsConfig, WatchConfig
//! - `env_keys`: key constants

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_u64};
pub use schema::{
    CacheConfig, HostIdentity, ObservabilityConfig, ToolsConfig, WatchConfig,
    DEFAULT_DEBOUNCE_MS, DEFAULT_GRACE_MS,
};
