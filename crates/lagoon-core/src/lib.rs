pub mod config;
pub mod fingerprint;
pub mod observability;
pub mod paths;
pub mod project;

pub use paths::ProjectPaths;
pub use project::{ConfigError, EnvironmentSpec, Profile, CONFIG_FILENAME};
