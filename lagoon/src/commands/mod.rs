//! CLI commands. Each one is thin glue over lagoon-core and lagoon-sandbox.
//!
//! `shell` and `run` exec into the sandbox, `watch` supervises a restarting
//! child, and the rest inspect the cache and the sandbox registry.

pub mod clean;
pub mod run;
pub mod shell;
pub mod stats;
pub mod status;
pub mod verify;
pub mod watch;

use anyhow::{Context, Result};
use lagoon_core::config::{HostIdentity, ToolsConfig};
use lagoon_core::{EnvironmentSpec, ProjectPaths};
use lagoon_sandbox::env::{self, NixShellResolver, PreparedEnvironment, PROGRESS_CAPACITY};
use lagoon_sandbox::{LaunchOptions, MemoryLimit};
use std::path::PathBuf;
use std::sync::mpsc::sync_channel;
use std::thread;

use crate::cli::SandboxArgs;

/// The project in the current directory: root, parsed config, cache layout.
pub struct Project {
    pub root: PathBuf,
    pub spec: EnvironmentSpec,
    pub paths: ProjectPaths,
}

impl Project {
    pub fn current() -> Result<Self> {
        let root = std::env::current_dir().context("getting working directory")?;
        let spec = EnvironmentSpec::read_from_project(&root)?;
        let paths = ProjectPaths::for_project(&root);
        Ok(Self { root, spec, paths })
    }
}

/// Resolve (or load from cache) the project's environment, echoing resolver
/// progress to stderr while it runs.
pub fn prepare(project: &Project, tools: &ToolsConfig) -> Result<PreparedEnvironment> {
    let resolver = NixShellResolver::new(tools.clone());
    let (tx, rx) = sync_channel::<String>(PROGRESS_CAPACITY);
    let printer = thread::spawn(move || {
        for line in rx {
            eprintln!("  · {}", line.trim());
        }
    });
    let prepared = env::prepare_environment(&project.spec, &project.paths, &resolver, tx);
    let _ = printer.join();
    let prepared = prepared?;
    if prepared.cache_hit {
        eprintln!("✓ environment ready");
    } else {
        eprintln!("✓ environment built ({})", prepared.fingerprint);
    }
    Ok(prepared)
}

/// Validate the sandbox flags and turn them into launch options.
pub fn launch_options(
    args: &SandboxArgs,
    command: Option<String>,
    tools: &ToolsConfig,
) -> Result<LaunchOptions> {
    let memory = args.memory.as_deref().map(MemoryLimit::parse).transpose()?;
    let mut options = LaunchOptions::new(HostIdentity::from_env(), tools.store_prefix.clone());
    options.command = command;
    options.memory = memory;
    options.extra_env = args.env.clone();
    Ok(options)
}
