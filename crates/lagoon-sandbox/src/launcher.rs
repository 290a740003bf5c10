//! Launch an isolation spec: replace the current process (`enter`) or spawn a
//! supervised child (`start`). Memory-limited launches run bwrap inside a
//! transient `systemd-run --scope`.

use lagoon_core::config::ToolsConfig;
use regex::Regex;
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use thiserror::Error;

use crate::bwrap::IsolationSpec;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{tool} not found.\n  install: {hint}")]
    ToolUnavailable { tool: String, hint: &'static str },

    #[error("--memory requires {tool} (not found on this system)")]
    MemoryRequiresSystemd { tool: String },

    #[error("invalid memory limit {0:?}: expected a number followed by K, M, G or T (e.g. 512m, 2g)")]
    InvalidMemoryLimit(String),

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Validated `MemoryMax=` value, e.g. `512M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLimit(String);

fn memory_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i)[0-9]+[KMGT]$").expect("static regex"))
}

impl MemoryLimit {
    pub fn parse(raw: &str) -> Result<Self, LaunchError> {
        let trimmed = raw.trim();
        if !memory_re().is_match(trimmed) {
            return Err(LaunchError::InvalidMemoryLimit(raw.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully resolved program + argv, ready to exec or spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Runs isolation specs through `bwrap`.
#[derive(Debug, Clone)]
pub struct BwrapLauncher {
    tools: ToolsConfig,
}

impl BwrapLauncher {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    /// Look up the tools and assemble the final argv. No side effects.
    pub fn invocation(
        &self,
        isolation: &IsolationSpec,
        memory: Option<&MemoryLimit>,
    ) -> Result<Invocation, LaunchError> {
        let bwrap = which::which(&self.tools.bwrap).map_err(|_| LaunchError::ToolUnavailable {
            tool: self.tools.bwrap.clone(),
            hint: "sudo apt install bubblewrap",
        })?;
        let bwrap_args = isolation.to_args();

        match memory {
            None => Ok(Invocation {
                program: bwrap,
                args: bwrap_args,
            }),
            Some(limit) => {
                let systemd_run = which::which(&self.tools.systemd_run).map_err(|_| {
                    LaunchError::MemoryRequiresSystemd {
                        tool: self.tools.systemd_run.clone(),
                    }
                })?;
                Ok(Invocation {
                    program: systemd_run,
                    args: scoped_args(limit, &bwrap.to_string_lossy(), bwrap_args),
                })
            }
        }
    }

    /// Replace the current process with the sandbox. Only returns on failure.
    #[cfg(unix)]
    pub fn enter(
        &self,
        isolation: &IsolationSpec,
        memory: Option<&MemoryLimit>,
    ) -> Result<Infallible, LaunchError> {
        use std::os::unix::process::CommandExt;

        let invocation = self.invocation(isolation, memory)?;
        tracing::debug!(program = %invocation.program.display(), "exec sandbox");
        let source = invocation.command().exec();
        Err(LaunchError::Exec {
            program: invocation.program.to_string_lossy().to_string(),
            source,
        })
    }

    /// Spawn the sandbox as a child: stdin null, stdout/stderr inherited.
    pub fn start(
        &self,
        isolation: &IsolationSpec,
        memory: Option<&MemoryLimit>,
    ) -> Result<Child, LaunchError> {
        let invocation = self.invocation(isolation, memory)?;
        invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program: invocation.program.to_string_lossy().to_string(),
                source: e,
            })
    }
}

/// `systemd-run` argv wrapping bwrap in a transient scope with `MemoryMax`.
fn scoped_args(limit: &MemoryLimit, bwrap: &str, bwrap_args: Vec<String>) -> Vec<String> {
    let mut args = vec![
        "--scope".to_string(),
        "-p".to_string(),
        format!("MemoryMax={}", limit),
        "--".to_string(),
        bwrap.to_string(),
    ];
    args.extend(bwrap_args);
    args
}

/// Something that can (re)start the supervised child. Watch mode holds one of
/// these and calls it on every restart.
pub trait ChildLauncher: Send + Sync {
    fn launch(&self) -> Result<Child, LaunchError>;

    /// Human-readable command line, for logs.
    fn command_line(&self) -> &str;
}

/// A prepared sandbox launch, reusable across restarts.
#[derive(Debug, Clone)]
pub struct SandboxCommand {
    pub launcher: BwrapLauncher,
    pub isolation: IsolationSpec,
    pub memory: Option<MemoryLimit>,
    pub display: String,
}

impl ChildLauncher for SandboxCommand {
    fn launch(&self) -> Result<Child, LaunchError> {
        self.launcher.start(&self.isolation, self.memory.as_ref())
    }

    fn command_line(&self) -> &str {
        &self.display
    }
}
