//! Materialise a descriptor into concrete executable paths via `nix-shell`.
//!
//! Stdout carries the answer (`which bash`, `which env`, `$PATH`). Stderr is
//! buffered for diagnostics and scanned on a separate thread for progress
//! lines, which are offered to a bounded channel without ever blocking.

use lagoon_core::config::ToolsConfig;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::SyncSender;
use std::sync::OnceLock;
use std::thread;
use thiserror::Error;

use super::ResolvedEnvironment;

/// Capacity of the progress channel handed to resolvers.
pub const PROGRESS_CAPACITY: usize = 50;

/// Stderr lines containing any of these (case-insensitive) are forwarded as progress.
pub const PROGRESS_KEYWORDS: &[&str] = &[
    "fetching",
    "downloading",
    "building",
    "copying",
    "error",
    "warning",
];

pub const PACKAGE_SEARCH_URL: &str = "https://search.nixos.org/packages";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("nix not found.\n  install: sh <(curl -L https://nixos.org/nix/install) --no-daemon\n  then: source ~/.nix-profile/etc/profile.d/nix.sh")]
    ToolUnavailable { tool: String },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reading nix-shell output: {0}")]
    Io(#[from] std::io::Error),

    #[error("package not found: {name}\n  search for the correct name at: https://search.nixos.org/packages\n  then update your lagoon.toml")]
    PackageNotFound { name: String },

    #[error("nix-shell failed\n--- raw nix output ---\n{raw}")]
    Failed { raw: String },

    #[error("nix-shell output was unexpected:\n{raw}")]
    UnexpectedOutput { raw: String },

    #[error("could not find bash/env in nix-shell output:\n{raw}")]
    MissingExecutables { raw: String },

    #[error("no nix store paths found in PATH; nix-shell may have failed silently")]
    NoStorePaths { raw: String },
}

/// Extension point for environment resolution.
///
/// The real implementation shells out to `nix-shell`; tests substitute their
/// own. `progress` is consumed, so it is closed when `resolve` returns.
pub trait EnvironmentResolver: Send + Sync {
    fn resolve(
        &self,
        descriptor: &Path,
        progress: SyncSender<String>,
    ) -> Result<ResolvedEnvironment, ResolveError>;
}

/// Resolver backed by the `nix-shell` executable.
#[derive(Debug, Clone)]
pub struct NixShellResolver {
    tools: ToolsConfig,
}

impl NixShellResolver {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    fn program(&self) -> Result<PathBuf, ResolveError> {
        which::which(&self.tools.nix_shell).map_err(|_| ResolveError::ToolUnavailable {
            tool: self.tools.nix_shell.clone(),
        })
    }

    fn probe_script(&self) -> String {
        format!(
            "which {} && which {} && echo $PATH",
            self.tools.shell_name, self.tools.coreutil_name
        )
    }
}

impl EnvironmentResolver for NixShellResolver {
    fn resolve(
        &self,
        descriptor: &Path,
        progress: SyncSender<String>,
    ) -> Result<ResolvedEnvironment, ResolveError> {
        let program = self.program()?;
        tracing::debug!(program = %program.display(), descriptor = %descriptor.display(), "resolving environment");

        let mut child = Command::new(&program)
            .arg(descriptor)
            .arg("--run")
            .arg(self.probe_script())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ResolveError::Spawn {
                tool: self.tools.nix_shell.clone(),
                source: e,
            })?;

        let stderr_handle = child
            .stderr
            .take()
            .map(|err| thread::spawn(move || scan_stderr(err, progress)));

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            let mut buf = Vec::new();
            out.read_to_end(&mut buf)?;
            stdout = String::from_utf8_lossy(&buf).into_owned();
        }
        let status = child.wait()?;
        let stderr = stderr_handle
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        if !status.success() {
            tracing::debug!(?status, "nix-shell exited unsuccessfully");
            return Err(classify_failure(&stderr));
        }
        parse_resolve_output(&stdout, &self.tools)
    }
}

/// Read `stream` to the end, forwarding progress lines. Returns everything read.
fn scan_stderr<R: Read>(stream: R, progress: SyncSender<String>) -> String {
    let mut reader = BufReader::new(stream);
    let mut all = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                all.push_str(&line);
                let line = line.trim_end_matches(['\n', '\r']);
                if is_progress_line(line) {
                    // Full or closed sink: drop the line.
                    let _ = progress.try_send(line.to_string());
                }
            }
            Err(_) => break,
        }
    }
    all
}

pub fn is_progress_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    PROGRESS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn missing_package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:attribute|undefined variable) '([^']+)'(?: missing)?").expect("static regex")
    })
}

/// Turn nix-shell's stderr into an actionable error.
pub fn classify_failure(stderr: &str) -> ResolveError {
    for caps in missing_package_re().captures_iter(stderr) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let is_attr = whole.starts_with("attribute");
        if is_attr && !whole.ends_with("missing") {
            continue;
        }
        if let Some(name) = caps.get(1) {
            return ResolveError::PackageNotFound {
                name: name.as_str().to_string(),
            };
        }
    }
    ResolveError::Failed {
        raw: stderr.to_string(),
    }
}

/// Parse the probe output: shell and core-utility paths by suffix among the
/// leading lines, search path on the last line, restricted to the store.
pub fn parse_resolve_output(
    stdout: &str,
    tools: &ToolsConfig,
) -> Result<ResolvedEnvironment, ResolveError> {
    let lines: Vec<&str> = stdout.trim().lines().collect();
    if lines.len() < 3 {
        return Err(ResolveError::UnexpectedOutput {
            raw: stdout.to_string(),
        });
    }
    let (last, leading) = match lines.split_last() {
        Some(parts) => parts,
        None => {
            return Err(ResolveError::UnexpectedOutput {
                raw: stdout.to_string(),
            })
        }
    };

    let path = filter_store_path(last.trim(), &tools.store_prefix);
    if path.is_empty() {
        return Err(ResolveError::NoStorePaths {
            raw: stdout.to_string(),
        });
    }

    let shell_suffix = format!("/{}", tools.shell_name);
    let util_suffix = format!("/{}", tools.coreutil_name);
    let mut bash_path = None;
    let mut env_path = None;
    for line in leading.iter().map(|l| l.trim()) {
        if bash_path.is_none() && line.ends_with(&shell_suffix) {
            bash_path = Some(line.to_string());
        } else if env_path.is_none() && line.ends_with(&util_suffix) {
            env_path = Some(line.to_string());
        }
    }
    match (bash_path, env_path) {
        (Some(bash_path), Some(env_path)) => Ok(ResolvedEnvironment {
            bash_path,
            env_path,
            path,
        }),
        _ => Err(ResolveError::MissingExecutables {
            raw: stdout.to_string(),
        }),
    }
}

/// Keep only absolute `:`-separated entries rooted (component-wise) in `store`.
pub fn filter_store_path(raw: &str, store: &Path) -> String {
    raw.split(':')
        .filter(|entry| {
            let p = Path::new(entry);
            p.is_absolute() && p.starts_with(store)
        })
        .collect::<Vec<_>>()
        .join(":")
}
