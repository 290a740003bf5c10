//! Bubblewrap isolation spec.
//!
//! The sandbox sees the read-only store, the project at `/workspace`, scratch
//! `/tmp` and `/home`, a handful of host `/etc` files and nothing else.
//! bwrap applies its flags left to right, so directive order matters.

use lagoon_core::config::HostIdentity;
use lagoon_core::{EnvironmentSpec, Profile};
use std::path::{Path, PathBuf};

use crate::env::ResolvedEnvironment;
use crate::launcher::MemoryLimit;

/// Mount point of the project directory inside the sandbox.
pub const WORKSPACE: &str = "/workspace";

/// Prompt shown by the interactive shell.
pub const PROMPT: &str = "[lagoon] \\w $ ";

/// Host files needed for DNS, TLS and user lookups. Bound only if present.
const ETC_PASSTHROUGH: &[&str] = &[
    "/etc/resolv.conf",
    "/etc/ssl",
    "/etc/ca-certificates",
    "/etc/passwd",
    "/etc/group",
    "/etc/nsswitch.conf",
    "/etc/localtime",
];

/// One bwrap flag with its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    RoBind { src: String, dest: String },
    Bind { src: String, dest: String },
    RoBindTry { src: String, dest: String },
    Tmpfs(String),
    Dir(String),
    Symlink { target: String, link: String },
    Proc(String),
    Dev(String),
    UnshareAll,
    DieWithParent,
    ClearEnv,
    SetEnv { key: String, value: String },
    ShareNet,
    Chdir(String),
}

impl Directive {
    fn push_args(&self, out: &mut Vec<String>) {
        let parts: Vec<&str> = match self {
            Directive::RoBind { src, dest } => vec!["--ro-bind", src.as_str(), dest.as_str()],
            Directive::Bind { src, dest } => vec!["--bind", src.as_str(), dest.as_str()],
            Directive::RoBindTry { src, dest } => vec!["--ro-bind-try", src.as_str(), dest.as_str()],
            Directive::Tmpfs(p) => vec!["--tmpfs", p.as_str()],
            Directive::Dir(p) => vec!["--dir", p.as_str()],
            Directive::Symlink { target, link } => vec!["--symlink", target.as_str(), link.as_str()],
            Directive::Proc(p) => vec!["--proc", p.as_str()],
            Directive::Dev(p) => vec!["--dev", p.as_str()],
            Directive::UnshareAll => vec!["--unshare-all"],
            Directive::DieWithParent => vec!["--die-with-parent"],
            Directive::ClearEnv => vec!["--clearenv"],
            Directive::SetEnv { key, value } => vec!["--setenv", key.as_str(), value.as_str()],
            Directive::ShareNet => vec!["--share-net"],
            Directive::Chdir(p) => vec!["--chdir", p.as_str()],
        };
        out.extend(parts.into_iter().map(String::from));
    }

    fn set_env(key: &str, value: &str) -> Self {
        Directive::SetEnv {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Everything that varies per launch besides the spec and environment.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// One-shot command; `None` opens an interactive shell.
    pub command: Option<String>,
    pub memory: Option<MemoryLimit>,
    /// Extra `KEY=VALUE` entries exported inside the sandbox.
    pub extra_env: Vec<String>,
    /// TERM and USER as seen by the caller.
    pub host: HostIdentity,
    /// Trusted store bound read-only into the sandbox.
    pub store_prefix: PathBuf,
}

impl LaunchOptions {
    pub fn new(host: HostIdentity, store_prefix: PathBuf) -> Self {
        Self {
            command: None,
            memory: None,
            extra_env: Vec::new(),
            host,
            store_prefix,
        }
    }
}

/// Ordered bwrap directives plus the command bwrap runs after `--`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationSpec {
    pub directives: Vec<Directive>,
    pub entry: Vec<String>,
}

impl IsolationSpec {
    /// bwrap argv (without the program name).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.directives.len() * 3 + self.entry.len() + 1);
        for d in &self.directives {
            d.push_args(&mut args);
        }
        args.push("--".to_string());
        args.extend(self.entry.iter().cloned());
        args
    }

    /// Last value set for `key` inside the sandbox, if any.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.directives.iter().rev().find_map(|d| match d {
            Directive::SetEnv { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Split `KEY=VALUE`; entries without `=` or with an empty key are rejected.
pub fn parse_env_assignment(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Build the isolation spec for one launch.
pub fn build_isolation_spec(
    spec: &EnvironmentSpec,
    env: &ResolvedEnvironment,
    project: &Path,
    options: &LaunchOptions,
) -> IsolationSpec {
    let store = options.store_prefix.to_string_lossy().to_string();
    let mut d = vec![
        Directive::RoBind {
            src: store.clone(),
            dest: store,
        },
        Directive::Bind {
            src: project.to_string_lossy().to_string(),
            dest: WORKSPACE.to_string(),
        },
        Directive::Tmpfs("/tmp".to_string()),
        Directive::Tmpfs("/home".to_string()),
        Directive::Dir("/etc".to_string()),
    ];
    d.extend(ETC_PASSTHROUGH.iter().map(|p| Directive::RoBindTry {
        src: p.to_string(),
        dest: p.to_string(),
    }));
    for link in ["/bin/sh", "/bin/bash"] {
        d.push(Directive::Symlink {
            target: env.bash_path.clone(),
            link: link.to_string(),
        });
    }
    d.push(Directive::Symlink {
        target: env.env_path.clone(),
        link: "/usr/bin/env".to_string(),
    });
    d.push(Directive::Proc("/proc".to_string()));
    d.push(Directive::Dev("/dev".to_string()));
    d.push(Directive::UnshareAll);
    d.push(Directive::DieWithParent);

    d.push(Directive::ClearEnv);
    d.push(Directive::set_env("HOME", "/home"));
    d.push(Directive::set_env("PATH", &env.path));
    d.push(Directive::set_env("TERM", &options.host.term));
    d.push(Directive::set_env("USER", &options.host.user));
    d.push(Directive::set_env("LANG", "C.UTF-8"));
    d.push(Directive::set_env("PS1", PROMPT));

    if spec.profile == Profile::Network {
        d.push(Directive::ShareNet);
    }

    for entry in &options.extra_env {
        match parse_env_assignment(entry) {
            Some((key, value)) => d.push(Directive::set_env(key, value)),
            None => tracing::warn!("ignoring malformed env entry {:?} (expected KEY=VALUE)", entry),
        }
    }

    d.push(Directive::Chdir(WORKSPACE.to_string()));

    IsolationSpec {
        directives: d,
        entry: entry_command(&env.bash_path, spec.on_enter.as_deref(), options.command.as_deref()),
    }
}

fn entry_command(bash: &str, hook: Option<&str>, command: Option<&str>) -> Vec<String> {
    let mut argv = vec![bash.to_string()];
    match (hook, command) {
        (Some(hook), Some(cmd)) => {
            argv.push("-c".to_string());
            argv.push(format!("{} && {}", hook, cmd));
        }
        (None, Some(cmd)) => {
            argv.push("-c".to_string());
            argv.push(cmd.to_string());
        }
        (Some(hook), None) => {
            // exec keeps the tty, so the user lands in a normal interactive shell.
            argv.push("-c".to_string());
            argv.push(format!("{}; exec {}", hook, bash));
        }
        (None, None) => {}
    }
    argv
}
