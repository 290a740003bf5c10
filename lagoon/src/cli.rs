use clap::{Args, Parser, Subcommand};

/// lagoon - reproducible, sandboxed shells from a declarative package list
#[derive(Parser, Debug)]
#[command(name = "lagoon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command that launches a sandbox.
#[derive(Args, Debug, Clone, Default)]
pub struct SandboxArgs {
    /// Set an env var inside the sandbox (KEY=VALUE, repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Limit sandbox memory via systemd-run (e.g. 512m, 1g)
    #[arg(short = 'm', long = "memory", value_name = "SIZE")]
    pub memory: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enter the sandboxed environment defined in lagoon.toml
    Shell {
        /// Run a one-off command instead of an interactive shell
        #[arg(long = "cmd", value_name = "COMMAND")]
        cmd: Option<String>,

        #[command(flatten)]
        sandbox: SandboxArgs,
    },

    /// Run a command in the sandbox and exit (arguments are passed verbatim)
    Run {
        #[command(flatten)]
        sandbox: SandboxArgs,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a command in the sandbox, restart it when project files change
    Watch {
        #[command(flatten)]
        sandbox: SandboxArgs,

        /// Command to run (joined with spaces)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show packages, profile and whether the environment is cached
    Status,

    /// Remove the cache directory for the current project
    Clean,

    /// Verify the environment closure has not changed since the baseline
    Verify,

    /// Show memory usage of running sandboxes
    Stats,
}
