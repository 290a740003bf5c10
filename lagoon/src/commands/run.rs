//! `lagoon run <args>...`: one-shot command, each argument passed through verbatim.

use anyhow::Result;
use lagoon_core::config::ToolsConfig;
use lagoon_sandbox::preflight;

use super::{launch_options, Project};
use crate::cli::SandboxArgs;

pub fn cmd_run(args: &[String], sandbox: &SandboxArgs) -> Result<()> {
    let tools = ToolsConfig::from_env();
    let options = launch_options(sandbox, Some(shell_quote_args(args)), &tools)?;
    preflight::run_all(&tools)?;
    let project = Project::current()?;
    super::shell::enter(&project, &tools, &options)
}

/// Single-quote each argument for `bash -c`, escaping embedded quotes as `'\''`.
pub fn shell_quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("'{}'", a.replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join(" ")
}
