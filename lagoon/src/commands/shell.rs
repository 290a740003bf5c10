//! `lagoon shell`: interactive shell or one-off command, exec'd in place.

use anyhow::Result;
use lagoon_core::config::ToolsConfig;
use lagoon_core::observability;
use lagoon_sandbox::registry::SandboxRecord;
use lagoon_sandbox::{build_isolation_spec, preflight, BwrapLauncher, LaunchOptions};

use super::{launch_options, prepare, Project};
use crate::cli::SandboxArgs;

pub fn cmd_shell(cmd: Option<String>, args: &SandboxArgs) -> Result<()> {
    let cmd = cmd.filter(|c| !c.trim().is_empty());
    let tools = ToolsConfig::from_env();
    let options = launch_options(args, cmd, &tools)?;
    preflight::run_all(&tools)?;
    let project = Project::current()?;
    enter(&project, &tools, &options)
}

/// Prepare the environment and replace this process with the sandbox.
/// Only returns on failure.
pub fn enter(project: &Project, tools: &ToolsConfig, options: &LaunchOptions) -> Result<()> {
    let prepared = prepare(project, tools)?;
    let isolation = build_isolation_spec(&project.spec, &prepared.env, &project.root, options);

    if options.command.is_none() {
        print_banner(project, options);
    }

    // Same pid after exec, so `lagoon stats` can find the sandbox.
    let record = SandboxRecord::for_current_process(&project.root, &project.spec.packages);
    if let Err(e) = record.write(&project.paths.cache_dir) {
        tracing::warn!("could not write pid record: {}", e);
    }

    let mode = if options.command.is_some() { "command" } else { "shell" };
    observability::audit_sandbox_launched(
        &project.root.to_string_lossy(),
        mode,
        &project.spec.profile.to_string(),
        options.command.as_deref(),
        options.memory.as_ref().map(|m| m.as_str()),
    );

    let launcher = BwrapLauncher::new(tools.clone());
    match launcher.enter(&isolation, options.memory.as_ref()) {
        Ok(never) => match never {},
        Err(e) => Err(e.into()),
    }
}

fn print_banner(project: &Project, options: &LaunchOptions) {
    let net = if project.spec.profile.network_enabled() { "on" } else { "off" };
    let mem = options
        .memory
        .as_ref()
        .map(|m| format!(" │ mem: {}", m))
        .unwrap_or_default();
    eprintln!();
    eprintln!(
        "lagoon │ {} │ /workspace │ network: {}{}",
        project.spec.packages.join("  "),
        net,
        mem
    );
    eprintln!("  type 'exit' to return to host shell");
    eprintln!();
}
