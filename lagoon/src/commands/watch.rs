//! `lagoon watch <command>`: run under the supervisor, restart on changes.

use anyhow::{bail, Context, Result};
use lagoon_core::config::{ToolsConfig, WatchConfig};
use lagoon_core::observability;
use lagoon_sandbox::env::cached_environment;
use lagoon_sandbox::launcher::SandboxCommand;
use lagoon_sandbox::supervisor::{watch_tree, Supervisor, WatchEvent};
use lagoon_sandbox::{build_isolation_spec, preflight, BwrapLauncher};

use super::{launch_options, Project};
use crate::cli::SandboxArgs;

pub fn cmd_watch(command: &[String], sandbox: &SandboxArgs) -> Result<()> {
    let command = command.join(" ");
    let tools = ToolsConfig::from_env();
    let options = launch_options(sandbox, Some(command.clone()), &tools)?;
    preflight::run_all(&tools)?;
    let project = Project::current()?;

    let Some((env, _fingerprint)) = cached_environment(&project.spec, &project.paths)
        .context("generating shell.nix")?
    else {
        bail!("no cached environment; run 'lagoon shell' first to build it");
    };

    let isolation = build_isolation_spec(&project.spec, &env, &project.root, &options);
    let launcher = BwrapLauncher::new(tools.clone());
    // Fail on missing tools now rather than on every restart.
    launcher.invocation(&isolation, options.memory.as_ref())?;

    let supervisor = Supervisor::new(
        SandboxCommand {
            launcher,
            isolation,
            memory: options.memory.clone(),
            display: command.clone(),
        },
        WatchConfig::from_env(),
        &project.root,
    );

    let _watcher = watch_tree(&project.root, supervisor.events())
        .with_context(|| format!("watching {}", project.root.display()))?;

    let shutdown = supervisor.events();
    ctrlc::set_handler(move || {
        tracing::info!("received termination signal, stopping");
        let _ = shutdown.send(WatchEvent::Shutdown);
    })
    .context("Failed to set Ctrl+C handler")?;

    observability::audit_sandbox_launched(
        &project.root.to_string_lossy(),
        "watch",
        &project.spec.profile.to_string(),
        Some(&command),
        options.memory.as_ref().map(|m| m.as_str()),
    );

    eprintln!("→ watching {}\n", project.root.display());
    supervisor.run();
    Ok(())
}
