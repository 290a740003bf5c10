mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    lagoon_core::observability::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Shell { cmd, sandbox } => commands::shell::cmd_shell(cmd, &sandbox),
        Commands::Run { sandbox, args } => commands::run::cmd_run(&args, &sandbox),
        Commands::Watch { sandbox, command } => commands::watch::cmd_watch(&command, &sandbox),
        Commands::Status => commands::status::cmd_status(),
        Commands::Clean => commands::clean::cmd_clean(),
        Commands::Verify => commands::verify::cmd_verify(),
        Commands::Stats => commands::stats::cmd_stats(),
    };

    if let Err(e) = result {
        tracing::debug!("command failed: {:?}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
