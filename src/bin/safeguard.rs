//! Safeguard CLI Binary
//!
//! Runs the reconciliation engine as a foreground daemon, or a single pass.

use clap::Parser;
use safeguard::cli::{map_error, shutdown_signal, Cli, Commands, RunContext};
use safeguard::logging::init_logging;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command();

    if let Commands::InitConfig { force } = command {
        match RunContext::init_config(&cli.config, force) {
            Ok(output) => println!("{}", output.text),
            Err(e) => {
                eprintln!("{}", map_error(&e));
                process::exit(1);
            }
        }
        return;
    }

    let context = match RunContext::load(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&context.logging_config(&cli))) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(command = ?command, config = %cli.config.display(), "Safeguard starting");

    match context.execute(&command, shutdown_signal()).await {
        Ok(output) => {
            println!("{}", output.text);
            if output.exit_code != 0 {
                process::exit(output.exit_code);
            }
        }
        Err(e) => {
            error!("Initialization failed: {:#}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}
