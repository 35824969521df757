//! cow CLI
//!
//! Command-line interface for the per-host routing gateway.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    logging::init(&args, commands::configured_log_level(&args))?;

    let result = run(args);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(mut args: Args) -> Result<()> {
    match args.command.take() {
        Some(commands::Command::Route(route_args)) => commands::route::execute(route_args, &args),
        Some(commands::Command::Rules(rules_args)) => commands::rules::execute(rules_args, &args),
        Some(commands::Command::Connect(connect_args)) => {
            commands::connect::execute(connect_args, &args)
        }
        Some(commands::Command::Config(config_args)) => commands::config::execute(config_args),
        Some(commands::Command::Completions(comp_args)) => {
            commands::completions::execute(comp_args)
        }
        None => commands::status(&args),
    }
}
