//! CLI commands

pub mod completions;
pub mod config;
pub mod connect;
pub mod route;
pub mod rules;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use cow_core::{Config, PerHost};
use std::path::PathBuf;
use tracing::{debug, Level};

use crate::args::Args;

/// Rule file used when neither `--blocked` nor the config names one
const DEFAULT_RULE_FILE: &str = "blocked.txt";

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the routing decision for hosts
    Route(route::RouteArgs),

    /// Inspect and validate rule files
    Rules(rules::RulesArgs),

    /// Dial a target through the dispatcher
    Connect(connect::ConnectArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Candidate config files, in search order
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("config.toml"), PathBuf::from("cow.toml")];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "cow") {
        candidates.push(dirs.config_dir().join("config.toml"));
    }
    candidates
}

fn find_config_file() -> Option<PathBuf> {
    config_candidates().into_iter().find(|path| path.exists())
}

/// Load the configuration named by `--config`, found on disk, or the default
///
/// `--blocked` overrides the configured rule file. With no rule file
/// configured, `blocked.txt` in the working directory is used if present.
pub fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.clone().or_else(find_config_file) {
        Some(path) => {
            debug!("Using config file {}", path.display());
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(blocked) = &args.blocked {
        config.rules.file = Some(blocked.clone());
    } else if config.rules.file.is_none() {
        let default = PathBuf::from(DEFAULT_RULE_FILE);
        if default.exists() {
            config.rules.file = Some(default);
        }
    }

    Ok(config)
}

/// Build the dispatcher described by the effective configuration
pub fn build_dispatcher(args: &Args) -> Result<(Config, PerHost)> {
    let config = load_config(args)?;
    config.validate().context("Configuration validation failed")?;
    let per_host = config
        .build_dispatcher()
        .context("Failed to set up dispatcher")?;
    Ok((config, per_host))
}

/// Log level from the configuration, if it can be read
///
/// Runs before logging is set up, so failures are left for the command
/// itself to report.
pub fn configured_log_level(args: &Args) -> Option<Level> {
    let config = load_config(args).ok()?;
    if config.logging.verbose {
        return Some(Level::DEBUG);
    }
    config.logging.level.parse().ok()
}

/// Summary shown when no command is given
pub fn status(args: &Args) -> Result<()> {
    let (config, per_host) = build_dispatcher(args)?;

    println!("{}", "═".repeat(50).bright_blue());
    println!("{}", " cow".bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    println!("HTTP front end: {}", config.http_listen_addr().cyan());
    println!("Tunnel (SOCKS5): {}", config.socks_endpoint().cyan());
    match &config.rules.file {
        Some(path) => println!("Rule file: {}", path.display().to_string().cyan()),
        None => println!("Rule file: {}", "(none)".dimmed()),
    }
    println!("Rules loaded: {}", per_host.rules().len().to_string().green());
    println!("{}", "═".repeat(50).bright_blue());
    println!();
    println!("Use 'cow route <host>' to check where a host is routed.");

    Ok(())
}
