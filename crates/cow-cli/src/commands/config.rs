//! Config command - configuration management

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use cow_core::Config;
use std::path::PathBuf;
use tracing::info;

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show a configuration file with defaults filled in
    Show {
        /// Config file to show (default: search paths, then built-in defaults)
        file: Option<PathBuf>,
    },

    /// Generate a configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        file: PathBuf,
    },

    /// Show config file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show { file } => show_config(file),
        ConfigAction::Generate { output, force } => generate_config(output, force),
        ConfigAction::Validate { file } => validate_config(file),
        ConfigAction::Paths => show_paths(),
    }
}

fn show_config(file: Option<PathBuf>) -> Result<()> {
    let path = file.or_else(|| super::config_candidates().into_iter().find(|p| p.exists()));
    let config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let toml_str = config.to_toml().context("Failed to serialize config")?;
    println!("{}", toml_str);
    Ok(())
}

/// Starting configuration with an example inline rule
fn template() -> Config {
    let mut config = Config::default();
    config.rules.file = Some(PathBuf::from("blocked.txt"));
    config.rules.inline = vec!["DOMAIN-KEYWORD,blocked".to_string()];
    config
}

fn generate_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        println!("{} Config file already exists: {}", "!".yellow(), output.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let toml_str = template().to_toml().context("Failed to serialize config")?;

    let content = format!(
        "# cow configuration\n\
         # Rule lines: DOMAIN, DOMAIN-SUFFIX, DOMAIN-KEYWORD, IP, IP-CIDR\n\n\
         {}",
        toml_str
    );

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write config to {}", output.display()))?;

    info!("Generated config file: {}", output.display());
    println!("Configuration file generated: {}", output.display());

    Ok(())
}

fn validate_config(file: PathBuf) -> Result<()> {
    let config = Config::load(&file)
        .with_context(|| format!("Failed to load config from {}", file.display()))?;

    config.validate().context("Configuration validation failed")?;

    println!("{} Configuration is valid: {}", "✓".green(), file.display());
    println!("  Tunnel endpoint: {}", config.socks_endpoint());
    if let Some(rules) = &config.rules.file {
        let status = if rules.exists() { "found".green() } else { "missing".yellow() };
        println!("  Rule file: {} ({})", rules.display(), status);
    }
    println!("  Inline rules: {}", config.rules.inline.len());

    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Config file search paths:");
    println!();
    for (i, path) in super::config_candidates().iter().enumerate() {
        let marker = if path.exists() { "●".green() } else { "○".dimmed() };
        println!("  {}. {} {}", i + 1, marker, path.display());
    }
    println!();
    println!("Rule file: --blocked, [rules] file, or ./blocked.txt");

    Ok(())
}
