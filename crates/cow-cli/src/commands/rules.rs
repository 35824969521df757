//! Rule file commands
//!
//! List, validate and test bypass rules.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use cow_core::{Route, Rule, RuleStore};
use std::path::{Path, PathBuf};

use crate::args::Args as GlobalArgs;

/// Rules command arguments
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

/// Rules subcommands
#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// List all rules that load from the configuration
    List,

    /// Report rule lines that would be ignored
    Validate {
        /// Rule file to check (default: the configured one)
        file: Option<PathBuf>,
    },

    /// Show which rule, if any, matches a host
    Check {
        /// Host to check (no port)
        host: String,
    },
}

/// Execute rules command
pub fn execute(args: RulesArgs, global: &GlobalArgs) -> Result<()> {
    match args.command {
        RulesCommands::List => list_rules(global),
        RulesCommands::Validate { file } => validate_rules(file, global),
        RulesCommands::Check { host } => check_host(&host, global),
    }
}

fn list_rules(global: &GlobalArgs) -> Result<()> {
    let (config, per_host) = super::build_dispatcher(global)?;
    let rules = per_host.rules().rules();

    println!("{}", "═".repeat(50).bright_blue());
    println!("{}", " Bypass Rules".bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    if let Some(path) = &config.rules.file {
        println!("File: {}", path.display().to_string().cyan());
    }
    println!("Total rules: {}", rules.len().to_string().green());
    println!("{}", "─".repeat(50).bright_black());

    if rules.is_empty() {
        println!("{}", "  (empty)".dimmed());
    } else {
        for rule in &rules {
            println!("  {}", rule);
        }
    }

    println!("{}", "═".repeat(50).bright_blue());
    Ok(())
}

/// A rule line that does not parse
#[derive(Debug, PartialEq, Eq)]
struct Rejected {
    line_no: usize,
    line: String,
    reason: String,
}

/// Parse every rule line, collecting the accepted count and rejected lines
fn scan(content: &str) -> (usize, Vec<Rejected>) {
    let mut accepted = 0;
    let mut rejected = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Rule>() {
            Ok(_) => accepted += 1,
            Err(e) => rejected.push(Rejected {
                line_no: idx + 1,
                line: line.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    (accepted, rejected)
}

fn rule_file(file: Option<PathBuf>, global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }
    super::load_config(global)?
        .rules
        .file
        .context("No rule file given; pass one or use --blocked")
}

fn validate_rules(file: Option<PathBuf>, global: &GlobalArgs) -> Result<()> {
    let path = rule_file(file, global)?;
    let content = read(&path)?;
    let (accepted, rejected) = scan(&content);

    println!("File: {}", path.display().to_string().cyan());
    println!("Valid rules: {}", accepted.to_string().green());

    if rejected.is_empty() {
        println!("{} All rule lines parse", "✓".green());
        return Ok(());
    }

    println!("Ignored lines: {}", rejected.len().to_string().yellow());
    for r in &rejected {
        println!("  {} line {}: {} ({})", "✗".red(), r.line_no, r.line, r.reason);
    }
    bail!("{} rule line(s) would be ignored", rejected.len())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))
}

fn check_host(host: &str, global: &GlobalArgs) -> Result<()> {
    let (_, per_host) = super::build_dispatcher(global)?;
    let store: &RuleStore = per_host.rules();

    let rule = store.matching_rule(host);
    let route = per_host.route(host);

    println!("{}", "─".repeat(50).bright_black());
    println!("Host: {}", host.cyan());
    println!(
        "Matching rule: {}",
        match &rule {
            Some(rule) => rule.to_string().yellow(),
            None => "none".dimmed(),
        }
    );
    println!(
        "Route: {}",
        match route {
            Route::Bypass => "bypass (tunnel)".yellow(),
            Route::Direct => "direct".green(),
        }
    );
    println!("{}", "─".repeat(50).bright_black());

    Ok(())
}
