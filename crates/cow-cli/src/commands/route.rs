//! Route command - show where hosts would be sent

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use cow_core::addr::split_host_port;
use cow_core::Route;

use crate::args::Args as GlobalArgs;

/// Route command arguments
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Hosts to classify, as `host` or `host:port`
    #[arg(required = true)]
    pub targets: Vec<String>,
}

/// Strip a port if the target has one; bare hosts (IPv6 included) pass through
fn host_of(target: &str) -> &str {
    match split_host_port(target) {
        Ok((host, _)) => host,
        Err(_) => target,
    }
}

/// Execute route command
pub fn execute(args: RouteArgs, global: &GlobalArgs) -> Result<()> {
    let (_, per_host) = super::build_dispatcher(global)?;

    for target in &args.targets {
        let host = host_of(target);
        let route = per_host.route(host);
        let rule = per_host.rules().matching_rule(host);

        let route_str = match route {
            Route::Bypass => "bypass".yellow().bold(),
            Route::Direct => "direct".green().bold(),
        };
        match rule {
            Some(rule) => println!("{} {} ({})", route_str, host.cyan(), rule),
            None => println!("{} {}", route_str, host.cyan()),
        }
    }

    Ok(())
}
