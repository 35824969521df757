//! Connect command - dial a target through the dispatcher

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use cow_core::addr::split_host_port;
use cow_core::Route;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::args::Args as GlobalArgs;

/// Connect command arguments
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Target as `host:port`
    pub target: String,

    /// Network to dial (tcp, tcp4, tcp6)
    #[arg(short, long, default_value = "tcp")]
    pub network: String,

    /// Give up after this many seconds
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,
}

/// Execute connect command
pub fn execute(args: ConnectArgs, global: &GlobalArgs) -> Result<()> {
    let (config, per_host) = super::build_dispatcher(global)?;

    let (host, _) = split_host_port(&args.target)?;
    let route = per_host.route(host);
    let via = match route {
        Route::Bypass => format!("tunnel at {}", config.socks_endpoint()),
        Route::Direct => "direct".to_string(),
    };
    println!("Connecting to {} ({})...", args.target.cyan(), via);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let start = Instant::now();
    runtime.block_on(async {
        let dial = per_host.dial(&args.network, &args.target);
        let mut conn = tokio::time::timeout(Duration::from_secs(args.timeout), dial)
            .await
            .with_context(|| format!("Timed out after {}s", args.timeout))?
            .with_context(|| format!("Failed to connect to {}", args.target))?;
        conn.shutdown().await.ok();
        anyhow::Ok(())
    })?;

    let elapsed = start.elapsed();
    info!("Connected to {} via {} in {:?}", args.target, route, elapsed);
    println!(
        "{} Connected to {} via {} in {} ms",
        "✓".green(),
        args.target.cyan(),
        route.to_string().yellow(),
        elapsed.as_millis()
    );

    Ok(())
}
