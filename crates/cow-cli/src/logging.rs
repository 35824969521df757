//! Logging initialization

use anyhow::{Context, Result};
use std::fs::File;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Pick the log level: `--quiet`, then `-v` flags, then the configured level
fn level(args: &Args, configured: Option<Level>) -> Level {
    if args.quiet {
        return Level::ERROR;
    }
    match args.verbose {
        0 => configured.unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Open `--log-file`, if given, as a shareable writer
fn log_file(args: &Args) -> Result<Option<Mutex<File>>> {
    args.log_file
        .as_deref()
        .map(|path| {
            File::create(path)
                .map(Mutex::new)
                .with_context(|| format!("Failed to create log file: {}", path))
        })
        .transpose()
}

/// Initialize logging based on CLI arguments and the configured level
///
/// Events go to stderr in the chosen format, and to `--log-file` too when
/// set (never with ANSI colors).
pub fn init(args: &Args, configured: Option<Level>) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level(args, configured).into())
        .from_env_lossy();
    let file = log_file(args)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match args.log_format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(args.verbose >= 2)
                    .with_thread_ids(args.verbose >= 3)
                    .with_file(args.verbose >= 3)
                    .with_line_number(args.verbose >= 3),
            )
            .with(file.map(|f| fmt::layer().with_ansi(false).with_writer(f)))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(file.map(|f| fmt::layer().json().with_writer(f)))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .with(file.map(|f| fmt::layer().compact().with_ansi(false).with_writer(f)))
            .try_init(),
    };

    installed.context("Failed to install log subscriber")
}
