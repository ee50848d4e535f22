//! Logging initialization for the CLI.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the binary.

use std::path::Path;

use anyhow::anyhow;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE
/// * `log_file` - If set, JSON lines are also appended to this file
///
/// Human-readable output always goes to stderr so stdout stays machine-readable.
/// The returned guard must be held until exit to flush the file writer.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Support RUST_LOG env var, with verbosity flag as override
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("release_resolver={level}").parse()?);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {:?}", path))?;
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
