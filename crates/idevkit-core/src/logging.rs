//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

const LOG_FILE_NAME: &str = "idevkit.log";

/// Initialize the logging subsystem
///
/// Logs are written to `<data_local_dir>/idevkit/logs/`, never to stdout,
/// which carries command results and the NDJSON log stream.
/// Log level is controlled by `IDEVKIT_LOG` environment variable.
///
/// # Examples
/// ```bash
/// IDEVKIT_LOG=debug idevkit devices
/// IDEVKIT_LOG=idevkit_daemon=trace idevkit syslog <udid>
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    // Default to info for our crates, allow override via IDEVKIT_LOG
    let env_filter = EnvFilter::try_from_env("IDEVKIT_LOG").unwrap_or_else(|_| {
        EnvFilter::new("idevkit=info,idevkit_core=info,idevkit_daemon=info,warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("idevkit starting, log directory: {}", log_dir.display());

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("idevkit").join("logs"))
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> Result<PathBuf> {
    let dir = get_log_directory()?;
    Ok(dir.join(LOG_FILE_NAME))
}
