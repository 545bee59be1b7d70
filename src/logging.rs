//! Logging setup and structured scan events
//!
//! Provides:
//! - Console output to stderr in pretty or JSON format
//! - Optional daily-rolling JSON log file
//! - Structured event macros for discoveries and verdicts
//! - Phase logging bound to a scan id

use anyhow::{Context, Result};
use std::{io, path::Path};
use tracing::{info, Level};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::{config::LoggingConfig, error::ScannerError};

/// Console output style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleFormat {
    Json,
    Pretty,
}

impl ConsoleFormat {
    /// Case-insensitive, like config validation; anything else is pretty
    fn parse(format: &str) -> Self {
        if format.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize logging. The returned guard must stay alive for as long as
/// the log file should receive events.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = create_env_filter(&config.level)?;

    let (file_layer, guard) = match &config.file_path {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = Registry::default().with(env_filter).with(file_layer);

    match ConsoleFormat::parse(&config.format) {
        ConsoleFormat::Json => {
            let console_layer = fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_target(true)
                .with_thread_ids(true);

            registry
                .with(console_layer)
                .try_init()
                .context("Failed to install the global subscriber")?;
        }
        ConsoleFormat::Pretty => {
            let console_layer = fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(false);

            registry
                .with(console_layer)
                .try_init()
                .context("Failed to install the global subscriber")?;
        }
    }

    info!("Logging system initialized with level: {}", config.level);
    Ok(guard)
}

/// Create environment filter from log level string
fn create_env_filter(level: &str) -> Result<EnvFilter> {
    let base_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => return Err(ScannerError::config(format!("Invalid log level: {}", level)).into()),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(base_level.into())
        .from_env()
        .context("Failed to create environment filter")?
        .add_directive("surge_ping=warn".parse()?);

    Ok(filter)
}

/// Non-blocking writer over a daily-rolling file named after `path`
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    Ok(tracing_appender::non_blocking(rolling::daily(directory, file_name)))
}

#[macro_export]
macro_rules! log_scan_start {
    ($scan_type:expr, $target:expr) => {
        tracing::info!(
            scan_type = $scan_type,
            target = $target,
            event = "scan_start",
            "Starting {} scan of {}",
            $scan_type,
            $target
        );
    };
}

#[macro_export]
macro_rules! log_scan_complete {
    ($scan_type:expr, $target:expr, $duration:expr, $results:expr) => {
        tracing::info!(
            scan_type = $scan_type,
            target = $target,
            duration_ms = $duration.as_millis() as u64,
            results_count = $results,
            event = "scan_complete",
            "Completed {} scan of {} in {}ms with {} open ports",
            $scan_type,
            $target,
            $duration.as_millis(),
            $results
        );
    };
}

#[macro_export]
macro_rules! log_port_discovery {
    ($host:expr, $port:expr, $state:expr, $service:expr) => {
        tracing::info!(
            host = %$host,
            port = $port,
            state = $state,
            event = "port_discovery",
            "Discovered port {}:{} - {} ({})",
            $host,
            $port,
            $state,
            $service.unwrap_or("unknown")
        );
    };
}

#[macro_export]
macro_rules! log_service_detection {
    ($host:expr, $port:expr, $service:expr, $confidence:expr) => {
        tracing::info!(
            host = %$host,
            port = $port,
            service = $service,
            confidence = $confidence,
            event = "service_detection",
            "Detected service {}:{} - {} ({}%)",
            $host,
            $port,
            $service,
            $confidence
        );
    };
}

#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            severity = %$error.severity(),
            recoverable = $error.is_recoverable(),
            event = "error",
            "Error in {}: {}",
            $context,
            $error
        );
    };
}

/// Phase logging for one scan
pub struct ScanLogger {
    scan_id: String,
    scan_type: String,
    target: String,
}

impl ScanLogger {
    pub fn new<S: Into<String>>(scan_id: S, scan_type: S, target: S) -> Self {
        Self {
            scan_id: scan_id.into(),
            scan_type: scan_type.into(),
            target: target.into(),
        }
    }

    pub fn log_phase_start(&self, phase: &str) {
        tracing::info!(
            scan_id = %self.scan_id,
            scan_type = %self.scan_type,
            target = %self.target,
            phase = phase,
            event = "phase_start",
            "Starting {} phase for {} scan of {}",
            phase,
            self.scan_type,
            self.target
        );
    }

    pub fn log_phase_complete(&self, phase: &str, duration: std::time::Duration) {
        tracing::info!(
            scan_id = %self.scan_id,
            scan_type = %self.scan_type,
            target = %self.target,
            phase = phase,
            duration_ms = duration.as_millis() as u64,
            event = "phase_complete",
            "Completed {} phase in {}ms",
            phase,
            duration.as_millis()
        );
    }
}
