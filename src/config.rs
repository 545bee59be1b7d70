//! Configuration management
//!
//! Settings are layered, later sources winning:
//! - Built-in defaults
//! - A TOML file (written with the defaults when missing)
//! - Environment variables prefixed with `RUSTPROBE_`, sections separated
//!   by `__` (e.g. `RUSTPROBE_PERFORMANCE__MAX_CONCURRENT_SCANS=50`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{os_detection::OsStrategy, timing::ProbeTiming};

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub scanning: ScanningConfig,
    pub network: NetworkConfig,
    pub performance: PerformanceConfig,
    /// Service fingerprinting time budget
    pub fingerprint: ProbeTiming,
    pub logging: LoggingConfig,
    pub port_table: PortTableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanningConfig {
    /// tcp_connect or syn (syn falls back to tcp_connect)
    pub default_scan_type: String,
    /// Port specification used when none is given; empty means top ports
    pub default_ports: String,
    /// Enable OS detection by default
    pub os_detection: bool,
    pub os_strategy: OsStrategy,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            default_scan_type: "tcp_connect".to_string(),
            default_ports: String::new(),
            os_detection: false,
            os_strategy: OsStrategy::Weighted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-attempt connect timeout of the port sweep
    pub connection_timeout_ms: u64,
    /// Post-handshake wait used to spot listeners that close immediately
    pub settle_window_ms: u64,
    /// ICMP echo timeout for TTL sampling
    pub icmp_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 2000,
            settle_window_ms: 50,
            icmp_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum connect attempts in flight
    pub max_concurrent_scans: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Console format (json, pretty)
    pub format: String,
    /// Daily-rolling JSON log file, in addition to the console
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortTableConfig {
    /// nmap-services style file; the builtin table is used when unset
    pub services_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub async fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        info!("Loading configuration from: {}", config_path.display());

        let mut settings = config::Config::builder();

        settings = settings.add_source(config::Config::try_from(&Self::default())?);

        if config_path.exists() {
            debug!("Found configuration file, loading settings");
            settings = settings.add_source(config::File::from(config_path));
        } else {
            info!("No configuration file found, using defaults");
            Self::create_default_config(config_path).await?;
        }

        settings = settings.add_source(
            config::Environment::with_prefix("RUSTPROBE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Create a default configuration file
    async fn create_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let config_content = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")?;

        tokio::fs::write(path, config_content)
            .await
            .context("Failed to write default configuration file")?;

        info!("Created default configuration file: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid logging level: {}", self.logging.level)),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => return Err(anyhow::anyhow!("Invalid logging format: {}", self.logging.format)),
        }

        match self.scanning.default_scan_type.to_lowercase().as_str() {
            "tcp_connect" | "tcp" | "connect" | "syn" | "syn_scan" => {}
            other => return Err(anyhow::anyhow!("Invalid scan type: {}", other)),
        }

        if self.performance.max_concurrent_scans == 0 {
            return Err(anyhow::anyhow!("max_concurrent_scans must be greater than 0"));
        }

        if self.network.connection_timeout_ms == 0 || self.network.icmp_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Network timeouts must be greater than 0"));
        }

        if !self.fingerprint.is_valid() {
            return Err(anyhow::anyhow!(
                "Fingerprint connect budget and read timeout must be greater than 0"
            ));
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}
