//! Command-line interface definition
//!
//! A thin adapter: arguments override the loaded configuration, and the
//! finished report is rendered as a table or as JSON.

use clap::{ArgAction, Parser, ValueEnum};
use std::{fmt::Write as _, path::PathBuf};

use crate::{
    config::AppConfig,
    core::{PortState, ScanReport},
    os_detection::OsStrategy,
};

#[derive(Parser, Debug)]
#[command(
    name = "rustprobe",
    about = "TCP connect scanner with service and OS fingerprinting"
)]
pub struct Cli {
    /// Host name or IP address to scan
    #[arg(required = true)]
    pub target: String,

    #[arg(short = 'p', long, help = "Port specification (e.g., 22,80,443 or 1-1000); top ports when omitted")]
    pub ports: Option<String>,

    #[arg(short = 's', long, help = "Request a SYN scan (performed as a connect scan)")]
    pub syn_scan: bool,

    #[arg(short = 'O', long, help = "Enable OS detection")]
    pub os_detection: bool,

    #[arg(long, value_enum, help = "OS detection strategy")]
    pub os_strategy: Option<OsStrategyArg>,

    #[arg(long, value_name = "N", help = "Maximum connect attempts in flight")]
    pub max_concurrency: Option<usize>,

    #[arg(long, value_name = "MS", help = "Connect timeout per port in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, value_name = "FILE", help = "nmap-services style port table")]
    pub port_table: Option<PathBuf>,

    #[arg(short = 'c', long = "config", default_value = "rustprobe.toml", help = "Configuration file")]
    pub config_path: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Human, help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, help = "Shorthand for --format json")]
    pub json: bool,

    #[arg(short = 'v', long, action = ArgAction::Count, help = "Increase verbosity")]
    pub verbose: u8,

    #[arg(short = 'q', long, help = "Only log errors")]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsStrategyArg {
    Weighted,
    TtlBand,
}

impl From<OsStrategyArg> for OsStrategy {
    fn from(arg: OsStrategyArg) -> Self {
        match arg {
            OsStrategyArg::Weighted => OsStrategy::Weighted,
            OsStrategyArg::TtlBand => OsStrategy::TtlBand,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Human,
    /// JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl Cli {
    /// Validate CLI arguments and resolve conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.quiet && self.verbose > 0 {
            return Err("Cannot use both quiet and verbose modes".to_string());
        }

        if self.max_concurrency == Some(0) {
            return Err("--max-concurrency must be greater than 0".to_string());
        }

        if self.timeout == Some(0) {
            return Err("--timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Log level implied by -q / -v, if any
    pub fn log_level(&self) -> Option<&'static str> {
        match (self.quiet, self.verbose) {
            (true, _) => Some("error"),
            (false, 0) => None,
            (false, 1) => Some("debug"),
            (false, _) => Some("trace"),
        }
    }

    /// Port specification to scan
    pub fn port_spec<'a>(&'a self, config: &'a AppConfig) -> &'a str {
        self.ports
            .as_deref()
            .unwrap_or(config.scanning.default_ports.as_str())
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if self.syn_scan {
            config.scanning.default_scan_type = "syn".to_string();
        }
        if self.os_detection {
            config.scanning.os_detection = true;
        }
        if let Some(strategy) = self.os_strategy {
            config.scanning.os_strategy = strategy.into();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.performance.max_concurrent_scans = max_concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.network.connection_timeout_ms = timeout;
        }
        if let Some(path) = &self.port_table {
            config.port_table.services_file = Some(path.clone());
        }
        if let Some(level) = self.log_level() {
            config.logging.level = level.to_string();
        }
    }
}

/// Render a report as a plain-text table
pub fn render_human(report: &ScanReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "rustprobe scan report for {}", report.target);
    let _ = writeln!(out, "Scan ID: {}", report.scan_id);
    let _ = writeln!(
        out,
        "Started at: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Scanned {} ports in {:.2}s, {} open\n",
        report.ports_scanned,
        report.duration.as_secs_f64(),
        report.results.len()
    );

    if report.results.is_empty() {
        out.push_str("No open ports found.\n");
    } else {
        let _ = writeln!(out, "{:<10} {:<6} {}", "PORT", "STATE", "SERVICE");
        for result in &report.results {
            let _ = writeln!(
                out,
                "{:<10} {:<6} {}",
                format!("{}/{}", result.port, result.protocol.to_lowercase()),
                PortState::Open.as_str(),
                result.service
            );
            for line in result.details.lines() {
                let _ = writeln!(out, "{:<17} | {}", "", line);
            }
        }
    }

    if let Some(os) = &report.os_detection {
        let _ = write!(out, "\nOS guess: {} ({}%)", os.os_family, os.confidence);
        if !os.details.is_empty() {
            let _ = write!(out, " - {}", os.details);
        }
        out.push('\n');
    }

    out
}
