//! rustprobe command-line entry point
//!
//! Loads configuration, initializes logging and runs a single scan.

use anyhow::{Context, Result};
use clap::Parser;
use rustprobe::{
    cli::{self, Cli, OutputFormat},
    config::AppConfig,
    core::{ScanOptions, Scanner},
    logging,
    port_table::WellKnownPorts,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate().map_err(anyhow::Error::msg)?;

    let mut config = AppConfig::load(&cli.config_path).await?;
    cli.apply_to(&mut config);
    config.validate()?;

    let _log_guard = logging::init_logging_with_config(&config.logging)?;
    info!("Starting rustprobe against {}", cli.target);

    let port_table = Arc::new(WellKnownPorts::from_optional_path(
        config.port_table.services_file.as_ref(),
    ));

    let scanner = match Scanner::new(ScanOptions::from_config(&config), port_table) {
        Ok(scanner) => scanner,
        Err(e) => {
            rustprobe::log_error_with_context!(e, "scanner setup");
            return Err(e.into());
        }
    };

    let report = scanner.scan(&cli.target, cli.port_spec(&config)).await;

    match cli.output_format() {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Human => print!("{}", cli::render_human(&report)),
    }

    info!("{}", scanner.metrics().snapshot());
    Ok(())
}
