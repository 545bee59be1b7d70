//! # rustprobe
//!
//! TCP connect scanning with active service and OS fingerprinting.
//!
//! ## Pipeline
//!
//! - **Port sweep**: bounded-concurrency connect attempts classify every
//!   requested port as open, closed or filtered
//! - **Service fingerprinting**: each open port is listened to, probed with
//!   a protocol-specific payload and scored
//! - **OS detection**: open ports, banners, service names and one ICMP TTL
//!   sample vote for an operating system family
//!
//! ```no_run
//! # async fn run() -> rustprobe::Result<()> {
//! let report = rustprobe::scan("192.168.1.10", "22,80,443", Default::default()).await?;
//! for result in &report.results {
//!     println!("{} {}", result.port, result.service);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metrics;

pub mod os_detection;
pub mod port_table;
pub mod scanner;
pub mod service;

pub mod network;
pub mod timing;

pub use crate::{
    config::AppConfig,
    core::{
        apply_annotations, scan, Annotation, OsInfo, PortState, ScanOptions, ScanReport,
        ScanResult, ScanType, Scanner, STATUS_OPEN,
    },
    error::{Result, ScannerError},
    os_detection::OsStrategy,
    port_table::WellKnownPorts,
    scanner::parse_port_specification,
    service::ServiceFingerprint,
};
