//! Core data model, network seams and the scan orchestrator
//!
//! The [`Scanner`] wires the port sweep, the service fingerprint engine and
//! the OS detector together behind a single entry point. Network access goes
//! through two small traits so every stage can be exercised against
//! instrumented doubles:
//! - [`Dialer`]: one TCP connect attempt with a timeout
//! - [`TtlProbe`]: one ICMP echo returning the reply TTL

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{Result, ScannerError},
    logging::ScanLogger,
    metrics::ScanMetrics,
    network::{IcmpTtlProbe, TcpDialer},
    os_detection::{OsDetector, OsStrategy},
    port_table::WellKnownPorts,
    scanner::{parse_port_specification, PortSweep},
    service::{FingerprintEngine, ServiceFingerprint},
    timing::ProbeTiming,
};

/// Advisory text placeholder carried by every result until an external
/// enrichment step replaces it
pub const ADVICE_PLACEHOLDER: &str = "No advisory available for this service.";

/// `status` of every reported port. Kept verbatim because downstream
/// consumers of the result records match on this exact value.
pub const STATUS_OPEN: &str = "OUVERT";

/// One TCP connect attempt
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Attempt a connection and classify the outcome. Never fails: every
    /// transport condition maps to a [`ProbeOutcome`].
    async fn probe(&self, target: &str, port: u16, timeout: Duration) -> ProbeOutcome;
}

/// ICMP echo used for TTL fingerprinting
#[async_trait]
pub trait TtlProbe: Send + Sync {
    /// Send one echo request and return the TTL of the reply
    async fn echo_ttl(&self, target: &str, timeout: Duration) -> Result<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Filtered => "filtered",
        }
    }
}

/// Inspectable result of a single connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Handshake completed and the peer kept the connection
    Open,
    /// Explicit refusal (RST)
    Refused,
    /// No answer within the attempt timeout
    TimedOut,
    /// Handshake completed but the peer hung up immediately
    PeerClosed,
    /// Any other transport error
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn state(&self) -> PortState {
        match self {
            Self::Open => PortState::Open,
            Self::Refused | Self::TimedOut | Self::PeerClosed => PortState::Closed,
            Self::Unreachable(_) => PortState::Filtered,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    TcpConnect,
    /// Accepted for compatibility; always performed as a connect scan
    Syn,
}

impl ScanType {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tcp_connect" | "tcp" | "connect" => Ok(Self::TcpConnect),
            "syn" | "syn_scan" => Ok(Self::Syn),
            _ => Err(ScannerError::validation(
                "scan_type",
                format!("Unknown scan type: {}", s),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TcpConnect => "tcp_connect",
            Self::Syn => "syn_scan",
        }
    }
}

/// Best-effort operating system guess for a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub os_family: String,
    pub confidence: u8,
    pub details: String,
}

impl OsInfo {
    pub fn new<F: Into<String>, D: Into<String>>(os_family: F, confidence: u32, details: D) -> Self {
        Self {
            os_family: os_family.into(),
            confidence: confidence.min(100) as u8,
            details: details.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new("Unknown", 0, "")
    }

    pub fn is_unknown(&self) -> bool {
        self.os_family == "Unknown"
    }
}

impl Default for OsInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Externally visible record for one open port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub port: u16,
    pub service: String,
    pub details: String,
    pub protocol: String,
    pub status: String,
    pub state_description: String,
    pub advice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<String>,
}

impl ScanResult {
    pub fn from_fingerprint(fingerprint: &ServiceFingerprint) -> Self {
        let details = if fingerprint.details.is_empty() {
            "No details available".to_string()
        } else {
            fingerprint.details.clone()
        };

        Self {
            port: fingerprint.port,
            service: fingerprint.service_name.clone(),
            details,
            protocol: "TCP".to_string(),
            status: STATUS_OPEN.to_string(),
            state_description: "The port accepts connections".to_string(),
            advice: ADVICE_PLACEHOLDER.to_string(),
            product: fingerprint.product.clone(),
            version: fingerprint.version.clone(),
            ai_explanation: None,
        }
    }

    pub fn port_label(&self) -> String {
        format!("Port {}", self.port)
    }
}

/// Free-text annotation produced by an external enrichment step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub port: u16,
    pub explanation: String,
}

/// Attach annotations to results in place, matching strictly by port.
/// Annotations for ports missing from `results` are ignored and results
/// without an annotation are left untouched. Returns the number applied.
pub fn apply_annotations(results: &mut [ScanResult], annotations: &[Annotation]) -> usize {
    let mut applied = 0;
    for annotation in annotations {
        for result in results.iter_mut().filter(|r| r.port == annotation.port) {
            result.ai_explanation = Some(annotation.explanation.clone());
            applied += 1;
        }
    }
    applied
}

/// Everything one scan produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub target: String,
    pub scan_type: ScanType,
    pub ports_scanned: usize,
    /// One entry per open port, ascending
    pub results: Vec<ScanResult>,
    pub os_detection: Option<OsInfo>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration: Duration,
}

impl ScanReport {
    pub fn open_ports(&self) -> Vec<u16> {
        self.results.iter().map(|r| r.port).collect()
    }

    pub fn result(&self, port: u16) -> Option<&ScanResult> {
        self.results.iter().find(|r| r.port == port)
    }
}

/// Tunables of one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub max_concurrency: usize,
    pub connect_timeout_ms: u64,
    pub enable_os_detection: bool,
    pub scan_type: ScanType,
    pub os_strategy: OsStrategy,
    pub timing: ProbeTiming,
    pub icmp_timeout_ms: u64,
    /// Post-handshake wait used to spot listeners that hang up at once
    pub settle_window_ms: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 100,
            connect_timeout_ms: 2000,
            enable_os_detection: false,
            scan_type: ScanType::TcpConnect,
            os_strategy: OsStrategy::Weighted,
            timing: ProbeTiming::default(),
            icmp_timeout_ms: 1000,
            settle_window_ms: 50,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let scan_type = ScanType::from_str(&config.scanning.default_scan_type).unwrap_or_else(|e| {
            warn!("{}, using tcp_connect", e);
            ScanType::TcpConnect
        });

        Self {
            max_concurrency: config.performance.max_concurrent_scans,
            connect_timeout_ms: config.network.connection_timeout_ms,
            enable_os_detection: config.scanning.os_detection,
            scan_type,
            os_strategy: config.scanning.os_strategy,
            timing: config.fingerprint,
            icmp_timeout_ms: config.network.icmp_timeout_ms,
            settle_window_ms: config.network.settle_window_ms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ScannerError::config("max_concurrency must be greater than 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ScannerError::config("connect_timeout_ms must be greater than 0"));
        }
        if self.icmp_timeout_ms == 0 {
            return Err(ScannerError::config("icmp_timeout_ms must be greater than 0"));
        }
        if !self.timing.is_valid() {
            return Err(ScannerError::config(
                "fingerprint connect budget and read timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn icmp_timeout(&self) -> Duration {
        Duration::from_millis(self.icmp_timeout_ms)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

/// Scan orchestrator: sweep, fingerprint, then optionally guess the OS
pub struct Scanner {
    options: ScanOptions,
    sweep: PortSweep,
    fingerprinter: FingerprintEngine,
    os_detector: OsDetector,
    metrics: Arc<ScanMetrics>,
}

impl Scanner {
    /// Scanner using real TCP and ICMP primitives
    pub fn new(options: ScanOptions, port_table: Arc<WellKnownPorts>) -> Result<Self> {
        let dialer = Arc::new(TcpDialer::with_settle_window(options.settle_window()));
        Self::with_network(options, port_table, dialer, Arc::new(IcmpTtlProbe::new()))
    }

    /// Scanner with injected network seams
    pub fn with_network(
        options: ScanOptions,
        port_table: Arc<WellKnownPorts>,
        dialer: Arc<dyn Dialer>,
        ttl_probe: Arc<dyn TtlProbe>,
    ) -> Result<Self> {
        options.validate()?;

        let sweep = PortSweep::new(dialer, options.max_concurrency, options.connect_timeout())?;
        let fingerprinter = FingerprintEngine::new(options.timing, port_table);
        let os_detector = OsDetector::new(options.os_strategy, ttl_probe, options.icmp_timeout());

        Ok(Self {
            options,
            sweep,
            fingerprinter,
            os_detector,
            metrics: Arc::new(ScanMetrics::new()),
        })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn metrics(&self) -> Arc<ScanMetrics> {
        self.metrics.clone()
    }

    /// Run a full scan. Target-side conditions never fail the scan; the
    /// report may simply contain no results.
    pub async fn scan(&self, target: &str, port_spec: &str) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", scan_id = %scan_id, target = %target);
        self.run_scan(scan_id, target, port_spec)
            .instrument(span)
            .await
    }

    async fn run_scan(&self, scan_id: Uuid, target: &str, port_spec: &str) -> ScanReport {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let scan_type = self.options.scan_type;
        let logger = ScanLogger::new(scan_id.to_string(), scan_type.as_str().to_string(), target.to_string());

        if scan_type == ScanType::Syn {
            warn!("SYN scan requires raw socket access - falling back to TCP connect scan");
        }

        let ports = parse_port_specification(port_spec);
        crate::log_scan_start!(scan_type.as_str(), target);

        logger.log_phase_start("port_sweep");
        let phase_start = Instant::now();
        let sweep = self.sweep.sweep(target, &ports).await;
        self.metrics.record_sweep(&sweep);
        let open_ports = sweep.open_ports();
        logger.log_phase_complete("port_sweep", phase_start.elapsed());
        info!("{} of {} ports open", open_ports.len(), ports.len());

        logger.log_phase_start("fingerprint");
        let phase_start = Instant::now();
        let fingerprints = self
            .fingerprinter
            .fingerprint_all(target, &open_ports, self.options.max_concurrency)
            .await;
        for fingerprint in &fingerprints {
            self.metrics.record_fingerprint(fingerprint);
        }
        logger.log_phase_complete("fingerprint", phase_start.elapsed());

        let results: Vec<ScanResult> = fingerprints.iter().map(ScanResult::from_fingerprint).collect();

        let os_detection = if self.options.enable_os_detection {
            logger.log_phase_start("os_detection");
            let phase_start = Instant::now();
            let os_info = self.os_detector.detect(target, &fingerprints).await;
            logger.log_phase_complete("os_detection", phase_start.elapsed());
            info!(
                "OS detection: {} (confidence {}%)",
                os_info.os_family, os_info.confidence
            );
            Some(os_info)
        } else {
            None
        };

        let report = ScanReport {
            scan_id,
            target: target.to_string(),
            scan_type,
            ports_scanned: ports.len(),
            results,
            os_detection,
            started_at,
            duration: start.elapsed(),
        };

        self.metrics.record_scan_completion(&report);
        crate::log_scan_complete!(scan_type.as_str(), target, report.duration, report.results.len());
        report
    }
}

/// Scan `target` with the builtin well-known port table
pub async fn scan(target: &str, port_spec: &str, options: ScanOptions) -> Result<ScanReport> {
    let scanner = Scanner::new(options, Arc::new(WellKnownPorts::builtin()))?;
    Ok(scanner.scan(target, port_spec).await)
}
