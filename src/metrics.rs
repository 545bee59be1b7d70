//! Scan metrics
//!
//! Every event is counted twice: in process atomics readable through
//! [`ScanMetrics::snapshot`], and through the `metrics` facade so an
//! installed recorder (Prometheus or otherwise) can export them.

use metrics::{counter, gauge, histogram};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    core::{PortState, ScanReport},
    scanner::SweepReport,
    service::ServiceFingerprint,
};

/// Counters accumulated across the scans of one [`crate::Scanner`]
#[derive(Debug, Default)]
pub struct ScanMetrics {
    scans_completed: AtomicU64,
    ports_probed: AtomicU64,
    open: AtomicU64,
    closed: AtomicU64,
    filtered: AtomicU64,
    fingerprints: AtomicU64,
    identified: AtomicU64,
    os_guesses: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        let open = report.count(PortState::Open) as u64;
        let closed = report.count(PortState::Closed) as u64;
        let filtered = report.count(PortState::Filtered) as u64;

        self.ports_probed.fetch_add(report.len() as u64, Ordering::Relaxed);
        self.open.fetch_add(open, Ordering::Relaxed);
        self.closed.fetch_add(closed, Ordering::Relaxed);
        self.filtered.fetch_add(filtered, Ordering::Relaxed);

        counter!("rustprobe_ports_probed_total", open, "state" => "open");
        counter!("rustprobe_ports_probed_total", closed, "state" => "closed");
        counter!("rustprobe_ports_probed_total", filtered, "state" => "filtered");
    }

    pub fn record_fingerprint(&self, fingerprint: &ServiceFingerprint) {
        self.fingerprints.fetch_add(1, Ordering::Relaxed);
        if !fingerprint.tier.is_generic() {
            self.identified.fetch_add(1, Ordering::Relaxed);
        }

        counter!("rustprobe_fingerprints_total", 1, "tier" => fingerprint.tier.as_str());
        histogram!("rustprobe_fingerprint_confidence", fingerprint.confidence as f64);
    }

    pub fn record_scan_completion(&self, report: &ScanReport) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        if report.os_detection.as_ref().map_or(false, |os| !os.is_unknown()) {
            self.os_guesses.fetch_add(1, Ordering::Relaxed);
        }

        let seconds = report.duration.as_secs_f64();
        counter!("rustprobe_scans_completed_total", 1);
        histogram!("rustprobe_scan_duration_seconds", seconds);
        gauge!("rustprobe_last_scan_open_ports", report.results.len() as f64);
        if seconds > 0.0 {
            gauge!(
                "rustprobe_last_scan_ports_per_second",
                report.ports_scanned as f64 / seconds
            );
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            ports_probed: self.ports_probed.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            fingerprints: self.fingerprints.load(Ordering::Relaxed),
            identified: self.identified.load(Ordering::Relaxed),
            os_guesses: self.os_guesses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub scans_completed: u64,
    pub ports_probed: u64,
    pub open: u64,
    pub closed: u64,
    pub filtered: u64,
    pub fingerprints: u64,
    /// Fingerprints that reached a protocol-specific verdict
    pub identified: u64,
    pub os_guesses: u64,
}

impl MetricsSnapshot {
    /// Share of fingerprints with a protocol-specific verdict, in percent
    pub fn identification_rate(&self) -> f64 {
        if self.fingerprints == 0 {
            0.0
        } else {
            self.identified as f64 / self.fingerprints as f64 * 100.0
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan Statistics:")?;
        writeln!(f, "  Scans completed: {}", self.scans_completed)?;
        writeln!(
            f,
            "  Ports probed: {} ({} open, {} closed, {} filtered)",
            self.ports_probed, self.open, self.closed, self.filtered
        )?;
        writeln!(
            f,
            "  Services identified: {}/{} ({:.1}%)",
            self.identified,
            self.fingerprints,
            self.identification_rate()
        )?;
        write!(f, "  OS guesses: {}", self.os_guesses)
    }
}
