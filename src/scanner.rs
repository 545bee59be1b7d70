//! Port sweep implementation
//!
//! Provides the discovery half of a scan:
//! - Port specification parsing (total, never fails)
//! - Bounded-concurrency connect probing through the [`Dialer`] seam
//! - Per-port outcome aggregation in ascending port order

use futures::stream::{FuturesUnordered, StreamExt};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::{
    core::{Dialer, PortState, ProbeOutcome},
    error::{Result, ScannerError},
};

/// Ports scanned when the specification is empty
pub const TOP_PORTS: [u16; 15] = [
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 3306, 3389, 8080,
];

/// Parse a port specification such as `"22,80,8000-8010"`.
///
/// Malformed tokens are dropped. The result is ascending, deduplicated and
/// within `1..=65535`; empty input yields [`TOP_PORTS`].
pub fn parse_port_specification(spec: &str) -> Vec<u16> {
    if spec.trim().is_empty() {
        return TOP_PORTS.to_vec();
    }

    let mut ports = BTreeSet::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.contains('-') {
            let range_parts: Vec<&str> = part.split('-').collect();
            if range_parts.len() != 2 {
                continue;
            }

            let (Ok(start), Ok(end)) = (
                range_parts[0].trim().parse::<i64>(),
                range_parts[1].trim().parse::<i64>(),
            ) else {
                continue;
            };

            let end = end.min(u16::MAX as i64);
            if start < 1 || start > end {
                continue;
            }

            // Both bounds are inside 1..=65535 here
            ports.extend(start as u16..=end as u16);
        } else if let Ok(port) = part.parse::<u16>() {
            if port != 0 {
                ports.insert(port);
            }
        }
    }

    ports.into_iter().collect()
}

/// Outcome of every attempted port, keyed by port
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    outcomes: BTreeMap<u16, ProbeOutcome>,
}

impl SweepReport {
    pub fn outcome(&self, port: u16) -> Option<&ProbeOutcome> {
        self.outcomes.get(&port)
    }

    pub fn state(&self, port: u16) -> Option<PortState> {
        self.outcomes.get(&port).map(ProbeOutcome::state)
    }

    pub fn states(&self) -> BTreeMap<u16, PortState> {
        self.outcomes
            .iter()
            .map(|(&port, outcome)| (port, outcome.state()))
            .collect()
    }

    /// Open ports, ascending
    pub fn open_ports(&self) -> Vec<u16> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_open())
            .map(|(&port, _)| port)
            .collect()
    }

    pub fn count(&self, state: PortState) -> usize {
        self.outcomes.values().filter(|o| o.state() == state).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Bounded-concurrency connect sweep
pub struct PortSweep {
    dialer: Arc<dyn Dialer>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
}

impl PortSweep {
    pub fn new(dialer: Arc<dyn Dialer>, max_concurrency: usize, timeout: Duration) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(ScannerError::config("max_concurrency must be greater than 0"));
        }
        if timeout.is_zero() {
            return Err(ScannerError::config("connection timeout must be greater than 0"));
        }

        Ok(Self {
            dialer,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout,
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Permits not currently held by an attempt
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Probe every port once. Dropping the returned future cancels all
    /// pending attempts.
    pub async fn sweep(&self, target: &str, ports: &[u16]) -> SweepReport {
        debug!(
            "Starting TCP connect sweep of {} ports on {} (concurrency {})",
            ports.len(),
            target,
            self.max_concurrency
        );

        let mut pending: FuturesUnordered<_> = ports
            .iter()
            .map(|&port| self.probe_port(target, port))
            .collect();

        let mut outcomes = BTreeMap::new();
        while let Some((port, outcome)) = pending.next().await {
            outcomes.insert(port, outcome);
        }

        SweepReport { outcomes }
    }

    async fn probe_port(&self, target: &str, port: u16) -> (u16, ProbeOutcome) {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return (
                    port,
                    ProbeOutcome::Unreachable("concurrency limiter closed".to_string()),
                )
            }
        };

        let outcome = self.dialer.probe(target, port, self.timeout).await;
        debug!("Port {}:{} -> {:?}", target, port, outcome);

        if outcome.is_open() {
            crate::log_port_discovery!(target, port, outcome.state().as_str(), None::<&str>);
        }

        (port, outcome)
    }
}
