//! Probe timing budget for service fingerprinting
//!
//! Every suspension point of the fingerprint state machine is bounded by one
//! of these durations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONNECT_BUDGET_MS: u64 = 1500;
pub const DEFAULT_LISTEN_WINDOW_MS: u64 = 150;
pub const DEFAULT_PROBE_WAIT_MS: u64 = 200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTiming {
    /// Upper bound for the TCP handshake
    pub connect_budget_ms: u64,
    /// How long to wait for a service that greets first
    pub listen_window_ms: u64,
    /// Delay between sending a probe and reading the reply
    pub probe_wait_ms: u64,
    /// Upper bound for a single read or write
    pub read_timeout_ms: u64,
}

impl Default for ProbeTiming {
    fn default() -> Self {
        Self {
            connect_budget_ms: DEFAULT_CONNECT_BUDGET_MS,
            listen_window_ms: DEFAULT_LISTEN_WINDOW_MS,
            probe_wait_ms: DEFAULT_PROBE_WAIT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl ProbeTiming {
    pub fn connect_budget(&self) -> Duration {
        Duration::from_millis(self.connect_budget_ms)
    }

    pub fn listen_window(&self) -> Duration {
        Duration::from_millis(self.listen_window_ms)
    }

    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Worst-case wall time spent on one port
    pub fn worst_case(&self) -> Duration {
        self.connect_budget()
            + self.listen_window()
            + self.read_timeout() // probe write
            + self.probe_wait()
            + self.read_timeout()
    }

    /// A zero budget would turn every port into a timeout
    pub fn is_valid(&self) -> bool {
        self.connect_budget_ms > 0 && self.read_timeout_ms > 0
    }
}
