//! Network primitives behind the [`Dialer`] and [`TtlProbe`] seams
//!
//! [`TcpDialer`] performs the connect attempts of the port sweep and
//! [`IcmpTtlProbe`] sends the single ICMP echo used for TTL voting.

use async_trait::async_trait;
use std::{
    io,
    net::IpAddr,
    time::Duration,
};
use surge_ping::IcmpPacket;
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

use crate::{
    core::{Dialer, ProbeOutcome, TtlProbe},
    error::{Result, ScannerError},
};

/// Default time to wait after the handshake for an immediate close
pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(50);

/// TCP connect dialer used by the port sweep
#[derive(Debug, Clone)]
pub struct TcpDialer {
    settle_window: Duration,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
        }
    }

    /// Zero disables the post-handshake check
    pub fn with_settle_window(settle_window: Duration) -> Self {
        Self { settle_window }
    }

    /// A completed handshake only counts as open if the peer does not hang
    /// up straight away.
    async fn settle(&self, stream: &TcpStream) -> ProbeOutcome {
        if self.settle_window.is_zero() {
            return ProbeOutcome::Open;
        }

        let mut buf = [0u8; 1];
        match timeout(self.settle_window, stream.peek(&mut buf)).await {
            Err(_) => ProbeOutcome::Open,
            Ok(Ok(0)) => ProbeOutcome::PeerClosed,
            Ok(Ok(_)) => ProbeOutcome::Open,
            Ok(Err(e)) if is_reset(&e) => ProbeOutcome::PeerClosed,
            Ok(Err(e)) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn probe(&self, target: &str, port: u16, connect_timeout: Duration) -> ProbeOutcome {
        match timeout(connect_timeout, TcpStream::connect((target, port))).await {
            Err(_) => ProbeOutcome::TimedOut,
            Ok(Err(e)) => classify_connect_error(&e),
            Ok(Ok(stream)) => {
                let outcome = self.settle(&stream).await;
                drop(stream);
                outcome
            }
        }
    }
}

/// Map a failed connect to an outcome. Refusals and timeouts are clean
/// signals; everything else is ambiguous.
pub fn classify_connect_error(error: &io::Error) -> ProbeOutcome {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => ProbeOutcome::Refused,
        io::ErrorKind::TimedOut => ProbeOutcome::TimedOut,
        _ if is_reset(error) => ProbeOutcome::Refused,
        _ => ProbeOutcome::Unreachable(error.to_string()),
    }
}

fn is_reset(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

/// Resolve a target string to the first address it maps to
pub async fn resolve_target(target: &str) -> Result<IpAddr> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    tokio::net::lookup_host((target, 0))
        .await
        .map_err(|e| ScannerError::invalid_target(target, e.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ScannerError::invalid_target(target, "no address found"))
}

/// ICMP echo based TTL sampler.
///
/// Needs raw or datagram ICMP socket permission; without it every call
/// fails and the caller simply loses the TTL vote.
#[derive(Debug, Clone, Default)]
pub struct IcmpTtlProbe;

impl IcmpTtlProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TtlProbe for IcmpTtlProbe {
    async fn echo_ttl(&self, target: &str, echo_timeout: Duration) -> Result<u8> {
        let ip = resolve_target(target).await?;
        let payload = [0u8; 56];

        let (packet, rtt) = timeout(echo_timeout, surge_ping::ping(ip, &payload))
            .await
            .map_err(|_| ScannerError::timeout("icmp_echo", echo_timeout.as_millis() as u64))?
            .map_err(|e| ScannerError::network(format!("ICMP echo to {} failed: {}", ip, e)))?;

        let ttl: Option<u8> = match packet {
            IcmpPacket::V4(reply) => reply.get_ttl().into(),
            IcmpPacket::V6(_) => None,
        };

        debug!("ICMP echo reply from {} in {:?} (ttl {:?})", ip, rtt, ttl);
        ttl.ok_or_else(|| ScannerError::network(format!("no TTL in echo reply from {}", ip)))
    }
}
