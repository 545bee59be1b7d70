//! Error handling for the scan engine
//!
//! Target-side conditions (closed ports, blocked ICMP, silent services) are
//! never errors: they are absorbed into port states and fingerprint notes.
//! The variants here cover what can legitimately fail:
//! - Configuration errors (zero concurrency, invalid settings)
//! - Network primitive failures surfaced by the seam traits
//! - IO errors (configuration and port table files)

use std::{fmt, io};
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, ScannerError>;

#[derive(Error, Debug, Clone)]
pub enum ScannerError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Network connectivity and protocol errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Target specification and resolution errors
    #[error("Invalid target: {target} - {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Timeout errors with contextual information
    #[error("Timeout: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Validation errors for user input
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("IO error: {operation} - {message}")]
    Io { operation: String, message: String },

    /// Generic internal errors with context
    #[error("Internal error: {context} - {message}")]
    Internal { context: String, message: String },
}

impl ScannerError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn invalid_target<T: Into<String>, R: Into<String>>(target: T, reason: R) -> Self {
        Self::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout<O: Into<String>>(operation: O, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn io<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Io {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn internal<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        Self::Internal {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Check if error is recoverable (a retry may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Check if error is a configuration issue
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Validation { .. })
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Configuration { .. } | Self::Validation { .. } => ErrorSeverity::High,
            Self::Network { .. } | Self::Timeout { .. } | Self::Io { .. } => ErrorSeverity::Medium,
            Self::InvalidTarget { .. } => ErrorSeverity::Low,
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<io::Error> for ScannerError {
    fn from(error: io::Error) -> Self {
        Self::io("IO operation", error.to_string())
    }
}

impl From<std::num::ParseIntError> for ScannerError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::validation("number parsing", error.to_string())
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal("JSON", error.to_string())
    }
}

impl From<config::ConfigError> for ScannerError {
    fn from(error: config::ConfigError) -> Self {
        Self::config(error.to_string())
    }
}
