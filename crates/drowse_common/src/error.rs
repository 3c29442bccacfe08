//! Error types for drowse telemetry.
//!
//! Every error carries a [`Severity`]. Blocking errors abort the current
//! sample or report cycle; non-blocking errors only degrade one field.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How an error affects the operation that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The enclosing operation aborts for this cycle
    Blocking,
    /// The field is replaced by its sentinel and the operation continues
    NonBlocking,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::NonBlocking => "non-blocking",
        }
    }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to serialize request: {0}")]
    Serialize(String),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read response body: {0}")]
    ReadBody(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Cannot resolve root process: {0}")]
    RootProcess(String),

    #[error("Process query failed: {0}")]
    ProcessRead(String),

    #[error("Host lookup failed ({field}): {reason}")]
    HostLookup { field: &'static str, reason: String },
}

impl TelemetryError {
    pub fn severity(&self) -> Severity {
        match self {
            TelemetryError::HostLookup { .. } => Severity::NonBlocking,
            TelemetryError::Serialize(_)
            | TelemetryError::Transport(_)
            | TelemetryError::Timeout(_)
            | TelemetryError::ReadBody(_)
            | TelemetryError::Parse(_)
            | TelemetryError::RootProcess(_)
            | TelemetryError::ProcessRead(_) => Severity::Blocking,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity() == Severity::Blocking
    }
}

/// Report an error through the log at a level matching its severity
pub fn log_error(origin: &str, err: &TelemetryError) {
    match err.severity() {
        Severity::Blocking => warn!("[TELEMETRY] {}: {} ({})", origin, err, Severity::Blocking.as_str()),
        Severity::NonBlocking => debug!("[TELEMETRY] {}: {} ({})", origin, err, Severity::NonBlocking.as_str()),
    }
}

/// Failure of a single OS process query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The process exists but has no children. Not a failure for tree walks.
    #[error("process {0} does not have children")]
    NoChildren(i64),

    #[error("process {0} no longer exists")]
    Vanished(i64),

    #[error("process {pid} is unreadable: {reason}")]
    Unreadable { pid: i64, reason: String },

    #[error("host lookup unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_lookup_is_non_blocking() {
        let err = TelemetryError::HostLookup {
            field: "cpu_info",
            reason: "no cpus".to_string(),
        };
        assert_eq!(err.severity(), Severity::NonBlocking);
        assert!(!err.is_blocking());
    }

    #[test]
    fn test_transport_errors_are_blocking() {
        assert!(TelemetryError::Timeout(Duration::from_secs(4)).is_blocking());
        assert!(TelemetryError::Transport("refused".into()).is_blocking());
        assert!(TelemetryError::Parse("eof".into()).is_blocking());
        assert!(TelemetryError::RootProcess("gone".into()).is_blocking());
        assert!(TelemetryError::ProcessRead("pid -1".into()).is_blocking());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TelemetryError::Timeout(Duration::from_secs(4)).to_string(),
            "Request timed out after 4s"
        );
        assert_eq!(
            ProbeError::NoChildren(42).to_string(),
            "process 42 does not have children"
        );
    }
}
