// ── Core error types ──
//
// Errors surfaced by controller APIs and handlers. Protocol outcomes are
// never errors: the execution chain and the codec report `ActionStatus` or
// `None` instead. The `From` impls translate seam-level errors (transport,
// device, I/O) into domain-appropriate variants.

use thiserror::Error;

use crate::device::DeviceError;
use crate::model::NodeId;
use crate::transport::TransportError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connectivity ─────────────────────────────────────────────────
    #[error("No reachable peer advertises the companion capability")]
    NoPeer,

    #[error("Send to node {node} failed: {reason}")]
    SendFailed { node: NodeId, reason: String },

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Session has been shut down")]
    SessionClosed,

    // ── Payload errors ───────────────────────────────────────────────
    #[error("Invalid payload on {path}: {message}")]
    InvalidPayload { path: String, message: String },

    #[error("Invalid action: {message}")]
    InvalidAction { message: String },

    // ── Device / helper ──────────────────────────────────────────────
    #[error("Device operation failed: {message}")]
    Device { message: String },

    #[error("Privileged helper unavailable: {message}")]
    HelperUnavailable { message: String },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid_payload(path: &str, message: impl Into<String>) -> Self {
        CoreError::InvalidPayload {
            path: path.to_owned(),
            message: message.into(),
        }
    }
}

// ── Conversion from seam-level errors ────────────────────────────────

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable { node } => CoreError::SendFailed {
                node,
                reason: "node unreachable".into(),
            },
            TransportError::Rejected { node, reason } => CoreError::SendFailed { node, reason },
            TransportError::Timeout { timeout_ms } => CoreError::Timeout {
                what: "transport".into(),
                timeout_ms,
            },
            TransportError::Closed => CoreError::SessionClosed,
            TransportError::Discovery(message) => CoreError::Internal(format!(
                "capability query failed: {message}"
            )),
        }
    }
}

impl From<DeviceError> for CoreError {
    fn from(err: DeviceError) -> Self {
        CoreError::Device {
            message: err.to_string(),
        }
    }
}
