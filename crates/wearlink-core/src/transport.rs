// ── Transport seam ──
//
// The wireless message layer is external. The core reaches it through the
// `Transport` trait for outbound sends and capability queries, and receives
// inbound traffic as `TransportEvent`s on a channel fed by the transport glue.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::model::{Node, NodeId};

/// A message delivered by the transport: `deliver(path, bytes, source)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub source: NodeId,
    pub path: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(source: impl Into<NodeId>, path: impl Into<String>, payload: Bytes) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
            payload,
        }
    }
}

/// Everything the transport pushes at a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(InboundMessage),
    /// The set of nodes advertising a capability changed.
    CapabilityChanged,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("node {node} is unreachable")]
    Unreachable { node: NodeId },

    #[error("node {node} rejected the message: {reason}")]
    Rejected { node: NodeId, reason: String },

    #[error("transport call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport closed")]
    Closed,

    #[error("capability query failed: {0}")]
    Discovery(String),
}

/// Outbound half of the node-to-node message layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Node id of the local device.
    fn local_node(&self) -> &NodeId;

    /// Send one message to one node.
    async fn send(&self, node: &NodeId, path: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Nodes currently reachable and advertising `capability`.
    async fn capable_nodes(&self, capability: &str) -> Result<Vec<Node>, TransportError>;
}
