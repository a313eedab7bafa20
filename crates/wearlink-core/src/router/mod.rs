// ── Message routing ──
//
// Inbound messages resolve to a `Route` by path and go to the handler
// registered for it. Outbound messages go through `Messenger`, which
// targets one node or fans out to every discovered peer.

pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::codec::{encode_action, encode_json};
use crate::discovery::PeerDiscovery;
use crate::error::CoreError;
use crate::model::{Action, NodeId};
use crate::transport::{InboundMessage, Transport, TransportError};

pub use routes::{MatchKind, Route};

// ── Outbound ─────────────────────────────────────────────────────────

/// Per-node outcome of one send. A failed node never blocks the others.
#[derive(Debug, Default)]
pub struct SendReport {
    pub delivered: Vec<NodeId>,
    pub failed: Vec<(NodeId, TransportError)>,
}

impl SendReport {
    /// True when there was nobody to send to.
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }

    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }

    pub fn merge(&mut self, other: SendReport) {
        self.delivered.extend(other.delivered);
        self.failed.extend(other.failed);
    }
}

pub struct Messenger {
    transport: Arc<dyn Transport>,
    discovery: Arc<PeerDiscovery>,
}

impl Messenger {
    pub fn new(transport: Arc<dyn Transport>, discovery: Arc<PeerDiscovery>) -> Self {
        Self {
            transport,
            discovery,
        }
    }

    pub fn local_node(&self) -> &NodeId {
        self.transport.local_node()
    }

    pub fn discovery(&self) -> &Arc<PeerDiscovery> {
        &self.discovery
    }

    /// Send to `target`, or to every reachable peer when `target` is `None`.
    pub async fn send(&self, target: Option<&NodeId>, path: &str, payload: Bytes) -> SendReport {
        let targets: Vec<NodeId> = match target {
            Some(node) => vec![node.clone()],
            None => self
                .discovery
                .reachable_nodes()
                .await
                .iter()
                .map(|n| n.id.clone())
                .collect(),
        };

        if targets.is_empty() {
            debug!(path, "no reachable peers, message dropped");
            return SendReport::default();
        }

        let sends = targets.into_iter().map(|node| {
            let payload = payload.clone();
            async move {
                let result = self.transport.send(&node, path, payload).await;
                (node, result)
            }
        });

        let mut report = SendReport::default();
        for (node, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    trace!(%node, path, "sent");
                    report.delivered.push(node);
                }
                Err(e) => {
                    warn!(%node, path, error = %e, "send failed");
                    report.failed.push((node, e));
                }
            }
        }
        report
    }

    pub async fn send_action(&self, target: Option<&NodeId>, path: &str, action: &Action) -> SendReport {
        match encode_action(action) {
            Some(payload) => self.send(target, path, payload).await,
            None => SendReport::default(),
        }
    }

    pub async fn send_json<T: Serialize + Sync + ?Sized>(
        &self,
        target: Option<&NodeId>,
        path: &str,
        value: &T,
    ) -> SendReport {
        match encode_json(value) {
            Some(payload) => self.send(target, path, payload).await,
            None => SendReport::default(),
        }
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(
        &self,
        route: Route,
        msg: &InboundMessage,
        out: &Messenger,
    ) -> Result<(), CoreError>;
}

/// What happened to one inbound message. None of these are errors for the
/// session: every outcome is logged and the loop moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(Route),
    /// No route claims the path.
    Unrouted,
    /// The route exists but this side registered no handler for it.
    NoHandler(Route),
    Failed(Route),
}

pub struct Router {
    handlers: HashMap<Route, Arc<dyn RouteHandler>>,
    messenger: Arc<Messenger>,
}

impl Router {
    pub fn new(messenger: Arc<Messenger>) -> Self {
        Self {
            handlers: HashMap::new(),
            messenger,
        }
    }

    #[must_use]
    pub fn register(mut self, route: Route, handler: Arc<dyn RouteHandler>) -> Self {
        self.handlers.insert(route, handler);
        self
    }

    #[must_use]
    pub fn register_all(mut self, routes: &[Route], handler: &Arc<dyn RouteHandler>) -> Self {
        for route in routes {
            self.handlers.insert(*route, Arc::clone(handler));
        }
        self
    }

    pub fn handles(&self, route: Route) -> bool {
        self.handlers.contains_key(&route)
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> DispatchOutcome {
        let Some(route) = Route::resolve(&msg.path) else {
            debug!(path = %msg.path, source = %msg.source, "unrouted message ignored");
            return DispatchOutcome::Unrouted;
        };
        let Some(handler) = self.handlers.get(&route) else {
            debug!(%route, path = %msg.path, "no handler registered");
            return DispatchOutcome::NoHandler(route);
        };

        match handler.handle(route, msg, &self.messenger).await {
            Ok(()) => {
                trace!(%route, path = %msg.path, "handled");
                DispatchOutcome::Handled(route)
            }
            Err(e) => {
                warn!(%route, path = %msg.path, source = %msg.source, error = %e, "handler failed");
                DispatchOutcome::Failed(route)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::model::Node;

    #[derive(Default)]
    struct RecordingTransport {
        local: NodeId,
        peers: Vec<Node>,
        broken: Vec<NodeId>,
        sent: Mutex<Vec<(NodeId, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn local_node(&self) -> &NodeId {
            &self.local
        }

        async fn send(&self, node: &NodeId, path: &str, _: Bytes) -> Result<(), TransportError> {
            if self.broken.contains(node) {
                return Err(TransportError::Unreachable { node: node.clone() });
            }
            self.sent.lock().unwrap().push((node.clone(), path.to_owned()));
            Ok(())
        }

        async fn capable_nodes(&self, _: &str) -> Result<Vec<Node>, TransportError> {
            Ok(self.peers.clone())
        }
    }

    fn messenger(transport: RecordingTransport) -> (Arc<RecordingTransport>, Arc<Messenger>) {
        let transport = Arc::new(transport);
        let discovery = Arc::new(PeerDiscovery::new(
            transport.clone(),
            "cap",
            Duration::from_secs(1),
        ));
        (transport.clone(), Arc::new(Messenger::new(transport, discovery)))
    }

    #[tokio::test]
    async fn broadcast_survives_a_failing_node() {
        let (transport, m) = messenger(RecordingTransport {
            peers: vec![Node::new("a", "A"), Node::new("b", "B"), Node::new("c", "C")],
            broken: vec![NodeId::from("b")],
            ..Default::default()
        });

        let report = m.send(None, routes::PING_PATH, Bytes::new()).await;

        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, NodeId::from("b"));
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_peers_means_empty_report() {
        let (_, m) = messenger(RecordingTransport::default());
        let report = m.send(None, routes::PING_PATH, Bytes::new()).await;
        assert!(report.is_empty());
    }

    struct Counting(Mutex<Vec<(Route, String)>>);

    #[async_trait]
    impl RouteHandler for Counting {
        async fn handle(&self, route: Route, msg: &InboundMessage, _: &Messenger) -> Result<(), CoreError> {
            if msg.payload.as_ref() == b"boom" {
                return Err(CoreError::invalid_payload(&msg.path, "boom"));
            }
            self.0.lock().unwrap().push((route, msg.path.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_classifies_every_message() {
        let (_, m) = messenger(RecordingTransport::default());
        let counting = Arc::new(Counting(Mutex::new(Vec::new())));
        let handler: Arc<dyn RouteHandler> = counting.clone();
        let router = Router::new(m).register_all(&[Route::Status, Route::Ping], &handler);

        let msg = |path: &str, payload: &'static [u8]| {
            InboundMessage::new("peer", path, Bytes::from_static(payload))
        };

        assert_eq!(
            router.dispatch(&msg(routes::WIFI_STATUS_PATH, b"")).await,
            DispatchOutcome::Handled(Route::Status)
        );
        assert_eq!(
            router.dispatch(&msg(routes::PING_PATH, b"boom")).await,
            DispatchOutcome::Failed(Route::Ping)
        );
        assert_eq!(
            router.dispatch(&msg(routes::APPS_PATH, b"")).await,
            DispatchOutcome::NoHandler(Route::Apps)
        );
        assert_eq!(
            router.dispatch(&msg("/unknown", b"")).await,
            DispatchOutcome::Unrouted
        );
        assert_eq!(counting.0.lock().unwrap().len(), 1);
    }
}
