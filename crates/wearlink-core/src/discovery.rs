// ── Peer discovery ──
//
// Caches the set of reachable nodes advertising the peer capability. The
// cache is swapped wholesale on refresh so readers never block on a query
// in flight.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::model::{Node, NodeId};
use crate::transport::Transport;

pub struct PeerDiscovery {
    transport: Arc<dyn Transport>,
    capability: String,
    timeout: Duration,
    nodes: ArcSwap<Vec<Node>>,
}

impl PeerDiscovery {
    pub fn new(transport: Arc<dyn Transport>, capability: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            capability: capability.into(),
            timeout,
            nodes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Cached node set (cheap `Arc` clone).
    pub fn nodes(&self) -> Arc<Vec<Node>> {
        self.nodes.load_full()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.load().iter().any(|n| &n.id == node)
    }

    /// Re-query the transport and replace the cache.
    ///
    /// A query that fails or outlives the bound yields an empty set rather
    /// than an error. Returns `true` when the set of node ids changed.
    pub async fn refresh(&self) -> bool {
        let found = match tokio::time::timeout(
            self.timeout,
            self.transport.capable_nodes(&self.capability),
        )
        .await
        {
            Ok(Ok(nodes)) => nodes,
            Ok(Err(e)) => {
                warn!(capability = %self.capability, error = %e, "capability query failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    capability = %self.capability,
                    timeout_ms = self.timeout.as_millis(),
                    "capability query timed out"
                );
                Vec::new()
            }
        };

        let local = self.transport.local_node();
        let mut found: Vec<Node> = found.into_iter().filter(|n| &n.id != local).collect();
        found.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        found.dedup_by(|a, b| a.id == b.id);

        let previous = self.nodes.swap(Arc::new(found));
        let current = self.nodes.load();
        let changed = !same_ids(&previous, &current);

        debug!(
            capability = %self.capability,
            count = current.len(),
            changed,
            "peer discovery refreshed"
        );
        changed
    }

    /// Nodes to send to, querying the transport first if nothing is cached.
    pub async fn reachable_nodes(&self) -> Arc<Vec<Node>> {
        if self.nodes.load().is_empty() {
            self.refresh().await;
        }
        self.nodes()
    }

    pub async fn is_peer_available(&self) -> bool {
        !self.reachable_nodes().await.is_empty()
    }
}

fn same_ids(a: &[Node], b: &[Node]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::transport::TransportError;

    struct FixedTransport {
        local: NodeId,
        nodes: Vec<Node>,
        fail: bool,
        stall: bool,
        queries: AtomicUsize,
    }

    impl FixedTransport {
        fn new(nodes: Vec<Node>) -> Self {
            Self {
                local: NodeId::from("local"),
                nodes,
                fail: false,
                stall: false,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        fn local_node(&self) -> &NodeId {
            &self.local
        }

        async fn send(&self, _: &NodeId, _: &str, _: Bytes) -> Result<(), TransportError> {
            Ok(())
        }

        async fn capable_nodes(&self, _: &str) -> Result<Vec<Node>, TransportError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(TransportError::Discovery("service unavailable".into()));
            }
            Ok(self.nodes.clone())
        }
    }

    fn discovery(transport: FixedTransport) -> (Arc<FixedTransport>, PeerDiscovery) {
        let transport = Arc::new(transport);
        let d = PeerDiscovery::new(transport.clone(), "wearlink_phone", Duration::from_millis(50));
        (transport, d)
    }

    #[tokio::test]
    async fn refresh_reports_changes_and_drops_local_node() {
        let (_, d) = discovery(FixedTransport::new(vec![
            Node::new("phone", "Pixel"),
            Node::new("local", "Me"),
        ]));

        assert!(d.refresh().await);
        assert_eq!(d.nodes().len(), 1);
        assert!(d.contains(&NodeId::from("phone")));
        assert!(!d.refresh().await);
    }

    #[tokio::test]
    async fn failing_query_yields_empty_set() {
        let mut t = FixedTransport::new(vec![Node::new("phone", "Pixel")]);
        t.fail = true;
        let (_, d) = discovery(t);

        assert!(!d.refresh().await);
        assert!(!d.is_peer_available().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_query_is_bounded() {
        let mut t = FixedTransport::new(vec![Node::new("phone", "Pixel")]);
        t.stall = true;
        let (_, d) = discovery(t);

        d.refresh().await;
        assert!(d.nodes().is_empty());
    }

    #[tokio::test]
    async fn availability_queries_lazily_only_when_empty() {
        let (t, d) = discovery(FixedTransport::new(vec![Node::new("phone", "Pixel")]));

        assert!(d.is_peer_available().await);
        assert!(d.is_peer_available().await);
        assert_eq!(t.queries.load(Ordering::SeqCst), 1);
    }
}
