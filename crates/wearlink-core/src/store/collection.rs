// ── Keyed reactive collection ──
//
// Concurrent map with a snapshot that subscribers receive through a `watch`
// channel. Writes that do not change the stored value leave the snapshot
// untouched.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

pub(crate) struct Collection<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<V>>,

    /// Values ordered by key, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<V>>>>,
}

impl<K, V> Collection<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or replace. Returns `true` if the stored value changed.
    pub(crate) fn upsert(&self, key: K, value: V) -> bool {
        if self.by_key.get(&key).is_some_and(|existing| **existing == value) {
            return false;
        }
        self.by_key.insert(key, Arc::new(value));
        self.rebuild_snapshot();
        true
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<V>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<V>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<V>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
