// ── Cache subscriptions ──
//
// Change notification over a cached list, yielding the new snapshot.

use std::sync::Arc;

use tokio::sync::watch;

type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A subscription to one cached list (music players, apps).
pub struct CacheStream<T: Send + Sync + 'static> {
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> CacheStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next change. `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
