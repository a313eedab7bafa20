// ── Session runtime ──
//
// Owns the cancellation token and task tracker shared by everything a
// controller spawns, and runs the inbound loop: one task per message, plus
// a discovery refresh whenever the transport reports a capability change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::codec::{decode_i32, encode_i32};
use crate::error::CoreError;
use crate::events::CompanionEvent;
use crate::model::AppState;
use crate::router::routes::{APP_STATE_PATH, PING_PATH, PROTOCOL_VERSION, VERSION_PATH};
use crate::router::{DispatchOutcome, Messenger, Router, SendReport};
use crate::transport::{InboundMessage, TransportEvent};

const EVENT_CAPACITY: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub(crate) struct Session {
    events: broadcast::Sender<Arc<CompanionEvent>>,
    app_state: watch::Sender<AppState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl Session {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            app_state: watch::channel(AppState::Closed).0,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    pub(crate) fn events(&self) -> &broadcast::Sender<Arc<CompanionEvent>> {
        &self.events
    }

    pub(crate) fn emit(&self, event: CompanionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(Arc::new(event));
    }

    pub(crate) fn app_state(&self) -> AppState {
        *self.app_state.borrow()
    }

    pub(crate) fn set_app_state(&self, state: AppState) {
        self.app_state.send_replace(state);
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Start the inbound loop. A second call is a no-op.
    pub(crate) fn start(&self, router: Arc<Router>, inbound: mpsc::Receiver<TransportEvent>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("session already started");
            return;
        }
        self.tracker.spawn(inbound_loop(
            router,
            inbound,
            self.events.clone(),
            self.cancel.clone(),
            self.tracker.clone(),
        ));
    }

    /// Cancel everything and wait (bounded) for tracked tasks to finish.
    pub(crate) async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("session tasks still running after shutdown grace period");
        }
        debug!("session stopped");
    }
}

async fn inbound_loop(
    router: Arc<Router>,
    mut inbound: mpsc::Receiver<TransportEvent>,
    events: broadcast::Sender<Arc<CompanionEvent>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = inbound.recv() => {
                let Some(event) = event else {
                    debug!("transport channel closed");
                    break;
                };
                match event {
                    TransportEvent::Message(msg) => {
                        let router = Arc::clone(&router);
                        let cancel = cancel.clone();
                        tracker.spawn(async move {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => {}
                                outcome = router.dispatch(&msg) => {
                                    if let DispatchOutcome::Failed(route) = outcome {
                                        debug!(%route, path = %msg.path, "message dropped after handler failure");
                                    }
                                }
                            }
                        });
                    }
                    TransportEvent::CapabilityChanged => {
                        let messenger = Arc::clone(router.messenger());
                        let events = events.clone();
                        let cancel = cancel.clone();
                        tracker.spawn(async move {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => {}
                                () = on_capability_changed(&messenger, &events) => {}
                            }
                        });
                    }
                }
            }
        }
    }
}

async fn on_capability_changed(
    messenger: &Messenger,
    events: &broadcast::Sender<Arc<CompanionEvent>>,
) {
    let discovery = messenger.discovery();
    if !discovery.refresh().await {
        return;
    }
    let nodes = discovery.nodes();
    info!(count = nodes.len(), capability = discovery.capability(), "peer set changed");
    let _ = events.send(Arc::new(CompanionEvent::PeersChanged(nodes.to_vec())));

    if !nodes.is_empty() {
        messenger.send(None, PING_PATH, Bytes::new()).await;
    }
}

// ── Handlers shared by both roles ────────────────────────────────────

/// `/ping`: answer with our app state.
pub(crate) async fn answer_ping(
    session: &Session,
    msg: &InboundMessage,
    out: &Messenger,
) -> Result<(), CoreError> {
    let state = session.app_state();
    out.send_json(Some(&msg.source), APP_STATE_PATH, &state).await;
    Ok(())
}

/// `/version`: empty payload asks for ours, otherwise it is the peer's.
pub(crate) async fn exchange_version(
    session: &Session,
    msg: &InboundMessage,
    out: &Messenger,
) -> Result<(), CoreError> {
    if msg.payload.is_empty() {
        out.send(Some(&msg.source), VERSION_PATH, encode_i32(PROTOCOL_VERSION))
            .await;
        return Ok(());
    }
    let version = decode_i32(&msg.payload)
        .ok_or_else(|| CoreError::invalid_payload(&msg.path, "expected i32 version"))?;
    if version != PROTOCOL_VERSION {
        info!(node = %msg.source, version, ours = PROTOCOL_VERSION, "peer runs a different protocol version");
    }
    session.emit(CompanionEvent::PeerVersion {
        node: msg.source.clone(),
        version,
    });
    Ok(())
}

/// Broadcast our app state to every peer.
pub(crate) async fn announce_app_state(
    session: &Session,
    out: &Messenger,
    state: AppState,
) -> SendReport {
    session.set_app_state(state);
    out.send_json(None, APP_STATE_PATH, &state).await
}
