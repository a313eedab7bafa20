// ── Phone-side controller ──
//
// Serves the watch: executes or schedules requested actions, answers status,
// media, app and sleep-timer requests, and pushes state when the device
// changes underneath us.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::codec::{decode_action, decode_i32, decode_json, encode_bool, encode_string};
use crate::config::CompanionConfig;
use crate::device::{DeviceError, DevicePlatform};
use crate::discovery::PeerDiscovery;
use crate::error::CoreError;
use crate::events::CompanionEvent;
use crate::exec::{ActionExecutor, TimedActionScheduler};
use crate::model::{Action, ActionStatus, AppItem, AppState, NodeId, SleepTimerStatus};
use crate::router::routes::{
    ACTIONS_PATH, APPS_PATH, BT_DISCOVER_PATH, LAUNCH_APP_PATH, MUSIC_PLAYERS_PATH,
    OPEN_MUSIC_PLAYER_PATH, PLAY_COMMAND_PATH, SLEEP_TIMER_ENABLED_PATH, SLEEP_TIMER_START_PATH,
    SLEEP_TIMER_STATUS_PATH, SLEEP_TIMER_STOP_PATH, START_ACTIVITY_PATH, STATUS_PATH,
};
use crate::router::{Messenger, Route, RouteHandler, Router, SendReport};
use crate::session::{self, Session};
use crate::status::{StatusReporter, StatusScope};
use crate::transport::{InboundMessage, Transport, TransportEvent};

const ROUTES: &[Route] = &[
    Route::Actions,
    Route::Status,
    Route::AppState,
    Route::Ping,
    Route::Version,
    Route::Music,
    Route::Apps,
    Route::SleepTimer,
    Route::StartActivity,
];

#[derive(Clone)]
pub struct PhoneController {
    inner: Arc<PhoneInner>,
}

struct PhoneInner {
    config: CompanionConfig,
    device: Arc<dyn DevicePlatform>,
    messenger: Arc<Messenger>,
    reporter: Arc<StatusReporter>,
    scheduler: Arc<TimedActionScheduler>,
    router: Arc<Router>,
    session: Arc<Session>,
}

impl PhoneController {
    pub fn new(
        config: CompanionConfig,
        transport: Arc<dyn Transport>,
        device: Arc<dyn DevicePlatform>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let discovery = Arc::new(PeerDiscovery::new(
            Arc::clone(&transport),
            config.peer_capability.clone(),
            config.discovery_timeout,
        ));
        let messenger = Arc::new(Messenger::new(transport, discovery));
        let session = Arc::new(Session::new());
        let reporter = Arc::new(StatusReporter::new(
            Arc::clone(&device),
            Arc::clone(&messenger),
        ));
        let scheduler = Arc::new(TimedActionScheduler::new(
            Arc::clone(&executor),
            Arc::clone(&reporter),
            session.events().clone(),
            session.cancel_token(),
            session.tracker(),
        ));

        let handler: Arc<dyn RouteHandler> = Arc::new(PhoneHandler {
            device: Arc::clone(&device),
            executor,
            reporter: Arc::clone(&reporter),
            scheduler: Arc::clone(&scheduler),
            session: Arc::clone(&session),
        });
        let router = Arc::new(Router::new(Arc::clone(&messenger)).register_all(ROUTES, &handler));

        Self {
            inner: Arc::new(PhoneInner {
                config,
                device,
                messenger,
                reporter,
                scheduler,
                router,
                session,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start consuming transport events and announce ourselves.
    pub async fn start(&self, inbound: mpsc::Receiver<TransportEvent>) {
        info!(
            node = %self.inner.config.node_id,
            platform = self.inner.device.platform().level,
            "phone session starting"
        );
        self.inner
            .session
            .start(Arc::clone(&self.inner.router), inbound);
        self.inner.messenger.discovery().refresh().await;
    }

    pub async fn shutdown(&self) {
        session::announce_app_state(&self.inner.session, &self.inner.messenger, AppState::Closed)
            .await;
        self.inner.session.shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        self.inner.session.is_running()
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Local OS state changed: broadcast the full actions dump.
    pub async fn on_device_state_changed(&self) -> SendReport {
        self.inner.reporter.send_actions_update(None).await
    }

    pub async fn push_status(&self, scope: Option<StatusScope>) -> SendReport {
        self.inner.reporter.send_status_update(None, scope).await
    }

    pub async fn set_app_state(&self, state: AppState) -> SendReport {
        session::announce_app_state(&self.inner.session, &self.inner.messenger, state).await
    }

    /// Ask the watch to bring its app to the foreground.
    pub async fn request_watch_open_app(&self) -> SendReport {
        self.inner
            .messenger
            .send(None, START_ACTIVITY_PATH, Bytes::new())
            .await
    }

    /// Tell the watch which Bluetooth device to look for.
    pub async fn send_bluetooth_name(&self, node: Option<&NodeId>) -> SendReport {
        let Some(name) = self.inner.device.bluetooth_name() else {
            debug!("no bluetooth name to send");
            return SendReport::default();
        };
        self.inner
            .messenger
            .send(node, BT_DISCOVER_PATH, encode_string(&name))
            .await
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<CompanionEvent>> {
        self.inner.session.events().subscribe()
    }

    pub fn discovery(&self) -> &Arc<PeerDiscovery> {
        self.inner.messenger.discovery()
    }

    pub fn reporter(&self) -> &Arc<StatusReporter> {
        &self.inner.reporter
    }

    pub fn scheduler(&self) -> &Arc<TimedActionScheduler> {
        &self.inner.scheduler
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.inner.config
    }
}

// ── Inbound handling ─────────────────────────────────────────────────

struct PhoneHandler {
    device: Arc<dyn DevicePlatform>,
    executor: Arc<dyn ActionExecutor>,
    reporter: Arc<StatusReporter>,
    scheduler: Arc<TimedActionScheduler>,
    session: Arc<Session>,
}

fn status_of(result: Result<(), DeviceError>) -> ActionStatus {
    match result {
        Ok(()) => ActionStatus::Success,
        Err(e) => {
            warn!(error = %e, "device command failed");
            e.status()
        }
    }
}

#[async_trait]
impl RouteHandler for PhoneHandler {
    async fn handle(
        &self,
        route: Route,
        msg: &InboundMessage,
        out: &Messenger,
    ) -> Result<(), CoreError> {
        match route {
            Route::Actions => self.on_action(msg, out).await,
            Route::Status => {
                self.on_status_request(msg).await;
                Ok(())
            }
            Route::AppState => self.on_peer_app_state(msg).await,
            Route::Ping => session::answer_ping(&self.session, msg, out).await,
            Route::Version => session::exchange_version(&self.session, msg, out).await,
            Route::Music => self.on_music(msg, out).await,
            Route::Apps => self.on_apps(msg, out).await,
            Route::SleepTimer => self.on_sleep_timer(msg, out).await,
            Route::StartActivity => {
                self.session.emit(CompanionEvent::OpenAppRequested {
                    node: msg.source.clone(),
                });
                self.device.open_companion_app().await?;
                Ok(())
            }
            Route::BtDiscover => Ok(()),
        }
    }
}

impl PhoneHandler {
    async fn on_action(&self, msg: &InboundMessage, out: &Messenger) -> Result<(), CoreError> {
        let action = decode_action(&msg.payload, self.device.platform())
            .ok_or_else(|| CoreError::invalid_payload(&msg.path, "undecodable action"))?;
        let action_type = action.action_type();

        let reply = match action {
            Action::Timed(timed) => {
                let status = self.scheduler.schedule(timed.clone());
                Action::Timed(timed).with_status(status)
            }
            Action::Toggle(_) | Action::MultiChoice(_) => {
                let status = self.executor.perform(&action).await;
                if status.is_success() {
                    // Report what the device actually ended up in.
                    match self.reporter.current_action(action_type).await {
                        Ok(current) => current,
                        Err(e) => {
                            warn!(%action_type, error = %e, "cannot re-read state after action");
                            action.with_status(status)
                        }
                    }
                } else {
                    action.with_status(status)
                }
            }
            other => {
                let status = self.executor.perform(&other).await;
                other.with_status(status)
            }
        };

        info!(
            %action_type,
            status = %reply.status(),
            node = %msg.source,
            "action request handled"
        );
        out.send_action(Some(&msg.source), ACTIONS_PATH, &reply).await;

        if reply.is_action_successful() {
            if let Some(scope) = StatusScope::for_action(action_type) {
                self.reporter
                    .send_status_update(Some(&msg.source), Some(scope))
                    .await;
            }
        }
        Ok(())
    }

    async fn on_status_request(&self, msg: &InboundMessage) {
        if !msg.payload.is_empty() {
            debug!(path = %msg.path, "ignoring status payload sent to phone");
            return;
        }
        let scope = if msg.path == STATUS_PATH {
            None
        } else {
            match StatusScope::from_path(&msg.path) {
                Some(scope) => Some(scope),
                None => {
                    debug!(path = %msg.path, "unknown status item");
                    return;
                }
            }
        };
        self.reporter.send_status_update(Some(&msg.source), scope).await;
    }

    async fn on_peer_app_state(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        let state: AppState = decode_json(&msg.payload)
            .ok_or_else(|| CoreError::invalid_payload(&msg.path, "expected app state"))?;
        debug!(node = %msg.source, %state, "watch app state");
        self.session.emit(CompanionEvent::PeerAppState {
            node: msg.source.clone(),
            state,
        });

        if state == AppState::Foreground {
            info!(node = %msg.source, "watch in foreground, sending full state");
            self.reporter.send_status_update(Some(&msg.source), None).await;
            self.reporter.send_actions_update(Some(&msg.source)).await;
        }
        Ok(())
    }

    async fn on_music(&self, msg: &InboundMessage, out: &Messenger) -> Result<(), CoreError> {
        match msg.path.as_str() {
            MUSIC_PLAYERS_PATH => {
                let players = self.device.music_players().await?;
                debug!(count = players.len(), "sending music players");
                out.send_json(Some(&msg.source), MUSIC_PLAYERS_PATH, &players).await;
            }
            OPEN_MUSIC_PLAYER_PATH | PLAY_COMMAND_PATH => {
                let app: AppItem = decode_json(&msg.payload)
                    .ok_or_else(|| CoreError::invalid_payload(&msg.path, "expected app item"))?;
                let status = if msg.path == PLAY_COMMAND_PATH {
                    status_of(self.device.start_playback(&app).await)
                } else {
                    status_of(self.device.launch_app(&app).await)
                };
                out.send_json(Some(&msg.source), &msg.path, &status).await;
            }
            other => debug!(path = other, "unknown music command"),
        }
        Ok(())
    }

    async fn on_apps(&self, msg: &InboundMessage, out: &Messenger) -> Result<(), CoreError> {
        match msg.path.as_str() {
            APPS_PATH => {
                let apps = self.device.launchable_apps().await?;
                debug!(count = apps.len(), "sending app list");
                out.send_json(Some(&msg.source), APPS_PATH, &apps).await;
            }
            LAUNCH_APP_PATH => {
                let app: AppItem = decode_json(&msg.payload)
                    .ok_or_else(|| CoreError::invalid_payload(&msg.path, "expected app item"))?;
                let status = status_of(self.device.launch_app(&app).await);
                out.send_json(Some(&msg.source), LAUNCH_APP_PATH, &status).await;
            }
            other => debug!(path = other, "unknown apps command"),
        }
        Ok(())
    }

    async fn on_sleep_timer(&self, msg: &InboundMessage, out: &Messenger) -> Result<(), CoreError> {
        match msg.path.as_str() {
            SLEEP_TIMER_ENABLED_PATH => {
                let available = self.device.sleep_timer_available().await;
                out.send(Some(&msg.source), SLEEP_TIMER_ENABLED_PATH, encode_bool(available))
                    .await;
                return Ok(());
            }
            SLEEP_TIMER_START_PATH => {
                let minutes = decode_i32(&msg.payload)
                    .ok_or_else(|| CoreError::invalid_payload(&msg.path, "expected i32 minutes"))?;
                self.device.start_sleep_timer(minutes).await?;
                info!(minutes, "sleep timer started");
            }
            SLEEP_TIMER_STOP_PATH => {
                self.device.stop_sleep_timer().await?;
                info!("sleep timer stopped");
            }
            SLEEP_TIMER_STATUS_PATH => {}
            other => {
                debug!(path = other, "unknown sleep timer command");
                return Ok(());
            }
        }

        let status = self
            .device
            .sleep_timer_status()
            .await?
            .unwrap_or(SleepTimerStatus {
                start_ms: 0,
                elapsed_ms: 0,
            });
        out.send(
            Some(&msg.source),
            SLEEP_TIMER_STATUS_PATH,
            encode_string(&status.to_wire()),
        )
        .await;
        Ok(())
    }
}
