// ── Watch-side controller ──
//
// Mirrors phone state into the dashboard and media caches, issues action
// and media requests with bounded waits, and persists the caches in the
// background.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{
    decode_action, decode_bool, decode_i32, decode_json, decode_string, encode_i32,
};
use crate::config::CompanionConfig;
use crate::discovery::PeerDiscovery;
use crate::error::CoreError;
use crate::events::CompanionEvent;
use crate::model::{
    Action, ActionStatus, ActionType, AppItem, AppState, BatteryStatus, PlatformInfo,
    SleepTimerStatus, WifiState,
};
use crate::router::routes::{
    ACTIONS_PATH, APPS_PATH, BATTERY_STATUS_PATH, BLUETOOTH_STATUS_PATH, LAUNCH_APP_PATH,
    MUSIC_PLAYERS_PATH, OPEN_MUSIC_PLAYER_PATH, PLAY_COMMAND_PATH, SLEEP_TIMER_ENABLED_PATH,
    SLEEP_TIMER_START_PATH, SLEEP_TIMER_STATUS_PATH, SLEEP_TIMER_STOP_PATH, STATUS_PATH,
    WIFI_STATUS_PATH,
};
use crate::router::{Messenger, Route, RouteHandler, Router, SendReport};
use crate::session::{self, Session};
use crate::status::StatusScope;
use crate::store::{DASHBOARD_FILE, DashboardStore, MEDIA_FILE, MediaStore};
use crate::transport::{InboundMessage, Transport, TransportEvent};

const ROUTES: &[Route] = &[
    Route::Status,
    Route::Actions,
    Route::AppState,
    Route::Ping,
    Route::Version,
    Route::Music,
    Route::Apps,
    Route::SleepTimer,
    Route::StartActivity,
    Route::BtDiscover,
];

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct WatchController {
    inner: Arc<WatchInner>,
}

struct WatchInner {
    config: CompanionConfig,
    messenger: Arc<Messenger>,
    dashboard: Arc<DashboardStore>,
    media: Arc<MediaStore>,
    router: Arc<Router>,
    session: Arc<Session>,
}

impl WatchController {
    pub fn new(config: CompanionConfig, transport: Arc<dyn Transport>) -> Self {
        let discovery = Arc::new(PeerDiscovery::new(
            Arc::clone(&transport),
            config.peer_capability.clone(),
            config.discovery_timeout,
        ));
        let messenger = Arc::new(Messenger::new(transport, discovery));
        let session = Arc::new(Session::new());
        let dashboard = Arc::new(DashboardStore::new());
        let media = Arc::new(MediaStore::new());

        let handler: Arc<dyn RouteHandler> = Arc::new(WatchHandler {
            platform: config.platform,
            dashboard: Arc::clone(&dashboard),
            media: Arc::clone(&media),
            session: Arc::clone(&session),
        });
        let router = Arc::new(Router::new(Arc::clone(&messenger)).register_all(ROUTES, &handler));

        Self {
            inner: Arc::new(WatchInner {
                config,
                messenger,
                dashboard,
                media,
                router,
                session,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore cached state, then start consuming transport events.
    pub async fn start(&self, inbound: mpsc::Receiver<TransportEvent>) {
        let inner = &self.inner;
        info!(node = %inner.config.node_id, "watch session starting");

        if let Some(dir) = inner.config.cache_dir.clone() {
            self.load_caches(&dir).await;
            inner.session.tracker().spawn(persist_loop(
                dir,
                Arc::clone(&inner.dashboard),
                Arc::clone(&inner.media),
                inner.session.cancel_token(),
            ));
        }

        inner.session.start(Arc::clone(&inner.router), inbound);
        inner.messenger.discovery().refresh().await;
    }

    pub async fn shutdown(&self) {
        let inner = &self.inner;
        session::announce_app_state(&inner.session, &inner.messenger, AppState::Closed).await;
        inner.session.shutdown().await;
        if let Some(dir) = &inner.config.cache_dir {
            save_caches(dir, &inner.dashboard, &inner.media).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.session.is_running()
    }

    async fn load_caches(&self, dir: &Path) {
        let platform = self.inner.config.platform;
        match self.inner.dashboard.load(&dir.join(DASHBOARD_FILE), platform).await {
            Ok(true) => debug!(actions = self.inner.dashboard.action_count(), "dashboard cache loaded"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable dashboard cache"),
        }
        if let Err(e) = self.inner.media.load(&dir.join(MEDIA_FILE)).await {
            warn!(error = %e, "ignoring unreadable media cache");
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Announce our app state. `Foreground` makes the phone send everything.
    pub async fn set_app_state(&self, state: AppState) -> SendReport {
        session::announce_app_state(&self.inner.session, &self.inner.messenger, state).await
    }

    /// `NoPeer` unless discovery finds a reachable phone.
    pub async fn ensure_peer(&self) -> Result<(), CoreError> {
        if self.inner.messenger.discovery().is_peer_available().await {
            Ok(())
        } else {
            Err(CoreError::NoPeer)
        }
    }

    /// Come to the foreground and wait (bounded) until the dashboard holds
    /// the whole catalog. Returns the number of cached actions.
    pub async fn connect(&self) -> usize {
        let expected = ActionType::sync_catalog().count();
        let mut updates = self.inner.dashboard.subscribe_updates();
        self.set_app_state(AppState::Foreground).await;

        let dashboard = &self.inner.dashboard;
        let wait = async {
            while dashboard.action_count() < expected {
                if updates.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.inner.config.status_wait, wait).await.is_err() {
            warn!(
                cached = dashboard.action_count(),
                expected, "timed out waiting for full state, using cache"
            );
        }
        dashboard.action_count()
    }

    /// Ask for a status dump and wait (bounded) for the first item.
    /// Returns `false` when nothing arrived and the cache is stale.
    pub async fn refresh_status(&self) -> bool {
        if let Err(e) = self.ensure_peer().await {
            debug!(error = %e, "keeping cached status");
            return false;
        }
        let mut updates = self.inner.dashboard.subscribe_updates();
        updates.mark_unchanged();
        let report = self.inner.messenger.send(None, STATUS_PATH, Bytes::new()).await;
        if !report.any_delivered() {
            return false;
        }
        match tokio::time::timeout(self.inner.config.status_wait, updates.changed()).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!("status refresh timed out, using cached state");
                false
            }
        }
    }

    /// Send `action` to the phone and wait (bounded) for its result. The
    /// returned action carries the final status; `TIMEOUT` on expiry.
    pub async fn request_action(&self, action: Action) -> Action {
        let action_type = action.action_type();
        if let Err(e) = self.ensure_peer().await {
            warn!(%action_type, error = %e, "action not sent");
            return action.with_status(ActionStatus::Failure);
        }

        let mut events = self.subscribe_events();
        let report = self
            .inner
            .messenger
            .send_action(None, ACTIONS_PATH, &action)
            .await;
        if !report.any_delivered() {
            return action.with_status(ActionStatus::Failure);
        }

        let result = await_event(&mut events, self.inner.config.action_wait, |event| match event {
            CompanionEvent::ActionUpdated(a) | CompanionEvent::ActionFailed(a)
                if a.action_type() == action_type =>
            {
                Some(a.clone())
            }
            _ => None,
        })
        .await;

        result.unwrap_or_else(|| {
            warn!(%action_type, "no result from phone");
            action.with_status(ActionStatus::Timeout)
        })
    }

    pub async fn request_music_players(&self) -> Arc<Vec<Arc<AppItem>>> {
        self.request_list(MUSIC_PLAYERS_PATH, |e| {
            matches!(e, CompanionEvent::MusicPlayersUpdated { .. })
        })
        .await;
        self.inner.media.music_players()
    }

    pub async fn request_apps(&self) -> Arc<Vec<Arc<AppItem>>> {
        self.request_list(APPS_PATH, |e| matches!(e, CompanionEvent::AppsUpdated { .. }))
            .await;
        self.inner.media.apps()
    }

    async fn request_list(&self, path: &str, done: impl Fn(&CompanionEvent) -> bool) {
        let mut events = self.subscribe_events();
        let report = self.inner.messenger.send(None, path, Bytes::new()).await;
        if !report.any_delivered() {
            debug!(path, "list request not delivered, using cache");
            return;
        }
        let wait = self.inner.config.status_wait;
        if await_event(&mut events, wait, |e| done(e).then_some(())).await.is_none() {
            warn!(path, "list request timed out, using cache");
        }
    }

    pub async fn launch_app(&self, app: &AppItem) -> ActionStatus {
        self.app_command(LAUNCH_APP_PATH, app).await
    }

    pub async fn open_music_player(&self, player: &AppItem) -> ActionStatus {
        self.app_command(OPEN_MUSIC_PLAYER_PATH, player).await
    }

    pub async fn play_music(&self, player: &AppItem) -> ActionStatus {
        self.app_command(PLAY_COMMAND_PATH, player).await
    }

    async fn app_command(&self, path: &'static str, app: &AppItem) -> ActionStatus {
        let mut events = self.subscribe_events();
        let report = self.inner.messenger.send_json(None, path, app).await;
        if !report.any_delivered() {
            return ActionStatus::Failure;
        }
        await_event(&mut events, self.inner.config.action_wait, |e| match e {
            CompanionEvent::CommandResult { path: p, status } if p == path => Some(*status),
            _ => None,
        })
        .await
        .unwrap_or(ActionStatus::Timeout)
    }

    pub async fn start_sleep_timer(&self, minutes: i32) -> SendReport {
        self.inner
            .messenger
            .send(None, SLEEP_TIMER_START_PATH, encode_i32(minutes))
            .await
    }

    pub async fn stop_sleep_timer(&self) -> SendReport {
        self.inner
            .messenger
            .send(None, SLEEP_TIMER_STOP_PATH, Bytes::new())
            .await
    }

    /// Ask whether the phone has a sleep timer and where it stands.
    pub async fn request_sleep_timer_status(&self) -> SendReport {
        let mut report = self
            .inner
            .messenger
            .send(None, SLEEP_TIMER_ENABLED_PATH, Bytes::new())
            .await;
        report.merge(
            self.inner
                .messenger
                .send(None, SLEEP_TIMER_STATUS_PATH, Bytes::new())
                .await,
        );
        report
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn dashboard(&self) -> &Arc<DashboardStore> {
        &self.inner.dashboard
    }

    pub fn media(&self) -> &Arc<MediaStore> {
        &self.inner.media
    }

    pub fn discovery(&self) -> &Arc<PeerDiscovery> {
        self.inner.messenger.discovery()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<CompanionEvent>> {
        self.inner.session.events().subscribe()
    }

    /// Cached action for `action_type`, or its placeholder.
    pub fn action(&self, action_type: ActionType) -> Action {
        self.inner
            .dashboard
            .action_or_default(action_type, self.inner.config.platform)
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.inner.config
    }
}

async fn await_event<T>(
    rx: &mut broadcast::Receiver<Arc<CompanionEvent>>,
    wait: Duration,
    mut pick: impl FnMut(&CompanionEvent) -> Option<T>,
) -> Option<T> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) | Ok(Err(broadcast::error::RecvError::Closed)) => return None,
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                debug!(skipped, "event subscriber lagged");
            }
            Ok(Ok(event)) => {
                if let Some(found) = pick(&event) {
                    return Some(found);
                }
            }
        }
    }
}

// ── Persistence ──────────────────────────────────────────────────────

async fn persist_loop(
    dir: PathBuf,
    dashboard: Arc<DashboardStore>,
    media: Arc<MediaStore>,
    cancel: CancellationToken,
) {
    let mut updates = dashboard.subscribe_updates();
    let mut players = media.subscribe_music_players();
    let mut apps = media.subscribe_apps();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            res = updates.changed() => if res.is_err() { break },
            res = players.changed() => if res.is_none() { break },
            res = apps.changed() => if res.is_none() { break },
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(PERSIST_DEBOUNCE) => {}
        }
        updates.mark_unchanged();
        save_caches(&dir, &dashboard, &media).await;
    }
}

async fn save_caches(dir: &Path, dashboard: &DashboardStore, media: &MediaStore) {
    if let Err(e) = dashboard.save(&dir.join(DASHBOARD_FILE)).await {
        warn!(error = %e, dir = %dir.display(), "failed to save dashboard cache");
    }
    if let Err(e) = media.save(&dir.join(MEDIA_FILE)).await {
        warn!(error = %e, dir = %dir.display(), "failed to save media cache");
    }
}

// ── Inbound handling ─────────────────────────────────────────────────

struct WatchHandler {
    platform: PlatformInfo,
    dashboard: Arc<DashboardStore>,
    media: Arc<MediaStore>,
    session: Arc<Session>,
}

fn invalid(msg: &InboundMessage, what: &str) -> CoreError {
    CoreError::invalid_payload(&msg.path, format!("expected {what}"))
}

#[async_trait]
impl RouteHandler for WatchHandler {
    async fn handle(
        &self,
        route: Route,
        msg: &InboundMessage,
        out: &Messenger,
    ) -> Result<(), CoreError> {
        match route {
            Route::Status => self.on_status(msg),
            Route::Actions => self.on_action_result(msg),
            Route::AppState => {
                let state: AppState = decode_json(&msg.payload).ok_or_else(|| invalid(msg, "app state"))?;
                self.dashboard.set_peer_app_state(state);
                self.session.emit(CompanionEvent::PeerAppState {
                    node: msg.source.clone(),
                    state,
                });
                Ok(())
            }
            Route::Ping => session::answer_ping(&self.session, msg, out).await,
            Route::Version => session::exchange_version(&self.session, msg, out).await,
            Route::Music => self.on_music(msg),
            Route::Apps => self.on_apps(msg),
            Route::SleepTimer => self.on_sleep_timer(msg),
            Route::StartActivity => {
                self.session.emit(CompanionEvent::OpenAppRequested {
                    node: msg.source.clone(),
                });
                Ok(())
            }
            Route::BtDiscover => {
                let name = decode_string(&msg.payload).ok_or_else(|| invalid(msg, "device name"))?;
                info!(node = %msg.source, %name, "phone bluetooth name received");
                self.session.emit(CompanionEvent::BluetoothDiscoverable {
                    node: msg.source.clone(),
                    name,
                });
                Ok(())
            }
        }
    }
}

impl WatchHandler {
    fn on_status(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        if msg.payload.is_empty() {
            debug!(path = %msg.path, "ignoring status request sent to watch");
            return Ok(());
        }
        let scope = match msg.path.as_str() {
            WIFI_STATUS_PATH => {
                let code = decode_i32(&msg.payload).ok_or_else(|| invalid(msg, "i32 wifi state"))?;
                self.dashboard.set_wifi_state(WifiState::from_code(code));
                StatusScope::Wifi
            }
            BATTERY_STATUS_PATH => {
                let battery: BatteryStatus =
                    decode_json(&msg.payload).ok_or_else(|| invalid(msg, "battery status"))?;
                self.dashboard.set_battery(battery);
                StatusScope::Battery
            }
            BLUETOOTH_STATUS_PATH => {
                let enabled = decode_bool(&msg.payload).ok_or_else(|| invalid(msg, "bool"))?;
                self.dashboard.set_bluetooth(enabled);
                StatusScope::Bluetooth
            }
            other => {
                debug!(path = other, "unknown status item");
                return Ok(());
            }
        };
        self.session.emit(CompanionEvent::StatusUpdated(scope));
        Ok(())
    }

    fn on_action_result(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        let action = decode_action(&msg.payload, self.platform).ok_or_else(|| invalid(msg, "action"))?;

        if action.is_action_successful() {
            self.dashboard.apply_action(action.clone());
            self.session.emit(CompanionEvent::ActionUpdated(action));
        } else {
            info!(
                action_type = %action.action_type(),
                status = %action.status(),
                "phone reported action failure"
            );
            self.session.emit(CompanionEvent::ActionFailed(action));
        }
        Ok(())
    }

    fn on_music(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        match msg.path.as_str() {
            MUSIC_PLAYERS_PATH => {
                let players: Vec<AppItem> =
                    decode_json(&msg.payload).ok_or_else(|| invalid(msg, "app list"))?;
                let count = players.len();
                self.media.set_music_players(players);
                self.session.emit(CompanionEvent::MusicPlayersUpdated { count });
            }
            OPEN_MUSIC_PLAYER_PATH | PLAY_COMMAND_PATH => self.on_command_result(msg)?,
            other => debug!(path = other, "unknown music message"),
        }
        Ok(())
    }

    fn on_apps(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        match msg.path.as_str() {
            APPS_PATH => {
                let apps: Vec<AppItem> = decode_json(&msg.payload).ok_or_else(|| invalid(msg, "app list"))?;
                let count = apps.len();
                self.media.set_apps(apps);
                self.session.emit(CompanionEvent::AppsUpdated { count });
            }
            LAUNCH_APP_PATH => self.on_command_result(msg)?,
            other => debug!(path = other, "unknown apps message"),
        }
        Ok(())
    }

    fn on_command_result(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        let status: ActionStatus = decode_json(&msg.payload).ok_or_else(|| invalid(msg, "action status"))?;
        self.session.emit(CompanionEvent::CommandResult {
            path: msg.path.clone(),
            status,
        });
        Ok(())
    }

    fn on_sleep_timer(&self, msg: &InboundMessage) -> Result<(), CoreError> {
        match msg.path.as_str() {
            SLEEP_TIMER_ENABLED_PATH => {
                let available = decode_bool(&msg.payload).ok_or_else(|| invalid(msg, "bool"))?;
                self.dashboard.set_sleep_timer_available(available);
            }
            SLEEP_TIMER_STATUS_PATH => {
                let status = decode_string(&msg.payload)
                    .as_deref()
                    .and_then(SleepTimerStatus::parse)
                    .ok_or_else(|| invalid(msg, "startMs;elapsedMs"))?;
                self.dashboard.set_sleep_timer(Some(status));
                self.session
                    .emit(CompanionEvent::SleepTimerUpdated(self.dashboard.sleep_timer()));
            }
            other => debug!(path = other, "unknown sleep timer message"),
        }
        Ok(())
    }
}
