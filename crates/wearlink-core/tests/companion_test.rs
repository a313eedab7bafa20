// End-to-end tests: a phone and a watch session wired through the loopback hub.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use wearlink_core::config::{PHONE_CAPABILITY, WATCH_CAPABILITY};
use wearlink_core::model::{DndChoice, LocationState};
use wearlink_core::stub::{LoopbackHub, SimulatedDevice, SimulatedState};
use wearlink_core::{
    Action, ActionExecutor, ActionStatus, ActionType, AppItem, BatteryStatus, CompanionConfig,
    CompanionEvent, CoreError, EscalationChain, MultiChoiceAction, NodeId, NormalAction, PhoneController,
    PlatformInfo, PrivilegedHelper, Role, TimedAction, ToggleAction, WatchController,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(2);

struct Pair {
    hub: LoopbackHub,
    device: Arc<SimulatedDevice>,
    phone: PhoneController,
    watch: WatchController,
}

fn watch_config(cache_dir: Option<std::path::PathBuf>) -> CompanionConfig {
    let mut config = CompanionConfig::for_role(Role::Watch, "watch");
    config.status_wait = WAIT;
    config.action_wait = WAIT;
    config.discovery_timeout = WAIT;
    config.cache_dir = cache_dir;
    config
}

fn standard_chain(device: &Arc<SimulatedDevice>, config: &CompanionConfig) -> Arc<dyn ActionExecutor> {
    Arc::new(EscalationChain::standard(
        device.clone(),
        device.clone(),
        device.clone(),
        device.clone(),
        config,
    ))
}

fn phone_for(
    hub: &LoopbackHub,
    device: &Arc<SimulatedDevice>,
    executor: Option<Arc<dyn ActionExecutor>>,
) -> (PhoneController, tokio::sync::mpsc::Receiver<wearlink_core::TransportEvent>) {
    let config = CompanionConfig::for_role(Role::Phone, "phone");
    let executor = executor.unwrap_or_else(|| standard_chain(device, &config));
    let (transport, inbound) = hub.connect("phone", &[PHONE_CAPABILITY]);
    (
        PhoneController::new(config, transport, device.clone(), executor),
        inbound,
    )
}

async fn pair_with(configure: impl FnOnce(&mut SimulatedState)) -> Pair {
    let hub = LoopbackHub::new();
    let device = Arc::new(SimulatedDevice::new(PlatformInfo::default()));
    device.update(configure);

    let (phone, phone_rx) = phone_for(&hub, &device, None);
    let (transport, watch_rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    let watch = WatchController::new(watch_config(None), transport);

    phone.start(phone_rx).await;
    watch.start(watch_rx).await;
    Pair {
        hub,
        device,
        phone,
        watch,
    }
}

async fn pair() -> Pair {
    pair_with(|_| {}).await
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until `n` events matching `pick` have been seen.
async fn await_events(
    events: &mut broadcast::Receiver<Arc<CompanionEvent>>,
    n: usize,
    pick: impl Fn(&CompanionEvent) -> bool,
) {
    tokio::time::timeout(WAIT, async {
        let mut seen = 0;
        while seen < n {
            if pick(&events.recv().await.unwrap()) {
                seen += 1;
            }
        }
    })
    .await
    .unwrap();
}

fn is_dump_event(event: &CompanionEvent) -> bool {
    matches!(event, CompanionEvent::StatusUpdated(_) | CompanionEvent::ActionUpdated(_))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ── Action round trips ──────────────────────────────────────────────

#[tokio::test]
async fn wifi_off_lands_in_watch_cache() {
    let p = pair().await;

    let result = p
        .watch
        .request_action(ToggleAction::new(ActionType::Wifi, false).into())
        .await;

    let expected = Action::from(ToggleAction::new(ActionType::Wifi, false)).with_status(ActionStatus::Success);
    assert_eq!(result, expected);
    assert_eq!(p.watch.dashboard().action(ActionType::Wifi).as_deref(), Some(&expected));
    assert!(!p.device.snapshot().wifi);

    let dashboard = p.watch.dashboard().clone();
    eventually("wifi status", || {
        dashboard.wifi_state().is_some_and(|s| !s.is_enabled())
    })
    .await;
}

#[tokio::test]
async fn denied_dnd_leaves_cache_untouched() {
    let p = pair_with(|s| {
        s.denied.insert(ActionType::DoNotDisturb);
    })
    .await;

    let alarms = MultiChoiceAction::new(
        ActionType::DoNotDisturb,
        DndChoice::Alarms.choice(),
        PlatformInfo::default(),
    );
    let result = p.watch.request_action(alarms.into()).await;

    assert_eq!(result.status(), ActionStatus::RemotePermissionDenied);
    assert!(p.watch.dashboard().action(ActionType::DoNotDisturb).is_none());
    assert_eq!(p.device.snapshot().dnd, DndChoice::Off);
}

#[tokio::test]
async fn dnd_escalates_to_broker_when_normal_control_is_denied() {
    let p = pair_with(|s| {
        s.denied.insert(ActionType::DoNotDisturb);
        s.broker_running = true;
    })
    .await;

    let alarms = MultiChoiceAction::new(
        ActionType::DoNotDisturb,
        DndChoice::Alarms.choice(),
        PlatformInfo::default(),
    );
    let result = p.watch.request_action(alarms.clone().into()).await;

    assert_eq!(result.status(), ActionStatus::Success);
    let state = p.device.snapshot();
    assert_eq!(state.dnd, DndChoice::Alarms);
    assert_eq!(state.commands, vec!["cmd notification set_dnd alarms".to_owned()]);

    let cached = p.watch.dashboard().action(ActionType::DoNotDisturb).unwrap();
    assert_eq!(*cached, Action::from(alarms).with_status(ActionStatus::Success));
}

#[tokio::test]
async fn location_goes_through_secure_settings() {
    let p = pair_with(|s| s.secure_settings_granted = true).await;

    let result = p
        .watch
        .request_action(ToggleAction::new(ActionType::Location, false).into())
        .await;

    assert_eq!(result.status(), ActionStatus::Success);
    assert_eq!(p.device.snapshot().location, LocationState::Off);
}

#[tokio::test]
async fn location_without_grant_is_remote_permission_denied() {
    let p = pair().await;

    let result = p
        .watch
        .request_action(ToggleAction::new(ActionType::Location, false).into())
        .await;

    assert_eq!(result.status(), ActionStatus::RemotePermissionDenied);
    assert_eq!(p.device.snapshot().location, LocationState::HighAccuracy);
}

#[tokio::test]
async fn repeated_request_is_idempotent() {
    let p = pair().await;
    let torch: Action = ToggleAction::new(ActionType::Torch, true).into();

    let first = p.watch.request_action(torch.clone()).await;
    let count = p.watch.dashboard().action_count();
    let second = p.watch.request_action(torch).await;

    assert_eq!(first, second);
    assert_eq!(p.watch.dashboard().action_count(), count);
    assert!(p.device.snapshot().torch);
}

#[tokio::test]
async fn normal_actions_echo_their_status() {
    let p = pair().await;

    let result = p
        .watch
        .request_action(NormalAction::new(ActionType::LockScreen).into())
        .await;

    assert_eq!(result.status(), ActionStatus::Success);
    assert!(p.device.snapshot().locked);
}

// ── Connectivity ────────────────────────────────────────────────────

#[tokio::test]
async fn cold_connect_fills_the_dashboard() {
    let p = pair().await;
    assert!(p.watch.ensure_peer().await.is_ok());

    let count = p.watch.connect().await;
    assert_eq!(count, ActionType::sync_catalog().count());
    assert_eq!(count, 16);

    let dashboard = p.watch.dashboard().clone();
    eventually("battery status", || {
        dashboard.battery() == Some(BatteryStatus::new(80, false))
    })
    .await;
    eventually("bluetooth status", || dashboard.bluetooth() == Some(true)).await;
}

#[tokio::test]
async fn watch_without_phone_fails_fast() {
    let hub = LoopbackHub::new();
    let (transport, rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    let watch = WatchController::new(watch_config(None), transport);
    watch.start(rx).await;

    let result = watch
        .request_action(ToggleAction::new(ActionType::Torch, true).into())
        .await;
    assert_eq!(result.status(), ActionStatus::Failure);
    assert!(!watch.refresh_status().await);
    assert!(matches!(watch.ensure_peer().await, Err(CoreError::NoPeer)));
}

#[tokio::test]
async fn silent_phone_times_out() {
    let hub = LoopbackHub::new();
    // Connected but never started: messages queue up unanswered.
    let (_phone, _phone_rx) = hub.connect("phone", &[PHONE_CAPABILITY]);
    let (transport, rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    let mut config = watch_config(None);
    config.action_wait = Duration::from_millis(100);
    let watch = WatchController::new(config, transport);
    watch.start(rx).await;

    let result = watch
        .request_action(ToggleAction::new(ActionType::Torch, true).into())
        .await;
    assert_eq!(result.status(), ActionStatus::Timeout);
}

#[tokio::test]
async fn broadcast_reaches_healthy_watch_when_another_fails() {
    let hub = LoopbackHub::new();
    let device = Arc::new(SimulatedDevice::new(PlatformInfo::default()));
    let (_w1, _w1_rx) = hub.connect("watch-1", &[WATCH_CAPABILITY]);
    let (_w2, _w2_rx) = hub.connect("watch-2", &[WATCH_CAPABILITY]);
    let (phone, phone_rx) = phone_for(&hub, &device, None);
    phone.start(phone_rx).await;

    hub.fail_sends_to(&NodeId::from("watch-2"), true);
    let report = phone.on_device_state_changed().await;

    let catalog = ActionType::sync_catalog().count();
    assert_eq!(report.delivered.len(), catalog);
    assert!(report.delivered.iter().all(|n| n.as_str() == "watch-1"));
    assert_eq!(report.failed.len(), catalog);
    assert!(report.failed.iter().all(|(n, _)| n.as_str() == "watch-2"));
}

#[tokio::test]
async fn local_wifi_change_reaches_watch_cache() {
    let p = pair().await;
    let mut events = p.watch.subscribe_events();

    p.device.update(|s| s.wifi = false);
    let report = p.phone.on_device_state_changed().await;
    assert_eq!(report.delivered.len(), ActionType::sync_catalog().count());

    await_events(&mut events, 16, |e| matches!(e, CompanionEvent::ActionUpdated(_))).await;
    assert_eq!(
        p.watch.dashboard().action(ActionType::Wifi).as_deref(),
        Some(&Action::from(ToggleAction::new(ActionType::Wifi, false)).with_status(ActionStatus::Success))
    );
}

#[tokio::test]
async fn repeated_dumps_leave_watch_stores_identical() {
    let p = pair().await;
    let dashboard = p.watch.dashboard().clone();
    let snapshot = || {
        let actions: Vec<Action> = dashboard.actions_snapshot().iter().map(|a| (**a).clone()).collect();
        (dashboard.battery(), dashboard.wifi_state(), dashboard.bluetooth(), actions)
    };

    let mut events = p.watch.subscribe_events();
    p.phone.push_status(None).await;
    p.phone.on_device_state_changed().await;
    await_events(&mut events, 3 + 16, is_dump_event).await;
    let first = snapshot();
    assert_eq!(first.3.len(), 16);
    assert!(first.0.is_some() && first.1.is_some() && first.2.is_some());

    let mut events = p.watch.subscribe_events();
    p.phone.push_status(None).await;
    p.phone.on_device_state_changed().await;
    await_events(&mut events, 3 + 16, is_dump_event).await;
    assert_eq!(snapshot(), first);
}

#[tokio::test]
async fn phone_sees_watch_leave() {
    let p = pair().await;
    let mut events = p.phone.subscribe_events();

    p.hub.set_reachable(&NodeId::from("watch"), false);

    let peers = tokio::time::timeout(WAIT, async {
        loop {
            if let CompanionEvent::PeersChanged(nodes) = &*events.recv().await.unwrap() {
                if nodes.is_empty() {
                    return nodes.clone();
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(peers.is_empty());
    assert!(!p.phone.discovery().is_peer_available().await);
}

// ── Media and apps ──────────────────────────────────────────────────

#[tokio::test]
async fn app_list_and_launch() {
    let p = pair().await;

    let apps = p.watch.request_apps().await;
    assert_eq!(apps.len(), 2);

    let mail = (*apps[0]).clone();
    assert_eq!(p.watch.launch_app(&mail).await, ActionStatus::Success);
    assert_eq!(p.device.snapshot().launched, vec![mail]);

    let missing = AppItem::new("com.example.none", "com.example.none.Main");
    assert_eq!(p.watch.launch_app(&missing).await, ActionStatus::Failure);
}

#[tokio::test]
async fn music_player_playback() {
    let p = pair().await;

    let players = p.watch.request_music_players().await;
    assert_eq!(players.len(), 1);
    assert_eq!(p.watch.play_music(&players[0]).await, ActionStatus::Success);
    assert!(p.device.snapshot().music_playing);
}

#[tokio::test]
async fn sleep_timer_round_trip() {
    let p = pair().await;
    let dashboard = p.watch.dashboard().clone();
    let mut events = p.watch.subscribe_events();

    p.watch.request_sleep_timer_status().await;
    let idle = tokio::time::timeout(WAIT, async {
        loop {
            if let CompanionEvent::SleepTimerUpdated(status) = &*events.recv().await.unwrap() {
                return *status;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(idle, None);
    eventually("sleep timer availability", || {
        dashboard.sleep_timer_available() == Some(true)
    })
    .await;

    p.watch.start_sleep_timer(15).await;
    eventually("running sleep timer", || dashboard.sleep_timer().is_some()).await;
    assert_eq!(dashboard.sleep_timer().unwrap().start_ms, 15 * 60_000);

    p.watch.stop_sleep_timer().await;
    eventually("stopped sleep timer", || dashboard.sleep_timer().is_none()).await;
}

// ── Timed actions ───────────────────────────────────────────────────

#[tokio::test]
async fn timed_action_fires_and_updates_watch() {
    let p = pair().await;

    let timed = TimedAction::new(now_ms() + 50, ToggleAction::new(ActionType::Torch, true).into()).unwrap();
    let ack = p.watch.request_action(timed.into()).await;
    assert_eq!(ack.status(), ActionStatus::Success);
    assert_eq!(ack.action_type(), ActionType::TimedAction);

    let device = p.device.clone();
    eventually("torch on", || device.snapshot().torch).await;

    let dashboard = p.watch.dashboard().clone();
    eventually("cached torch", || {
        dashboard
            .action(ActionType::Torch)
            .is_some_and(|a| *a == Action::from(ToggleAction::new(ActionType::Torch, true)).with_status(ActionStatus::Success))
    })
    .await;
    assert!(p.phone.scheduler().pending().is_empty());
}

#[tokio::test]
async fn timed_action_far_in_the_past_runs_immediately() {
    let p = pair().await;

    let ancient = TimedAction::new(i64::MIN, ToggleAction::new(ActionType::Torch, true).into()).unwrap();
    assert_eq!(p.phone.scheduler().schedule(ancient), ActionStatus::Success);

    let device = p.device.clone();
    eventually("torch on", || device.snapshot().torch).await;
}

#[tokio::test]
async fn rescheduling_replaces_pending_action() {
    let p = pair().await;
    let scheduler = p.phone.scheduler();

    let later = TimedAction::new(now_ms() + 60_000, ToggleAction::new(ActionType::Torch, true).into()).unwrap();
    scheduler.schedule(later);
    assert_eq!(scheduler.pending(), vec![ActionType::Torch]);

    let soon = TimedAction::new(now_ms() + 20, ToggleAction::new(ActionType::Torch, true).into()).unwrap();
    scheduler.schedule(soon);
    assert_eq!(scheduler.pending(), vec![ActionType::Torch]);

    let device = p.device.clone();
    eventually("torch on", || device.snapshot().torch).await;
    let scheduler = p.phone.scheduler().clone();
    eventually("no pending schedules", || scheduler.pending().is_empty()).await;
}

// ── Privileged helper ───────────────────────────────────────────────

#[tokio::test]
async fn phone_can_execute_through_helper() {
    let hub = LoopbackHub::new();
    let device = Arc::new(SimulatedDevice::new(PlatformInfo::default()));
    device.update(|s| s.broker_running = true);
    let config = CompanionConfig::for_role(Role::Phone, "phone");

    let chain = Arc::new(EscalationChain::standard(
        device.clone(),
        device.clone(),
        device.clone(),
        device.clone(),
        &config,
    ));
    let cancel = CancellationToken::new();
    let helper = PrivilegedHelper::spawn(chain, config.platform, WAIT, cancel.clone(), &TaskTracker::new());

    let (phone, phone_rx) = phone_for(&hub, &device, Some(Arc::new(helper)));
    let (transport, watch_rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    let watch = WatchController::new(watch_config(None), transport);
    phone.start(phone_rx).await;
    watch.start(watch_rx).await;

    let result = watch
        .request_action(NormalAction::new(ActionType::LockScreen).into())
        .await;
    assert_eq!(result.status(), ActionStatus::Success);
    assert!(device.snapshot().locked);

    cancel.cancel();
}

// ── Persistence ─────────────────────────────────────────────────────

#[tokio::test]
async fn watch_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let hub = LoopbackHub::new();
    let device = Arc::new(SimulatedDevice::new(PlatformInfo::default()));
    let (phone, phone_rx) = phone_for(&hub, &device, None);
    phone.start(phone_rx).await;

    let (transport, rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    let watch = WatchController::new(watch_config(Some(dir.path().to_owned())), transport);
    watch.start(rx).await;
    assert_eq!(watch.connect().await, 16);
    watch.shutdown().await;
    hub.disconnect(&NodeId::from("watch"));

    let (transport, rx) = hub.connect("watch", &[WATCH_CAPABILITY]);
    phone.shutdown().await;
    let restarted = WatchController::new(watch_config(Some(dir.path().to_owned())), transport);
    restarted.start(rx).await;

    assert_eq!(restarted.dashboard().action_count(), 16);
    assert_eq!(
        restarted.action(ActionType::Wifi),
        Action::from(ToggleAction::new(ActionType::Wifi, true)).with_status(ActionStatus::Success)
    );
}
