// ── Watch-side dashboard cache ──
//
// Last known phone state: one action per type, status scalars, and the
// phone app's lifecycle state. Only successful action results are stored.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::collection::Collection;
use super::persist;
use crate::codec::wire::WireAction;
use crate::error::CoreError;
use crate::model::{
    Action, ActionStatus, ActionType, AppState, BatteryStatus, PlatformInfo, SleepTimerStatus,
    WifiState,
};

pub struct DashboardStore {
    pub(crate) actions: Collection<ActionType, Action>,
    pub(crate) battery: watch::Sender<Option<BatteryStatus>>,
    pub(crate) wifi: watch::Sender<Option<WifiState>>,
    pub(crate) bluetooth: watch::Sender<Option<bool>>,
    pub(crate) peer_app_state: watch::Sender<AppState>,
    pub(crate) sleep_timer: watch::Sender<Option<SleepTimerStatus>>,
    pub(crate) sleep_timer_available: watch::Sender<Option<bool>>,
    pub(crate) last_update: watch::Sender<Option<DateTime<Utc>>>,
    /// Bumped by every inbound write, changed or not.
    pub(crate) updates: watch::Sender<u64>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        Self {
            actions: Collection::new(),
            battery: watch::channel(None).0,
            wifi: watch::channel(None).0,
            bluetooth: watch::channel(None).0,
            peer_app_state: watch::channel(AppState::Closed).0,
            sleep_timer: watch::channel(None).0,
            sleep_timer_available: watch::channel(None).0,
            last_update: watch::channel(None).0,
            updates: watch::channel(0).0,
        }
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Store a successful action result. Anything else is refused so the
    /// cache only ever reflects state the phone confirmed.
    pub fn apply_action(&self, action: Action) -> bool {
        if !action.is_action_successful() || matches!(action, Action::Timed(_)) {
            debug!(
                action_type = %action.action_type(),
                status = %action.status(),
                "non-cacheable action result ignored"
            );
            return false;
        }
        let changed = self.actions.upsert(action.action_type(), action);
        self.touch();
        changed
    }

    pub fn action(&self, action_type: ActionType) -> Option<Arc<Action>> {
        self.actions.get(&action_type)
    }

    /// Cached action, or the neutral placeholder for `action_type`.
    pub fn action_or_default(&self, action_type: ActionType, platform: PlatformInfo) -> Action {
        self.action(action_type)
            .map_or_else(|| Action::default_for(action_type, platform), |a| (*a).clone())
    }

    pub fn actions_snapshot(&self) -> Arc<Vec<Arc<Action>>> {
        self.actions.snapshot()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn set_battery(&self, status: BatteryStatus) {
        self.battery.send_if_modified(|cur| replace(cur, Some(status)));
        self.touch();
    }

    pub fn battery(&self) -> Option<BatteryStatus> {
        *self.battery.borrow()
    }

    pub fn set_wifi_state(&self, state: WifiState) {
        self.wifi.send_if_modified(|cur| replace(cur, Some(state)));
        self.touch();
    }

    pub fn wifi_state(&self) -> Option<WifiState> {
        *self.wifi.borrow()
    }

    pub fn set_bluetooth(&self, enabled: bool) {
        self.bluetooth.send_if_modified(|cur| replace(cur, Some(enabled)));
        self.touch();
    }

    pub fn bluetooth(&self) -> Option<bool> {
        *self.bluetooth.borrow()
    }

    pub fn set_peer_app_state(&self, state: AppState) {
        self.peer_app_state.send_if_modified(|cur| replace(cur, state));
    }

    pub fn peer_app_state(&self) -> AppState {
        *self.peer_app_state.borrow()
    }

    /// `None` clears the timer.
    pub fn set_sleep_timer(&self, status: Option<SleepTimerStatus>) {
        let status = status.filter(|s| s.is_running());
        self.sleep_timer.send_if_modified(|cur| replace(cur, status));
        self.touch();
    }

    pub fn sleep_timer(&self) -> Option<SleepTimerStatus> {
        *self.sleep_timer.borrow()
    }

    pub fn set_sleep_timer_available(&self, available: bool) {
        self.sleep_timer_available
            .send_if_modified(|cur| replace(cur, Some(available)));
    }

    pub fn sleep_timer_available(&self) -> Option<bool> {
        *self.sleep_timer_available.borrow()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    /// Counter bumped by every inbound status or action write.
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    fn touch(&self) {
        self.last_update.send_replace(Some(Utc::now()));
        self.updates.send_modify(|v| *v += 1);
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub async fn save(&self, path: &Path) -> Result<(), CoreError> {
        let snapshot = DashboardFile {
            saved_at: Utc::now(),
            actions: self
                .actions_snapshot()
                .iter()
                .map(|a| WireAction::from(a.as_ref()))
                .collect(),
            battery: self.battery(),
            wifi: self.wifi_state(),
            bluetooth: self.bluetooth(),
        };
        persist::write_json(path, &snapshot).await
    }

    /// Restore a saved cache. Returns `false` when there is no file.
    pub async fn load(&self, path: &Path, platform: PlatformInfo) -> Result<bool, CoreError> {
        let Some(file) = persist::read_json::<DashboardFile>(path).await? else {
            return Ok(false);
        };

        let mut restored = 0usize;
        for wire in file.actions {
            match wire.into_action(platform) {
                Ok(action) => {
                    self.actions
                        .upsert(action.action_type(), action.with_status(ActionStatus::Success));
                    restored += 1;
                }
                Err(reason) => debug!(%reason, "skipping cached action"),
            }
        }
        if let Some(b) = file.battery {
            self.battery.send_replace(Some(b));
        }
        if let Some(w) = file.wifi {
            self.wifi.send_replace(Some(w));
        }
        if let Some(bt) = file.bluetooth {
            self.bluetooth.send_replace(Some(bt));
        }
        self.last_update.send_replace(Some(file.saved_at));

        debug!(restored, path = %path.display(), "dashboard cache restored");
        Ok(true)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardFile {
    saved_at: DateTime<Utc>,
    actions: Vec<WireAction>,
    #[serde(default)]
    battery: Option<BatteryStatus>,
    #[serde(default)]
    wifi: Option<WifiState>,
    #[serde(default)]
    bluetooth: Option<bool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{MultiChoiceAction, ToggleAction};

    const MODERN: PlatformInfo = PlatformInfo::new(34);

    fn ok(action: impl Into<Action>) -> Action {
        action.into().with_status(ActionStatus::Success)
    }

    #[test]
    fn only_successful_results_are_cached() {
        let store = DashboardStore::new();
        assert!(store.apply_action(ok(ToggleAction::new(ActionType::Wifi, true))));

        let denied = Action::from(ToggleAction::new(ActionType::Wifi, false))
            .with_status(ActionStatus::RemotePermissionDenied);
        assert!(!store.apply_action(denied));

        let Action::Toggle(wifi) = store.action(ActionType::Wifi).unwrap().as_ref().clone() else {
            panic!("expected toggle");
        };
        assert!(wifi.enabled());
    }

    #[test]
    fn repeated_result_keeps_cache_identical() {
        let store = DashboardStore::new();
        let dnd = ok(MultiChoiceAction::new(ActionType::DoNotDisturb, 1, MODERN));
        assert!(store.apply_action(dnd.clone()));
        let before = store.actions_snapshot();
        assert!(!store.apply_action(dnd));
        assert!(Arc::ptr_eq(&before, &store.actions_snapshot()));
    }

    #[test]
    fn placeholder_for_unknown_types() {
        let store = DashboardStore::new();
        let torch = store.action_or_default(ActionType::Torch, MODERN);
        assert_eq!(torch, Action::default_for(ActionType::Torch, MODERN));
    }

    #[test]
    fn stopped_sleep_timer_clears_status() {
        let store = DashboardStore::new();
        store.set_sleep_timer(Some(SleepTimerStatus { start_ms: 60_000, elapsed_ms: 1_000 }));
        assert!(store.sleep_timer().is_some());
        store.set_sleep_timer(Some(SleepTimerStatus { start_ms: 0, elapsed_ms: 0 }));
        assert!(store.sleep_timer().is_none());
    }

    #[test]
    fn extreme_sleep_timer_values_are_stored_without_overflow() {
        let store = DashboardStore::new();
        let huge = SleepTimerStatus { start_ms: i64::MAX, elapsed_ms: -1 };
        store.set_sleep_timer(Some(huge));
        assert_eq!(store.sleep_timer(), Some(huge));

        store.set_sleep_timer(Some(SleepTimerStatus { start_ms: 1, elapsed_ms: i64::MIN }));
        assert!(store.sleep_timer().is_some());
    }

    #[tokio::test]
    async fn cache_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");

        let store = DashboardStore::new();
        store.apply_action(ok(ToggleAction::new(ActionType::Bluetooth, true)));
        store.apply_action(ok(MultiChoiceAction::new(ActionType::Ringer, 2, MODERN)));
        store.set_battery(BatteryStatus::new(64, false));
        store.save(&path).await.unwrap();

        let restored = DashboardStore::new();
        assert!(restored.load(&path, MODERN).await.unwrap());
        assert_eq!(restored.action_count(), 2);
        assert_eq!(restored.battery(), Some(BatteryStatus::new(64, false)));
        assert_eq!(
            *restored.action(ActionType::Ringer).unwrap(),
            ok(MultiChoiceAction::new(ActionType::Ringer, 2, MODERN))
        );
    }

    #[tokio::test]
    async fn missing_cache_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DashboardStore::new();
        assert!(!store.load(&dir.path().join("none.json"), MODERN).await.unwrap());
    }
}
