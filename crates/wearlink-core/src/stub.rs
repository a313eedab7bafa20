// ── In-memory transport and device ──
//
// `LoopbackHub` wires any number of sessions together in one process and
// `SimulatedDevice` stands in for the phone OS. Used by the CLI simulator
// and the integration tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::device::{
    DeviceError, DevicePlatform, PrivilegedBroker, SecureSettings, SettingsNamespace, ShellOutput,
};
use crate::exec::ShellRunner;
use crate::model::{
    ActionType, AppItem, AudioStreamType, BatteryStatus, Direction, DndChoice, LocationState,
    Node, NodeId, PlatformInfo, RingerChoice, SleepTimerStatus, WifiState,
};
use crate::transport::{InboundMessage, Transport, TransportError, TransportEvent};

const INBOX_DEPTH: usize = 128;

// ── Loopback transport ───────────────────────────────────────────────

struct Endpoint {
    capabilities: Vec<String>,
    tx: mpsc::Sender<TransportEvent>,
    reachable: bool,
    failing: bool,
}

/// Shared medium connecting loopback transports.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    endpoints: Arc<DashMap<NodeId, Endpoint>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node advertising `capabilities`. Everyone else is told the
    /// capability set changed.
    pub fn connect(
        &self,
        node: impl Into<NodeId>,
        capabilities: &[&str],
    ) -> (Arc<LoopbackTransport>, mpsc::Receiver<TransportEvent>) {
        let node = node.into();
        let (tx, rx) = mpsc::channel(INBOX_DEPTH);
        self.endpoints.insert(
            node.clone(),
            Endpoint {
                capabilities: capabilities.iter().map(|c| (*c).to_owned()).collect(),
                tx,
                reachable: true,
                failing: false,
            },
        );
        self.notify_others(&node);

        let transport = Arc::new(LoopbackTransport {
            hub: self.clone(),
            local: node,
        });
        (transport, rx)
    }

    /// Take a node in or out of range.
    pub fn set_reachable(&self, node: &NodeId, reachable: bool) {
        if let Some(mut ep) = self.endpoints.get_mut(node) {
            ep.reachable = reachable;
        }
        self.notify_others(node);
    }

    /// Make sends to `node` fail while it stays discoverable.
    pub fn fail_sends_to(&self, node: &NodeId, failing: bool) {
        if let Some(mut ep) = self.endpoints.get_mut(node) {
            ep.failing = failing;
        }
    }

    pub fn disconnect(&self, node: &NodeId) {
        self.endpoints.remove(node);
        self.notify_others(node);
    }

    fn notify_others(&self, changed: &NodeId) {
        let others: Vec<mpsc::Sender<TransportEvent>> = self
            .endpoints
            .iter()
            .filter(|ep| ep.key() != changed)
            .map(|ep| ep.tx.clone())
            .collect();
        for tx in others {
            if tx.try_send(TransportEvent::CapabilityChanged).is_err() {
                trace!("capability notification dropped");
            }
        }
    }
}

pub struct LoopbackTransport {
    hub: LoopbackHub,
    local: NodeId,
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn local_node(&self) -> &NodeId {
        &self.local
    }

    async fn send(&self, node: &NodeId, path: &str, payload: Bytes) -> Result<(), TransportError> {
        let tx = {
            let Some(ep) = self.hub.endpoints.get(node) else {
                return Err(TransportError::Unreachable { node: node.clone() });
            };
            if !ep.reachable {
                return Err(TransportError::Unreachable { node: node.clone() });
            }
            if ep.failing {
                return Err(TransportError::Rejected {
                    node: node.clone(),
                    reason: "simulated failure".into(),
                });
            }
            ep.tx.clone()
        };

        trace!(from = %self.local, to = %node, path, bytes = payload.len(), "loopback send");
        tx.send(TransportEvent::Message(InboundMessage::new(
            self.local.clone(),
            path,
            payload,
        )))
        .await
        .map_err(|_| TransportError::Closed)
    }

    async fn capable_nodes(&self, capability: &str) -> Result<Vec<Node>, TransportError> {
        Ok(self
            .hub
            .endpoints
            .iter()
            .filter(|ep| ep.reachable && ep.capabilities.iter().any(|c| c == capability))
            .map(|ep| Node::new(ep.key().clone(), ep.key().as_str()))
            .collect())
    }
}

// ── Simulated phone ──────────────────────────────────────────────────

/// Everything the simulated phone knows, plus the knobs that decide which
/// privilege channels work.
#[derive(Debug, Clone)]
pub struct SimulatedState {
    pub battery: BatteryStatus,
    pub wifi: bool,
    pub bluetooth: bool,
    pub mobile_data: bool,
    pub location: LocationState,
    pub torch: bool,
    pub dnd: DndChoice,
    pub ringer: RingerChoice,
    pub hotspot: bool,
    pub nfc: bool,
    pub locked: bool,
    pub music_playing: bool,
    pub brightness: i32,
    pub music_volume: i32,
    pub dialer_opened: u32,
    pub app_opened: u32,
    pub music_players: Vec<AppItem>,
    pub apps: Vec<AppItem>,
    pub launched: Vec<AppItem>,
    pub sleep_timer_minutes: Option<i32>,

    /// Action types whose normal-permission control is refused.
    pub denied: HashSet<ActionType>,
    pub broker_running: bool,
    pub secure_settings_granted: bool,
    pub root: bool,
    /// Commands run through the broker or root shell.
    pub commands: Vec<String>,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            battery: BatteryStatus::new(80, false),
            wifi: true,
            bluetooth: true,
            mobile_data: true,
            location: LocationState::HighAccuracy,
            torch: false,
            dnd: DndChoice::Off,
            ringer: RingerChoice::Sound,
            hotspot: false,
            nfc: false,
            locked: false,
            music_playing: false,
            brightness: 50,
            music_volume: 7,
            dialer_opened: 0,
            app_opened: 0,
            music_players: vec![
                AppItem::new("com.example.music", "com.example.music.Main").with_label("Music"),
            ],
            apps: vec![
                AppItem::new("com.example.mail", "com.example.mail.Inbox").with_label("Mail"),
                AppItem::new("com.example.maps", "com.example.maps.Map").with_label("Maps"),
            ],
            launched: Vec::new(),
            sleep_timer_minutes: None,
            denied: HashSet::new(),
            broker_running: false,
            secure_settings_granted: false,
            root: false,
            commands: Vec::new(),
        }
    }
}

pub struct SimulatedDevice {
    platform: PlatformInfo,
    name: Option<String>,
    state: Mutex<SimulatedState>,
    timer_started: Mutex<Option<Instant>>,
}

impl SimulatedDevice {
    pub fn new(platform: PlatformInfo) -> Self {
        Self::with_state(platform, SimulatedState::default())
    }

    pub fn with_state(platform: PlatformInfo, state: SimulatedState) -> Self {
        Self {
            platform,
            name: Some("Simulated Phone".into()),
            state: Mutex::new(state),
            timer_started: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SimulatedState {
        self.state().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut SimulatedState)) {
        f(&mut self.state());
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` unless the normal control for `action_type` is refused.
    fn control(
        &self,
        action_type: ActionType,
        f: impl FnOnce(&mut SimulatedState),
    ) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.denied.contains(&action_type) {
            return Err(DeviceError::PermissionDenied(format!(
                "{action_type} control not granted"
            )));
        }
        f(&mut state);
        Ok(())
    }

    fn interpret(&self, command: &str) -> ShellOutput {
        let words: Vec<&str> = command.split_whitespace().collect();
        let mut state = self.state();
        state.commands.push(command.to_owned());

        let applied = match words.as_slice() {
            ["svc", radio, verb @ ("enable" | "disable")] => {
                let on = *verb == "enable";
                match *radio {
                    "wifi" => state.wifi = on,
                    "bluetooth" => state.bluetooth = on,
                    "data" => state.mobile_data = on,
                    "nfc" => state.nfc = on,
                    _ => return unknown(command),
                }
                true
            }
            ["settings", "put", "secure", "location_mode", mode] => match mode.parse::<i32>() {
                Ok(mode) => {
                    state.location = LocationState::from_choice(mode);
                    true
                }
                Err(_) => false,
            },
            ["cmd", "notification", "set_dnd", arg] => {
                match DndChoice::iter().find(|c| c.shell_arg() == *arg) {
                    Some(choice) => {
                        state.dnd = choice;
                        true
                    }
                    None => false,
                }
            }
            ["input", "keyevent", _] => {
                state.locked = true;
                true
            }
            _ => return unknown(command),
        };

        if applied {
            debug!(command, "simulated shell command applied");
            ShellOutput::success()
        } else {
            ShellOutput {
                status: 1,
                stdout: String::new(),
                stderr: format!("bad argument: {command}"),
            }
        }
    }
}

fn unknown(command: &str) -> ShellOutput {
    ShellOutput {
        status: 127,
        stdout: String::new(),
        stderr: format!("{command}: not found"),
    }
}

#[async_trait]
impl DevicePlatform for SimulatedDevice {
    fn platform(&self) -> PlatformInfo {
        self.platform
    }

    fn bluetooth_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn battery_status(&self) -> Result<BatteryStatus, DeviceError> {
        Ok(self.state().battery)
    }

    async fn wifi_state(&self) -> Result<WifiState, DeviceError> {
        Ok(if self.state().wifi {
            WifiState::Enabled
        } else {
            WifiState::Disabled
        })
    }

    async fn bluetooth_enabled(&self) -> Result<bool, DeviceError> {
        Ok(self.state().bluetooth)
    }

    async fn mobile_data_enabled(&self) -> Result<bool, DeviceError> {
        Ok(self.state().mobile_data)
    }

    async fn location_state(&self) -> Result<LocationState, DeviceError> {
        Ok(self.state().location)
    }

    async fn torch_enabled(&self) -> Result<bool, DeviceError> {
        Ok(self.state().torch)
    }

    async fn dnd_choice(&self) -> Result<DndChoice, DeviceError> {
        Ok(self.state().dnd)
    }

    async fn ringer_choice(&self) -> Result<RingerChoice, DeviceError> {
        Ok(self.state().ringer)
    }

    async fn hotspot_enabled(&self) -> Result<bool, DeviceError> {
        Ok(self.state().hotspot)
    }

    async fn nfc_enabled(&self) -> Result<bool, DeviceError> {
        Ok(self.state().nfc)
    }

    async fn set_wifi_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.control(ActionType::Wifi, |s| s.wifi = enabled)
    }

    async fn set_bluetooth_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.control(ActionType::Bluetooth, |s| s.bluetooth = enabled)
    }

    async fn set_torch_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.control(ActionType::Torch, |s| s.torch = enabled)
    }

    async fn set_hotspot_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.control(ActionType::Hotspot, |s| s.hotspot = enabled)
    }

    async fn set_nfc_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.control(ActionType::Nfc, |s| s.nfc = enabled)
    }

    async fn set_dnd(&self, choice: DndChoice) -> Result<(), DeviceError> {
        self.control(ActionType::DoNotDisturb, |s| s.dnd = choice)
    }

    async fn set_ringer(&self, choice: RingerChoice) -> Result<(), DeviceError> {
        self.control(ActionType::Ringer, |s| s.ringer = choice)
    }

    async fn lock_screen(&self) -> Result<(), DeviceError> {
        self.control(ActionType::LockScreen, |s| s.locked = true)
    }

    async fn adjust_volume(
        &self,
        stream: AudioStreamType,
        direction: Direction,
    ) -> Result<(), DeviceError> {
        self.control(ActionType::Volume, |s| {
            if stream == AudioStreamType::Music {
                s.music_volume = step(s.music_volume, direction, 15);
            }
        })
    }

    async fn adjust_brightness(&self, direction: Direction) -> Result<(), DeviceError> {
        self.control(ActionType::Brightness, |s| {
            s.brightness = step(s.brightness, direction, 100);
        })
    }

    async fn toggle_music_playback(&self) -> Result<(), DeviceError> {
        self.control(ActionType::MusicPlayback, |s| s.music_playing = !s.music_playing)
    }

    async fn open_dialer(&self) -> Result<(), DeviceError> {
        self.control(ActionType::Phone, |s| s.dialer_opened += 1)
    }

    async fn open_companion_app(&self) -> Result<(), DeviceError> {
        self.state().app_opened += 1;
        Ok(())
    }

    async fn music_players(&self) -> Result<Vec<AppItem>, DeviceError> {
        Ok(self.state().music_players.clone())
    }

    async fn launchable_apps(&self) -> Result<Vec<AppItem>, DeviceError> {
        Ok(self.state().apps.clone())
    }

    async fn launch_app(&self, app: &AppItem) -> Result<(), DeviceError> {
        let mut state = self.state();
        if !state.apps.contains(app) {
            return Err(DeviceError::Failed(format!("{} is not installed", app.package_name)));
        }
        state.launched.push(app.clone());
        Ok(())
    }

    async fn start_playback(&self, player: &AppItem) -> Result<(), DeviceError> {
        let mut state = self.state();
        if !state.music_players.contains(player) {
            return Err(DeviceError::Failed(format!("{} is not a music player", player.package_name)));
        }
        state.music_playing = true;
        Ok(())
    }

    async fn sleep_timer_available(&self) -> bool {
        true
    }

    async fn sleep_timer_status(&self) -> Result<Option<SleepTimerStatus>, DeviceError> {
        let Some(minutes) = self.state().sleep_timer_minutes else {
            return Ok(None);
        };
        let started = *self
            .timer_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let elapsed_ms = started.map_or(0, |t| i64::try_from(t.elapsed().as_millis()).unwrap_or(i64::MAX));
        Ok(Some(SleepTimerStatus {
            start_ms: i64::from(minutes) * 60_000,
            elapsed_ms,
        }))
    }

    async fn start_sleep_timer(&self, minutes: i32) -> Result<(), DeviceError> {
        if minutes <= 0 {
            return Err(DeviceError::Failed(format!("invalid duration: {minutes} min")));
        }
        self.control(ActionType::SleepTimer, |s| s.sleep_timer_minutes = Some(minutes))?;
        *self
            .timer_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        Ok(())
    }

    async fn stop_sleep_timer(&self) -> Result<(), DeviceError> {
        self.control(ActionType::SleepTimer, |s| s.sleep_timer_minutes = None)?;
        *self
            .timer_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

fn step(value: i32, direction: Direction, max: i32) -> i32 {
    match direction {
        Direction::Up => (value + 1).min(max),
        Direction::Down => (value - 1).max(0),
    }
}

#[async_trait]
impl PrivilegedBroker for SimulatedDevice {
    async fn is_running(&self) -> bool {
        self.state().broker_running
    }

    async fn exec(&self, command: &str) -> Result<ShellOutput, DeviceError> {
        if !self.state().broker_running {
            return Err(DeviceError::Unsupported("broker not running".into()));
        }
        Ok(self.interpret(command))
    }
}

#[async_trait]
impl SecureSettings for SimulatedDevice {
    fn can_write(&self) -> bool {
        self.state().secure_settings_granted
    }

    async fn put_int(
        &self,
        namespace: SettingsNamespace,
        key: &str,
        value: i32,
    ) -> Result<(), DeviceError> {
        let mut state = self.state();
        if !state.secure_settings_granted {
            return Err(DeviceError::PermissionDenied("WRITE_SECURE_SETTINGS".into()));
        }
        match (namespace, key) {
            (SettingsNamespace::Secure, "location_mode") => {
                state.location = LocationState::from_choice(value);
            }
            (SettingsNamespace::Global, "mobile_data") => state.mobile_data = value != 0,
            (SettingsNamespace::Global, "zen_mode") => {
                state.dnd = DndChoice::iter()
                    .find(|c| c.zen_mode() == value)
                    .ok_or_else(|| DeviceError::Failed(format!("zen_mode {value}")))?;
            }
            _ => {
                return Err(DeviceError::Unsupported(format!("{namespace} {key}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShellRunner for SimulatedDevice {
    async fn has_root(&self) -> bool {
        self.state().root
    }

    async fn run_as_root(&self, command: &str) -> Result<ShellOutput, DeviceError> {
        if !self.state().root {
            return Err(DeviceError::PermissionDenied("su not available".into()));
        }
        Ok(self.interpret(command))
    }
}
