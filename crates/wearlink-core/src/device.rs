// ── Device seam ──
//
// Everything the phone side needs from the operating system: state queries,
// normal-permission controls and the two privileged channels (a broker
// process that runs shell commands for us, and direct secure-settings
// writes). Implementations live outside the core; `stub` carries an
// in-memory one.

use async_trait::async_trait;
use strum::Display;
use thiserror::Error;

use crate::model::{
    ActionStatus, AppItem, AudioStreamType, BatteryStatus, Direction, DndChoice, LocationState,
    PlatformInfo, RingerChoice, SleepTimerStatus, WifiState,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not supported on this device: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

impl DeviceError {
    /// Local status for a failed device call.
    pub fn status(&self) -> ActionStatus {
        match self {
            DeviceError::PermissionDenied(_) => ActionStatus::PermissionDenied,
            DeviceError::Unsupported(_) | DeviceError::Failed(_) => ActionStatus::Failure,
        }
    }
}

// ── Platform ─────────────────────────────────────────────────────────

/// Queries and normal-permission controls of the host device.
#[async_trait]
pub trait DevicePlatform: Send + Sync {
    fn platform(&self) -> PlatformInfo;

    /// Friendly Bluetooth adapter name, if the adapter has one.
    fn bluetooth_name(&self) -> Option<String>;

    // ── State queries ──

    async fn battery_status(&self) -> Result<BatteryStatus, DeviceError>;
    async fn wifi_state(&self) -> Result<WifiState, DeviceError>;
    async fn bluetooth_enabled(&self) -> Result<bool, DeviceError>;
    async fn mobile_data_enabled(&self) -> Result<bool, DeviceError>;
    /// On toggle-only platforms this is either `Off` or `HighAccuracy`.
    async fn location_state(&self) -> Result<LocationState, DeviceError>;
    async fn torch_enabled(&self) -> Result<bool, DeviceError>;
    async fn dnd_choice(&self) -> Result<DndChoice, DeviceError>;
    async fn ringer_choice(&self) -> Result<RingerChoice, DeviceError>;
    async fn hotspot_enabled(&self) -> Result<bool, DeviceError>;
    async fn nfc_enabled(&self) -> Result<bool, DeviceError>;

    // ── Normal-permission controls ──

    async fn set_wifi_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    async fn set_bluetooth_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    async fn set_torch_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    async fn set_hotspot_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    async fn set_nfc_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    async fn set_dnd(&self, choice: DndChoice) -> Result<(), DeviceError>;
    async fn set_ringer(&self, choice: RingerChoice) -> Result<(), DeviceError>;
    async fn lock_screen(&self) -> Result<(), DeviceError>;
    async fn adjust_volume(
        &self,
        stream: AudioStreamType,
        direction: Direction,
    ) -> Result<(), DeviceError>;
    async fn adjust_brightness(&self, direction: Direction) -> Result<(), DeviceError>;
    async fn toggle_music_playback(&self) -> Result<(), DeviceError>;
    async fn open_dialer(&self) -> Result<(), DeviceError>;
    async fn open_companion_app(&self) -> Result<(), DeviceError>;

    // ── Media and apps ──

    async fn music_players(&self) -> Result<Vec<AppItem>, DeviceError>;
    async fn launchable_apps(&self) -> Result<Vec<AppItem>, DeviceError>;
    async fn launch_app(&self, app: &AppItem) -> Result<(), DeviceError>;
    async fn start_playback(&self, player: &AppItem) -> Result<(), DeviceError>;

    // ── Sleep timer ──

    async fn sleep_timer_available(&self) -> bool;
    async fn sleep_timer_status(&self) -> Result<Option<SleepTimerStatus>, DeviceError>;
    async fn start_sleep_timer(&self, minutes: i32) -> Result<(), DeviceError>;
    async fn stop_sleep_timer(&self) -> Result<(), DeviceError>;
}

// ── Privileged channels ──────────────────────────────────────────────

/// Result of a shell command run by the broker or a root shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// External process that runs shell commands with elevated privilege on
/// our behalf once the user has authorized it.
#[async_trait]
pub trait PrivilegedBroker: Send + Sync {
    async fn is_running(&self) -> bool;
    async fn exec(&self, command: &str) -> Result<ShellOutput, DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SettingsNamespace {
    Secure,
    Global,
    System,
}

/// Direct writes to system settings, available once the user has granted
/// the secure-settings permission out of band.
#[async_trait]
pub trait SecureSettings: Send + Sync {
    fn can_write(&self) -> bool;
    async fn put_int(
        &self,
        namespace: SettingsNamespace,
        key: &str,
        value: i32,
    ) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_map_to_local_statuses() {
        assert_eq!(
            DeviceError::PermissionDenied("zen".into()).status(),
            ActionStatus::PermissionDenied
        );
        assert_eq!(DeviceError::Failed("io".into()).status(), ActionStatus::Failure);
        assert_eq!(DeviceError::Unsupported("nfc".into()).status(), ActionStatus::Failure);
    }

    #[test]
    fn settings_namespace_matches_shell_spelling() {
        assert_eq!(SettingsNamespace::Secure.to_string(), "secure");
        assert_eq!(SettingsNamespace::Global.to_string(), "global");
    }
}
