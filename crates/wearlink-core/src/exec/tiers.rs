// ── Tier implementations ──

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::provider::{CapabilityProvider, Tier, TierError};
use super::shell::{ShellRunner, command_for};
use crate::device::{DevicePlatform, PrivilegedBroker, SecureSettings, SettingsNamespace, ShellOutput};
use crate::model::{Action, ActionType, DndChoice, LocationState, RingerChoice};

/// Minutes used when the sleep timer is started from its dashboard tile.
pub const DEFAULT_SLEEP_TIMER_MINUTES: i32 = 30;

fn check_output(command: &str, out: &ShellOutput) -> Result<(), TierError> {
    if out.is_success() {
        return Ok(());
    }
    let detail = if out.stderr.trim().is_empty() {
        format!("`{command}` exited with {}", out.status)
    } else {
        format!("`{command}`: {}", out.stderr.trim())
    };
    Err(TierError::Failed(detail))
}

// ── Normal ───────────────────────────────────────────────────────────

pub struct NormalTier {
    device: Arc<dyn DevicePlatform>,
}

impl NormalTier {
    pub fn new(device: Arc<dyn DevicePlatform>) -> Self {
        Self { device }
    }
}

#[async_trait]
impl CapabilityProvider for NormalTier {
    fn tier(&self) -> Tier {
        Tier::Normal
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn try_execute(&self, action: &Action) -> Result<(), TierError> {
        let d = &self.device;
        match action {
            Action::Toggle(t) => {
                let on = t.enabled();
                match t.action_type() {
                    ActionType::Wifi => d.set_wifi_enabled(on).await?,
                    ActionType::Bluetooth => d.set_bluetooth_enabled(on).await?,
                    ActionType::Torch => d.set_torch_enabled(on).await?,
                    ActionType::Hotspot => d.set_hotspot_enabled(on).await?,
                    ActionType::Nfc => d.set_nfc_enabled(on).await?,
                    ActionType::DoNotDisturb => {
                        d.set_dnd(if on { DndChoice::Priority } else { DndChoice::Off })
                            .await?;
                    }
                    _ => return Err(TierError::unsupported(action)),
                }
            }
            Action::MultiChoice(m) => match m.action_type() {
                ActionType::DoNotDisturb => d.set_dnd(DndChoice::from_choice(m.choice())).await?,
                ActionType::Ringer => d.set_ringer(RingerChoice::from_choice(m.choice())).await?,
                _ => return Err(TierError::unsupported(action)),
            },
            Action::Normal(n) => match n.action_type() {
                ActionType::LockScreen => d.lock_screen().await?,
                ActionType::MusicPlayback => d.toggle_music_playback().await?,
                ActionType::SleepTimer => d.start_sleep_timer(DEFAULT_SLEEP_TIMER_MINUTES).await?,
                ActionType::Phone => d.open_dialer().await?,
                ActionType::Apps => d.open_companion_app().await?,
                _ => return Err(TierError::unsupported(action)),
            },
            Action::Value(v) if v.action_type() == ActionType::Brightness => {
                d.adjust_brightness(v.direction()).await?;
            }
            Action::Volume(v) => d.adjust_volume(v.stream_type(), v.direction()).await?,
            Action::Value(_) | Action::Timed(_) => return Err(TierError::unsupported(action)),
        }
        Ok(())
    }
}

// ── Broker ───────────────────────────────────────────────────────────

pub struct BrokerTier {
    broker: Arc<dyn PrivilegedBroker>,
    enabled: bool,
}

impl BrokerTier {
    pub fn new(broker: Arc<dyn PrivilegedBroker>, enabled: bool) -> Self {
        Self { broker, enabled }
    }
}

#[async_trait]
impl CapabilityProvider for BrokerTier {
    fn tier(&self) -> Tier {
        Tier::Broker
    }

    async fn is_available(&self) -> bool {
        self.enabled && self.broker.is_running().await
    }

    async fn try_execute(&self, action: &Action) -> Result<(), TierError> {
        let command = command_for(action).ok_or_else(|| TierError::unsupported(action))?;
        debug!(%command, "running through broker");
        let out = self.broker.exec(&command).await?;
        check_output(&command, &out)
    }
}

// ── Secure settings ──────────────────────────────────────────────────

pub struct SecureSettingsTier {
    settings: Arc<dyn SecureSettings>,
}

impl SecureSettingsTier {
    pub fn new(settings: Arc<dyn SecureSettings>) -> Self {
        Self { settings }
    }

    /// Settings write that performs `action`, if there is one.
    fn setting_for(action: &Action) -> Option<(SettingsNamespace, &'static str, i32)> {
        match action {
            Action::Toggle(t) => match t.action_type() {
                ActionType::Location => {
                    let mode = if t.enabled() { LocationState::HighAccuracy } else { LocationState::Off };
                    Some((SettingsNamespace::Secure, "location_mode", mode.choice()))
                }
                ActionType::MobileData => {
                    Some((SettingsNamespace::Global, "mobile_data", i32::from(t.enabled())))
                }
                ActionType::DoNotDisturb => {
                    let choice = if t.enabled() { DndChoice::Priority } else { DndChoice::Off };
                    Some((SettingsNamespace::Global, "zen_mode", choice.zen_mode()))
                }
                _ => None,
            },
            Action::MultiChoice(m) => match m.action_type() {
                ActionType::Location => Some((
                    SettingsNamespace::Secure,
                    "location_mode",
                    LocationState::from_choice(m.choice()).choice(),
                )),
                ActionType::DoNotDisturb => Some((
                    SettingsNamespace::Global,
                    "zen_mode",
                    DndChoice::from_choice(m.choice()).zen_mode(),
                )),
                _ => None,
            },
            Action::Normal(_) | Action::Value(_) | Action::Volume(_) | Action::Timed(_) => None,
        }
    }
}

#[async_trait]
impl CapabilityProvider for SecureSettingsTier {
    fn tier(&self) -> Tier {
        Tier::SecureSettings
    }

    async fn is_available(&self) -> bool {
        self.settings.can_write()
    }

    async fn try_execute(&self, action: &Action) -> Result<(), TierError> {
        let (namespace, key, value) =
            Self::setting_for(action).ok_or_else(|| TierError::unsupported(action))?;
        debug!(%namespace, key, value, "writing setting");
        self.settings.put_int(namespace, key, value).await?;
        Ok(())
    }
}

// ── Root shell ───────────────────────────────────────────────────────

pub struct RootShellTier {
    shell: Arc<dyn ShellRunner>,
    enabled: bool,
}

impl RootShellTier {
    pub fn new(shell: Arc<dyn ShellRunner>, enabled: bool) -> Self {
        Self { shell, enabled }
    }
}

#[async_trait]
impl CapabilityProvider for RootShellTier {
    fn tier(&self) -> Tier {
        Tier::RootShell
    }

    async fn is_available(&self) -> bool {
        self.enabled && self.shell.has_root().await
    }

    async fn try_execute(&self, action: &Action) -> Result<(), TierError> {
        let command = command_for(action).ok_or_else(|| TierError::unsupported(action))?;
        debug!(%command, "running as root");
        let out = self.shell.run_as_root(&command).await?;
        check_output(&command, &out)
    }
}
