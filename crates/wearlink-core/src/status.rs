// ── Status reporting ──
//
// Phone-side snapshots of device state, pushed to one node or broadcast.
// Every report re-reads the device at send time; nothing is cached here.

use std::sync::Arc;

use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, warn};

use crate::codec::{encode_bool, encode_i32, encode_json};
use crate::device::{DeviceError, DevicePlatform};
use crate::model::{
    Action, ActionStatus, ActionType, DndChoice, LocationState, MultiChoiceAction, NodeId,
    ToggleAction,
};
use crate::router::routes::{
    ACTIONS_PATH, BATTERY_STATUS_PATH, BLUETOOTH_STATUS_PATH, WIFI_STATUS_PATH,
};
use crate::router::{Messenger, SendReport};

/// Which part of the status report to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum StatusScope {
    Wifi,
    Battery,
    Bluetooth,
}

impl StatusScope {
    pub fn path(self) -> &'static str {
        match self {
            StatusScope::Wifi => WIFI_STATUS_PATH,
            StatusScope::Battery => BATTERY_STATUS_PATH,
            StatusScope::Bluetooth => BLUETOOTH_STATUS_PATH,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        StatusScope::iter().find(|s| s.path() == path)
    }

    /// Status item that follows a successful action of this type.
    pub fn for_action(action_type: ActionType) -> Option<Self> {
        match action_type {
            ActionType::Wifi => Some(StatusScope::Wifi),
            ActionType::Bluetooth => Some(StatusScope::Bluetooth),
            _ => None,
        }
    }
}

pub struct StatusReporter {
    device: Arc<dyn DevicePlatform>,
    messenger: Arc<Messenger>,
}

impl StatusReporter {
    pub fn new(device: Arc<dyn DevicePlatform>, messenger: Arc<Messenger>) -> Self {
        Self { device, messenger }
    }

    /// Send one message per status item, or just the one in `scope`.
    pub async fn send_status_update(
        &self,
        node: Option<&NodeId>,
        scope: Option<StatusScope>,
    ) -> SendReport {
        let scopes: Vec<StatusScope> = match scope {
            Some(s) => vec![s],
            None => StatusScope::iter().collect(),
        };

        let mut report = SendReport::default();
        for scope in scopes {
            let payload = match self.status_payload(scope).await {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%scope, error = %e, "cannot read status");
                    continue;
                }
            };
            report.merge(self.messenger.send(node, scope.path(), payload).await);
        }
        report
    }

    async fn status_payload(&self, scope: StatusScope) -> Result<Option<bytes::Bytes>, DeviceError> {
        Ok(match scope {
            StatusScope::Wifi => Some(encode_i32(self.device.wifi_state().await?.code())),
            StatusScope::Battery => encode_json(&self.device.battery_status().await?),
            StatusScope::Bluetooth => Some(encode_bool(self.device.bluetooth_enabled().await?)),
        })
    }

    /// Send the current state of every synced action type, each marked
    /// `SUCCESS` unless its state could not be read.
    pub async fn send_actions_update(&self, node: Option<&NodeId>) -> SendReport {
        let mut report = SendReport::default();
        for action_type in ActionType::sync_catalog() {
            let action = self.reported_action(action_type).await;
            report.merge(self.messenger.send_action(node, ACTIONS_PATH, &action).await);
        }
        debug!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "actions update sent"
        );
        report
    }

    pub async fn send_action_update(&self, node: Option<&NodeId>, action_type: ActionType) -> SendReport {
        let action = self.reported_action(action_type).await;
        self.messenger.send_action(node, ACTIONS_PATH, &action).await
    }

    /// Current state, or the placeholder carrying the query's failure status.
    async fn reported_action(&self, action_type: ActionType) -> Action {
        match self.current_action(action_type).await {
            Ok(action) => action,
            Err(e) => {
                warn!(%action_type, error = %e, "cannot read action state");
                Action::default_for(action_type, self.device.platform()).with_status(e.status())
            }
        }
    }

    /// The true device state of `action_type`, marked `SUCCESS`.
    pub async fn current_action(&self, action_type: ActionType) -> Result<Action, DeviceError> {
        let d = &self.device;
        let platform = d.platform();

        let action: Action = match action_type {
            ActionType::Wifi => ToggleAction::new(action_type, d.wifi_state().await?.is_enabled()).into(),
            ActionType::Bluetooth => ToggleAction::new(action_type, d.bluetooth_enabled().await?).into(),
            ActionType::MobileData => ToggleAction::new(action_type, d.mobile_data_enabled().await?).into(),
            ActionType::Torch => ToggleAction::new(action_type, d.torch_enabled().await?).into(),
            ActionType::Hotspot => ToggleAction::new(action_type, d.hotspot_enabled().await?).into(),
            ActionType::Nfc => ToggleAction::new(action_type, d.nfc_enabled().await?).into(),
            ActionType::Location => {
                let state = d.location_state().await?;
                if platform.location_is_toggle() {
                    ToggleAction::new(action_type, state != LocationState::Off).into()
                } else {
                    MultiChoiceAction::new(action_type, state.choice(), platform).into()
                }
            }
            ActionType::DoNotDisturb => {
                let choice = d.dnd_choice().await?;
                if platform.has_dnd_policy() {
                    MultiChoiceAction::new(action_type, choice.choice(), platform).into()
                } else {
                    ToggleAction::new(action_type, choice != DndChoice::Off).into()
                }
            }
            ActionType::Ringer => {
                MultiChoiceAction::new(action_type, d.ringer_choice().await?.choice(), platform).into()
            }
            _ => Action::default_for(action_type, platform),
        };

        Ok(action.with_status(ActionStatus::Success))
    }
}
