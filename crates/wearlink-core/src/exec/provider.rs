// ── Capability providers ──
//
// One provider per privilege tier. A provider either performs an action,
// declines it (unsupported or not permitted), or fails trying.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;

use crate::device::DeviceError;
use crate::model::{Action, ActionType};

/// Privilege tiers, weakest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Tier {
    /// Public OS APIs under normal app permissions.
    Normal,
    /// Shell commands relayed by an authorized broker process.
    Broker,
    /// Direct writes to secure/global settings.
    SecureSettings,
    /// `su` shell on rooted devices.
    RootShell,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    #[error("{action_type} is not handled at this tier")]
    Unsupported { action_type: ActionType },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("execution failed: {0}")]
    Failed(String),
}

impl TierError {
    pub(crate) fn unsupported(action: &Action) -> Self {
        TierError::Unsupported {
            action_type: action.action_type(),
        }
    }
}

impl From<DeviceError> for TierError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::PermissionDenied(msg) => TierError::PermissionDenied(msg),
            DeviceError::Unsupported(msg) | DeviceError::Failed(msg) => TierError::Failed(msg),
        }
    }
}

#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    fn tier(&self) -> Tier;

    /// Whether this tier can be used at all right now (broker running,
    /// grant present, root available).
    async fn is_available(&self) -> bool;

    async fn try_execute(&self, action: &Action) -> Result<(), TierError>;
}
