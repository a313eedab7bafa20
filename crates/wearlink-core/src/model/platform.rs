// ── Platform version gating ──

use serde::{Deserialize, Serialize};

/// Platform level of the local device.
///
/// Some OS settings changed shape across releases: do-not-disturb became a
/// multi-state policy and location collapsed from four modes to a boolean.
/// Both shapes stay representable so older peers remain wire compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub level: u32,
}

impl PlatformInfo {
    /// First level with the notification-policy DND modes.
    pub const DND_POLICY_LEVEL: u32 = 23;
    /// First level where location is a plain on/off switch.
    pub const LOCATION_TOGGLE_LEVEL: u32 = 28;
    pub const DEFAULT_LEVEL: u32 = 34;

    pub const fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn has_dnd_policy(self) -> bool {
        self.level >= Self::DND_POLICY_LEVEL
    }

    pub fn location_is_toggle(self) -> bool {
        self.level >= Self::LOCATION_TOGGLE_LEVEL
    }
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}
