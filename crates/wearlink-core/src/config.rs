// ── Runtime session configuration ──
//
// Describes one side of the companion pair. Built by the CLI (or an
// embedding app) and handed to a controller; the core never reads
// configuration files itself.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{NodeId, PlatformInfo};

pub const PHONE_CAPABILITY: &str = "wearlink_phone";
pub const WATCH_CAPABILITY: &str = "wearlink_watch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Phone,
    Watch,
}

impl Role {
    /// Capability advertised by the app playing this role.
    pub fn capability(self) -> &'static str {
        match self {
            Role::Phone => PHONE_CAPABILITY,
            Role::Watch => WATCH_CAPABILITY,
        }
    }

    pub fn peer(self) -> Role {
        match self {
            Role::Phone => Role::Watch,
            Role::Watch => Role::Phone,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    pub role: Role,
    pub node_id: NodeId,
    pub platform: PlatformInfo,
    /// Capability queried to find peers.
    pub peer_capability: String,
    pub discovery_timeout: Duration,
    /// Bound on waiting for a status dump after asking for one.
    pub status_wait: Duration,
    /// Bound on waiting for an action result.
    pub action_wait: Duration,
    pub broker_enabled: bool,
    pub root_enabled: bool,
    /// Run actions through the privileged helper instead of in-process.
    pub use_helper: bool,
    /// Where the watch persists its caches. `None` disables persistence.
    pub cache_dir: Option<PathBuf>,
}

impl CompanionConfig {
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

    pub fn for_role(role: Role, node_id: impl Into<NodeId>) -> Self {
        Self {
            role,
            node_id: node_id.into(),
            platform: PlatformInfo::default(),
            peer_capability: role.peer().capability().to_owned(),
            discovery_timeout: Self::DEFAULT_WAIT,
            status_wait: Self::DEFAULT_WAIT,
            action_wait: Self::DEFAULT_WAIT,
            broker_enabled: true,
            root_enabled: false,
            use_helper: false,
            cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn each_role_looks_for_the_other() {
        let phone = CompanionConfig::for_role(Role::Phone, "p1");
        assert_eq!(phone.peer_capability, WATCH_CAPABILITY);
        let watch = CompanionConfig::for_role(Role::Watch, "w1");
        assert_eq!(watch.peer_capability, PHONE_CAPABILITY);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(Role::from_str("Watch").ok(), Some(Role::Watch));
        assert_eq!(Role::Phone.to_string(), "phone");
    }
}
