// wearlink-core: Action model, wire codec and session runtime for phone/watch companion sync.

pub mod codec;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod events;
pub mod exec;
pub mod helper;
pub mod model;
pub mod phone;
pub mod router;
mod session;
pub mod status;
pub mod store;
pub mod stream;
pub mod stub;
pub mod transport;
pub mod watch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CompanionConfig, Role};
pub use device::{DeviceError, DevicePlatform, PrivilegedBroker, SecureSettings};
pub use discovery::PeerDiscovery;
pub use error::CoreError;
pub use events::CompanionEvent;
pub use exec::{ActionExecutor, EscalationChain, Tier, TimedActionScheduler};
pub use helper::{HelperHandle, PrivilegedHelper};
pub use phone::PhoneController;
pub use router::{Route, Router, SendReport};
pub use status::{StatusReporter, StatusScope};
pub use store::{DashboardStore, MediaStore};
pub use stream::CacheStream;
pub use transport::{InboundMessage, Transport, TransportError, TransportEvent};
pub use watch::WatchController;

pub use model::{
    Action, ActionStatus, ActionType, AppItem, AppState, BatteryStatus, MultiChoiceAction, Node,
    NodeId, NormalAction, PlatformInfo, TimedAction, ToggleAction, ValueAction, VolumeAction,
};
