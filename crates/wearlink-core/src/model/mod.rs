// ── Companion domain model ──
//
// Canonical types shared by the codec, router, execution chain and stores.

pub mod action;
pub mod app;
pub mod peer;
pub mod platform;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use wearlink_core::model::*` gives you everything.

pub use action::{
    Action, ActionStatus, ActionType, MultiChoiceAction, NormalAction, TimedAction, ToggleAction,
    ValueAction, VolumeAction, number_of_states,
};
pub use app::AppItem;
pub use peer::{Node, NodeId};
pub use platform::PlatformInfo;
pub use state::{
    AppState, AudioStreamType, BatteryStatus, Direction, DndChoice, LocationState, RingerChoice,
    SleepTimerStatus, WifiState,
};
