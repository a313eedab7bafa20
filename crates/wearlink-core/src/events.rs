// ── Session events ──
//
// Broadcast to UI layers and tests. Subscribers that fall behind lose the
// oldest events; the stores remain the source of truth.

use crate::model::{Action, ActionStatus, AppState, Node, NodeId, SleepTimerStatus};
use crate::status::StatusScope;

#[derive(Debug, Clone, PartialEq)]
pub enum CompanionEvent {
    /// The discovered peer set changed.
    PeersChanged(Vec<Node>),
    PeerAppState { node: NodeId, state: AppState },
    PeerVersion { node: NodeId, version: i32 },
    /// A successful action result entered the cache.
    ActionUpdated(Action),
    /// A non-successful result arrived; the cache was left untouched.
    ActionFailed(Action),
    StatusUpdated(StatusScope),
    MusicPlayersUpdated { count: usize },
    AppsUpdated { count: usize },
    /// Outcome of a launch/open/play command.
    CommandResult { path: String, status: ActionStatus },
    SleepTimerUpdated(Option<SleepTimerStatus>),
    /// The peer asked this side to bring its app to the foreground.
    OpenAppRequested { node: NodeId },
    BluetoothDiscoverable { node: NodeId, name: String },
    TimedActionFired { action: Action, status: ActionStatus },
}
