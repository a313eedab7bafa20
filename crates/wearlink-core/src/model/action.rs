// ── Action domain types ──
//
// A closed sum type over the six action shapes. Every variant carries its
// `ActionType` (fixed at construction) and the `ActionStatus` recorded by the
// last round trip.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::platform::PlatformInfo;
use super::state::{AudioStreamType, Direction};
use crate::error::CoreError;

// ── ActionType ───────────────────────────────────────────────────

/// Every remote-controllable capability in the fixed catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ActionType {
    Wifi,
    Bluetooth,
    MobileData,
    Location,
    Torch,
    LockScreen,
    Volume,
    DoNotDisturb,
    Ringer,
    MusicPlayback,
    SleepTimer,
    Apps,
    Phone,
    Brightness,
    Hotspot,
    Gestures,
    TimedAction,
    Nfc,
}

impl ActionType {
    /// Types pushed by a full actions dump.
    ///
    /// `TimedAction` wraps another action and `Gestures` is handled on the
    /// watch alone, so neither has phone-side state to report.
    pub fn sync_catalog() -> impl Iterator<Item = ActionType> {
        ActionType::iter().filter(|t| !matches!(t, ActionType::TimedAction | ActionType::Gestures))
    }

    /// Whether a [`TimedAction`] may target this type.
    pub fn is_timed_target(self) -> bool {
        matches!(
            self,
            ActionType::Wifi
                | ActionType::Bluetooth
                | ActionType::MobileData
                | ActionType::Location
                | ActionType::Torch
                | ActionType::DoNotDisturb
                | ActionType::Ringer
                | ActionType::Hotspot
                | ActionType::SleepTimer
                | ActionType::Nfc
        )
    }
}

// ── ActionStatus ─────────────────────────────────────────────────

/// Outcome of an action round trip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Not attempted yet.
    #[default]
    Unknown,
    Success,
    /// Local failure not caused by a missing permission.
    Failure,
    /// A local permission is missing.
    PermissionDenied,
    /// No response arrived within the bound.
    Timeout,
    /// Execution on the peer failed.
    RemoteFailure,
    /// The peer lacked privilege at every escalation tier.
    RemotePermissionDenied,
}

impl ActionStatus {
    pub fn is_success(self) -> bool {
        self == ActionStatus::Success
    }

    /// True for outcomes that should prompt the user to grant something.
    pub fn is_permission_denied(self) -> bool {
        matches!(
            self,
            ActionStatus::PermissionDenied | ActionStatus::RemotePermissionDenied
        )
    }
}

/// Number of states a [`MultiChoiceAction`] of `action_type` cycles through.
pub fn number_of_states(action_type: ActionType, platform: PlatformInfo) -> u32 {
    match action_type {
        ActionType::Location if platform.location_is_toggle() => 1,
        ActionType::Location | ActionType::DoNotDisturb => 4,
        ActionType::Ringer => 3,
        _ => 1,
    }
}

// ── Variants ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleAction {
    action_type: ActionType,
    enabled: bool,
    status: ActionStatus,
}

impl ToggleAction {
    pub fn new(action_type: ActionType, enabled: bool) -> Self {
        Self {
            action_type,
            enabled,
            status: ActionStatus::Unknown,
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// An action that cycles through a fixed number of states.
///
/// `choice` is kept in `[0, number_of_states)`; out-of-range values wrap
/// with Euclidean modulo, so `-1` becomes the last state.
#[derive(Debug, Clone)]
pub struct MultiChoiceAction {
    action_type: ActionType,
    choice: i32,
    states: u32,
    status: ActionStatus,
}

impl MultiChoiceAction {
    pub fn new(action_type: ActionType, choice: i32, platform: PlatformInfo) -> Self {
        let states = number_of_states(action_type, platform);
        Self {
            action_type,
            choice: normalize_choice(choice, states),
            states,
            status: ActionStatus::Unknown,
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn choice(&self) -> i32 {
        self.choice
    }

    pub fn set_choice(&mut self, choice: i32) {
        self.choice = normalize_choice(choice, self.states);
    }

    pub fn number_of_states(&self) -> u32 {
        self.states
    }
}

// The state count is a function of the local platform, not of the value.
impl PartialEq for MultiChoiceAction {
    fn eq(&self, other: &Self) -> bool {
        self.action_type == other.action_type
            && self.choice == other.choice
            && self.status == other.status
    }
}

impl Eq for MultiChoiceAction {}

fn normalize_choice(choice: i32, states: u32) -> i32 {
    let states = i32::try_from(states.max(1)).unwrap_or(i32::MAX);
    choice.rem_euclid(states)
}

/// Fire-and-forget command with no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalAction {
    action_type: ActionType,
    status: ActionStatus,
}

impl NormalAction {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            status: ActionStatus::Unknown,
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }
}

/// Relative adjustment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAction {
    action_type: ActionType,
    direction: Direction,
    status: ActionStatus,
}

impl ValueAction {
    pub fn new(action_type: ActionType, direction: Direction) -> Self {
        Self {
            action_type,
            direction,
            status: ActionStatus::Unknown,
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }
}

/// Volume adjustment on a specific audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAction {
    value: ValueAction,
    stream_type: AudioStreamType,
}

impl VolumeAction {
    pub fn new(direction: Direction, stream_type: AudioStreamType) -> Self {
        Self {
            value: ValueAction::new(ActionType::Volume, direction),
            stream_type,
        }
    }

    pub fn direction(&self) -> Direction {
        self.value.direction
    }

    pub fn stream_type(&self) -> AudioStreamType {
        self.stream_type
    }
}

/// Wraps a target action scheduled to run at `time_in_millis` (epoch ms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedAction {
    time_in_millis: i64,
    action: Box<Action>,
    status: ActionStatus,
}

impl TimedAction {
    pub fn new(time_in_millis: i64, action: Action) -> Result<Self, CoreError> {
        let target = action.action_type();
        if !target.is_timed_target() {
            return Err(CoreError::InvalidAction {
                message: format!("{target} cannot be scheduled"),
            });
        }
        Ok(Self {
            time_in_millis,
            action: Box::new(action),
            status: ActionStatus::Unknown,
        })
    }

    pub fn time_in_millis(&self) -> i64 {
        self.time_in_millis
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn into_action(self) -> Action {
        *self.action
    }
}

// ── Action ───────────────────────────────────────────────────────

/// A remote-controllable capability and its current or desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Toggle(ToggleAction),
    MultiChoice(MultiChoiceAction),
    Normal(NormalAction),
    Value(ValueAction),
    Volume(VolumeAction),
    Timed(TimedAction),
}

impl Action {
    /// Neutral-state action for `action_type`, used as a UI placeholder and
    /// as the execution-request template.
    pub fn default_for(action_type: ActionType, platform: PlatformInfo) -> Self {
        match action_type {
            ActionType::Wifi
            | ActionType::Bluetooth
            | ActionType::MobileData
            | ActionType::Torch
            | ActionType::Hotspot
            | ActionType::Nfc => ToggleAction::new(action_type, false).into(),
            ActionType::Location => {
                if platform.location_is_toggle() {
                    ToggleAction::new(action_type, false).into()
                } else {
                    MultiChoiceAction::new(action_type, 0, platform).into()
                }
            }
            ActionType::DoNotDisturb => {
                if platform.has_dnd_policy() {
                    MultiChoiceAction::new(action_type, 0, platform).into()
                } else {
                    ToggleAction::new(action_type, false).into()
                }
            }
            ActionType::Ringer => MultiChoiceAction::new(action_type, 0, platform).into(),
            ActionType::Volume => VolumeAction::new(Direction::Up, AudioStreamType::Music).into(),
            ActionType::Brightness => ValueAction::new(action_type, Direction::Up).into(),
            ActionType::LockScreen
            | ActionType::MusicPlayback
            | ActionType::SleepTimer
            | ActionType::Apps
            | ActionType::Phone
            | ActionType::Gestures => NormalAction::new(action_type).into(),
            ActionType::TimedAction => Action::Timed(TimedAction {
                time_in_millis: 0,
                action: Box::new(ToggleAction::new(ActionType::Wifi, false).into()),
                status: ActionStatus::Unknown,
            }),
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Action::Toggle(a) => a.action_type,
            Action::MultiChoice(a) => a.action_type,
            Action::Normal(a) => a.action_type,
            Action::Value(a) => a.action_type,
            Action::Volume(a) => a.value.action_type,
            Action::Timed(_) => ActionType::TimedAction,
        }
    }

    pub fn status(&self) -> ActionStatus {
        match self {
            Action::Toggle(a) => a.status,
            Action::MultiChoice(a) => a.status,
            Action::Normal(a) => a.status,
            Action::Value(a) => a.status,
            Action::Volume(a) => a.value.status,
            Action::Timed(a) => a.status,
        }
    }

    pub fn is_action_successful(&self) -> bool {
        self.status().is_success()
    }

    /// Record the outcome of a round trip. The only mutator after
    /// construction besides the per-variant value setters.
    pub fn set_action_successful(&mut self, status: ActionStatus) {
        let slot = match self {
            Action::Toggle(a) => &mut a.status,
            Action::MultiChoice(a) => &mut a.status,
            Action::Normal(a) => &mut a.status,
            Action::Value(a) => &mut a.status,
            Action::Volume(a) => &mut a.value.status,
            Action::Timed(a) => &mut a.status,
        };
        *slot = status;
    }

    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.set_action_successful(status);
        self
    }

    /// Wire discriminator for this variant.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Action::Toggle(_) => "ToggleAction",
            Action::MultiChoice(_) => "MultiChoiceAction",
            Action::Normal(_) => "NormalAction",
            Action::Value(_) => "ValueAction",
            Action::Volume(_) => "VolumeAction",
            Action::Timed(_) => "TimedAction",
        }
    }
}

impl From<ToggleAction> for Action {
    fn from(a: ToggleAction) -> Self {
        Action::Toggle(a)
    }
}

impl From<MultiChoiceAction> for Action {
    fn from(a: MultiChoiceAction) -> Self {
        Action::MultiChoice(a)
    }
}

impl From<NormalAction> for Action {
    fn from(a: NormalAction) -> Self {
        Action::Normal(a)
    }
}

impl From<ValueAction> for Action {
    fn from(a: ValueAction) -> Self {
        Action::Value(a)
    }
}

impl From<VolumeAction> for Action {
    fn from(a: VolumeAction) -> Self {
        Action::Volume(a)
    }
}

impl From<TimedAction> for Action {
    fn from(a: TimedAction) -> Self {
        Action::Timed(a)
    }
}

// ── Tests ────────────────────────────────────────────────────────
