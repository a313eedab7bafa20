// ── Wire representation of actions ──
//
// JSON envelope with an explicit `"type"` discriminator. Older peers read
// `actionSuccessful`, so it is written even though it is derived.

use serde::{Deserialize, Serialize};

use crate::model::{
    Action, ActionStatus, ActionType, AudioStreamType, Direction, MultiChoiceAction,
    NormalAction, PlatformInfo, TimedAction, ToggleAction, ValueAction, VolumeAction,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub(crate) enum WireAction {
    ToggleAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
        is_enabled: bool,
    },
    MultiChoiceAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
        choice: i32,
    },
    NormalAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
    },
    ValueAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
        direction: Direction,
    },
    VolumeAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
        direction: Direction,
        stream_type: AudioStreamType,
    },
    TimedAction {
        action_type: ActionType,
        #[serde(default)]
        action_status: ActionStatus,
        #[serde(default)]
        action_successful: bool,
        time_in_millis: i64,
        action: Box<WireAction>,
    },
}

impl From<&Action> for WireAction {
    fn from(action: &Action) -> Self {
        let action_type = action.action_type();
        let action_status = action.status();
        let action_successful = action.is_action_successful();

        match action {
            Action::Toggle(a) => WireAction::ToggleAction {
                action_type,
                action_status,
                action_successful,
                is_enabled: a.enabled(),
            },
            Action::MultiChoice(a) => WireAction::MultiChoiceAction {
                action_type,
                action_status,
                action_successful,
                choice: a.choice(),
            },
            Action::Normal(_) => WireAction::NormalAction {
                action_type,
                action_status,
                action_successful,
            },
            Action::Value(a) => WireAction::ValueAction {
                action_type,
                action_status,
                action_successful,
                direction: a.direction(),
            },
            Action::Volume(a) => WireAction::VolumeAction {
                action_type,
                action_status,
                action_successful,
                direction: a.direction(),
                stream_type: a.stream_type(),
            },
            Action::Timed(a) => WireAction::TimedAction {
                action_type,
                action_status,
                action_successful,
                time_in_millis: a.time_in_millis(),
                action: Box::new(WireAction::from(a.action())),
            },
        }
    }
}

impl WireAction {
    /// Convert to the domain type, normalizing choices for `platform`.
    pub(crate) fn into_action(self, platform: PlatformInfo) -> Result<Action, String> {
        let (action, status): (Action, ActionStatus) = match self {
            WireAction::ToggleAction {
                action_type,
                action_status,
                is_enabled,
                ..
            } => (ToggleAction::new(action_type, is_enabled).into(), action_status),
            WireAction::MultiChoiceAction {
                action_type,
                action_status,
                choice,
                ..
            } => (
                MultiChoiceAction::new(action_type, choice, platform).into(),
                action_status,
            ),
            WireAction::NormalAction {
                action_type,
                action_status,
                ..
            } => (NormalAction::new(action_type).into(), action_status),
            WireAction::ValueAction {
                action_type,
                action_status,
                direction,
                ..
            } => (ValueAction::new(action_type, direction).into(), action_status),
            WireAction::VolumeAction {
                action_type,
                action_status,
                direction,
                stream_type,
                ..
            } => {
                if action_type != ActionType::Volume {
                    return Err(format!("VolumeAction carries action type {action_type}"));
                }
                (VolumeAction::new(direction, stream_type).into(), action_status)
            }
            WireAction::TimedAction {
                action_status,
                time_in_millis,
                action,
                ..
            } => {
                let target = action.into_action(platform)?;
                let timed = TimedAction::new(time_in_millis, target).map_err(|e| e.to_string())?;
                (timed.into(), action_status)
            }
        };

        Ok(Action::with_status(action, status))
    }
}
