// ── Serialization codec ──
//
// Actions and structured payloads travel as JSON; status scalars use the
// fixed-width encodings in `primitive`. Decoding never fails loudly: a
// malformed payload is logged and comes back as `None`, which callers treat
// as "no-op, retry on next sync".

pub mod primitive;
pub(crate) mod wire;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::model::{Action, PlatformInfo};

use self::wire::WireAction;

pub use primitive::{
    decode_bool, decode_i32, decode_i64, decode_string, encode_bool, encode_i32, encode_i64,
    encode_string,
};

/// Serialize an action into its discriminated JSON envelope.
pub fn encode_action(action: &Action) -> Option<Bytes> {
    match serde_json::to_vec(&WireAction::from(action)) {
        Ok(buf) => Some(Bytes::from(buf)),
        Err(e) => {
            warn!(error = %e, action_type = %action.action_type(), "failed to encode action");
            None
        }
    }
}

/// Deserialize an action, resolving the variant from its `"type"` field.
///
/// Multi-choice values are re-normalized for the local `platform`.
pub fn decode_action(bytes: &[u8], platform: PlatformInfo) -> Option<Action> {
    let wire: WireAction = match serde_json::from_slice(bytes) {
        Ok(w) => w,
        Err(e) => {
            debug!(error = %e, len = bytes.len(), "failed to parse action payload");
            return None;
        }
    };

    match wire.into_action(platform) {
        Ok(action) => Some(action),
        Err(reason) => {
            debug!(%reason, "rejected action payload");
            None
        }
    }
}

/// Serialize any JSON payload (battery status, app state, app lists, ...).
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Option<Bytes> {
    match serde_json::to_vec(value) {
        Ok(buf) => Some(Bytes::from(buf)),
        Err(e) => {
            warn!(error = %e, "failed to encode JSON payload");
            None
        }
    }
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, len = bytes.len(), "failed to parse JSON payload");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::*;

    const MODERN: PlatformInfo = PlatformInfo::new(34);
    const LEGACY: PlatformInfo = PlatformInfo::new(22);

    fn round_trip(action: &Action, platform: PlatformInfo) -> Action {
        let bytes = encode_action(action).unwrap();
        decode_action(&bytes, platform).unwrap()
    }

    fn sample_actions() -> Vec<Action> {
        vec![
            ToggleAction::new(ActionType::Wifi, false).into(),
            Action::from(ToggleAction::new(ActionType::Nfc, true)).with_status(ActionStatus::Success),
            MultiChoiceAction::new(ActionType::DoNotDisturb, 0, MODERN).into(),
            MultiChoiceAction::new(ActionType::DoNotDisturb, 3, MODERN).into(),
            MultiChoiceAction::new(ActionType::Ringer, -1, MODERN).into(),
            Action::from(NormalAction::new(ActionType::LockScreen))
                .with_status(ActionStatus::RemotePermissionDenied),
            ValueAction::new(ActionType::Brightness, Direction::Down).into(),
            VolumeAction::new(Direction::Up, AudioStreamType::VoiceCall).into(),
            TimedAction::new(
                1_700_000_000_000,
                ToggleAction::new(ActionType::Bluetooth, true).into(),
            )
            .unwrap()
            .into(),
        ]
    }

    #[test]
    fn every_variant_round_trips() {
        for action in sample_actions() {
            assert_eq!(round_trip(&action, MODERN), action);
        }
    }

    #[test]
    fn every_status_round_trips() {
        use strum::IntoEnumIterator;

        for status in ActionStatus::iter() {
            let action = Action::from(ToggleAction::new(ActionType::Torch, true)).with_status(status);
            assert_eq!(round_trip(&action, MODERN), action);
        }
    }

    #[test]
    fn legacy_location_modes_round_trip() {
        for choice in 0..4 {
            let action: Action = MultiChoiceAction::new(ActionType::Location, choice, LEGACY).into();
            assert_eq!(round_trip(&action, LEGACY), action);
        }
    }

    #[test]
    fn envelope_uses_explicit_discriminator() {
        let action = Action::from(MultiChoiceAction::new(ActionType::DoNotDisturb, 2, MODERN))
            .with_status(ActionStatus::Success);
        let value: serde_json::Value =
            serde_json::from_slice(&encode_action(&action).unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "MultiChoiceAction",
                "actionType": "DONOTDISTURB",
                "actionStatus": "SUCCESS",
                "actionSuccessful": true,
                "choice": 2,
            })
        );
    }

    #[test]
    fn decoding_renormalizes_out_of_range_choice() {
        let payload = json!({
            "type": "MultiChoiceAction",
            "actionType": "RINGER",
            "actionStatus": "UNKNOWN",
            "choice": -1,
        });
        let action = decode_action(payload.to_string().as_bytes(), MODERN).unwrap();
        let Action::MultiChoice(ringer) = action else {
            panic!("expected a multi-choice action");
        };
        assert_eq!(ringer.choice(), 2);
    }

    #[test]
    fn successful_flag_is_derived_not_trusted() {
        let payload = json!({
            "type": "ToggleAction",
            "actionType": "WIFI",
            "actionStatus": "FAILURE",
            "actionSuccessful": true,
            "isEnabled": true,
        });
        let action = decode_action(payload.to_string().as_bytes(), MODERN).unwrap();
        assert!(!action.is_action_successful());
    }

    #[test]
    fn malformed_payloads_decode_to_none() {
        assert!(decode_action(b"", MODERN).is_none());
        assert!(decode_action(b"{\"type\":\"ToggleAction\"", MODERN).is_none());
        assert!(decode_action(br#"{"type":"LaserAction","actionType":"WIFI"}"#, MODERN).is_none());
        assert!(decode_action(br#"{"type":"ToggleAction","actionType":"TELEPORT","isEnabled":true}"#, MODERN).is_none());
        assert!(decode_action(br#"{"isEnabled":true,"actionType":"WIFI"}"#, MODERN).is_none());
    }

    #[test]
    fn timed_action_with_unsupported_target_is_rejected() {
        let payload = json!({
            "type": "TimedAction",
            "actionType": "TIMEDACTION",
            "timeInMillis": 5,
            "action": { "type": "NormalAction", "actionType": "LOCKSCREEN" },
        });
        assert!(decode_action(payload.to_string().as_bytes(), MODERN).is_none());
    }

    #[test]
    fn json_helpers_handle_value_objects() {
        let battery = BatteryStatus::new(81, true);
        let bytes = encode_json(&battery).unwrap();
        assert_eq!(&bytes[..], br#"{"batteryLevel":81,"isCharging":true}"#);
        assert_eq!(decode_json::<BatteryStatus>(&bytes), Some(battery));

        let status = encode_json(&ActionStatus::RemoteFailure).unwrap();
        assert_eq!(&status[..], br#""REMOTE_FAILURE""#);

        assert_eq!(decode_json::<AppState>(b"\"SIDEWAYS\""), None);
    }
}
