use serde::Serialize;
use serde_json::Value;
use strum::Display;

use wearlink_core::PlatformInfo;
use wearlink_core::codec::{decode_action, decode_bool, decode_i32, decode_json, decode_string, encode_action};
use wearlink_core::router::Route;
use wearlink_core::router::routes::{
    BATTERY_STATUS_PATH, BLUETOOTH_STATUS_PATH, BT_DISCOVER_PATH, SLEEP_TIMER_ENABLED_PATH,
    SLEEP_TIMER_START_PATH, SLEEP_TIMER_STATUS_PATH, VERSION_PATH, WIFI_STATUS_PATH,
};

use crate::cli::{DecodeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Shape of a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
enum PayloadKind {
    /// Empty payload: a request for the current value.
    Request,
    Action,
    I32,
    Bool,
    String,
    Json,
    Bytes,
}

#[derive(Debug, Serialize)]
struct Decoded {
    path: String,
    route: String,
    kind: PayloadKind,
    value: Value,
}

/// Payload shape carried on `path` for a non-empty payload.
fn kind_for(route: Route, path: &str) -> PayloadKind {
    match (route, path) {
        (Route::Actions, _) => PayloadKind::Action,
        (_, WIFI_STATUS_PATH | VERSION_PATH | SLEEP_TIMER_START_PATH) => PayloadKind::I32,
        (_, BLUETOOTH_STATUS_PATH | SLEEP_TIMER_ENABLED_PATH) => PayloadKind::Bool,
        (_, BT_DISCOVER_PATH | SLEEP_TIMER_STATUS_PATH) => PayloadKind::String,
        (_, BATTERY_STATUS_PATH) | (Route::AppState | Route::Music | Route::Apps, _) => PayloadKind::Json,
        _ => PayloadKind::Bytes,
    }
}

fn decode_payload(
    route: Route,
    path: &str,
    bytes: &[u8],
    platform: PlatformInfo,
) -> Result<(PayloadKind, Value), String> {
    if bytes.is_empty() {
        return Ok((PayloadKind::Request, Value::Null));
    }
    let kind = kind_for(route, path);
    let value = match kind {
        PayloadKind::Action => {
            let action = decode_action(bytes, platform).ok_or("not a valid action envelope")?;
            let canonical = encode_action(&action).ok_or("action could not be re-encoded")?;
            serde_json::from_slice(&canonical).map_err(|e| e.to_string())?
        }
        PayloadKind::I32 => Value::from(decode_i32(bytes).ok_or("expected a 4-byte big-endian integer")?),
        PayloadKind::Bool => Value::from(decode_bool(bytes).ok_or("expected a single 0/1 byte")?),
        PayloadKind::String => Value::from(decode_string(bytes).ok_or("expected UTF-8 text")?),
        PayloadKind::Json => decode_json::<Value>(bytes).ok_or("expected JSON")?,
        PayloadKind::Bytes | PayloadKind::Request => Value::from(hex::encode(bytes)),
    };
    Ok((kind, value))
}

fn detail(d: &Decoded) -> String {
    let value = match &d.value {
        Value::Null => "-".to_owned(),
        other => output::render_json(other, false),
    };
    format!(
        "Path:   {}\nRoute:  {}\nKind:   {}\nValue:  {value}",
        d.path, d.route, d.kind
    )
}

pub fn handle(args: &DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let route = Route::resolve(&args.path).ok_or_else(|| CliError::Unrouted {
        path: args.path.clone(),
    })?;
    let bytes = hex::decode(args.hex.trim()).map_err(|e| CliError::Validation {
        field: "hex".into(),
        reason: e.to_string(),
    })?;

    let platform = PlatformInfo::new(args.platform_level);
    let (kind, value) =
        decode_payload(route, &args.path, &bytes, platform).map_err(|reason| CliError::Decode {
            path: args.path.clone(),
            reason,
        })?;

    let decoded = Decoded {
        path: args.path.clone(),
        route: route.to_string(),
        kind,
        value,
    };
    let out = output::render_single(&global.output, &decoded, detail, |d| d.value.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wearlink_core::codec::{encode_bool, encode_i32};
    use wearlink_core::{ActionType, ToggleAction};

    #[test]
    fn status_scalars_decode_by_path() {
        let platform = PlatformInfo::default();
        let (kind, value) =
            decode_payload(Route::Status, WIFI_STATUS_PATH, &encode_i32(3), platform).unwrap();
        assert_eq!(kind, PayloadKind::I32);
        assert_eq!(value, Value::from(3));

        let (kind, value) =
            decode_payload(Route::Status, BLUETOOTH_STATUS_PATH, &encode_bool(true), platform).unwrap();
        assert_eq!(kind, PayloadKind::Bool);
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn action_payload_is_canonicalized() {
        let bytes = encode_action(&ToggleAction::new(ActionType::Wifi, false).into()).unwrap();
        let (kind, value) =
            decode_payload(Route::Actions, "/actions", &bytes, PlatformInfo::default()).unwrap();
        assert_eq!(kind, PayloadKind::Action);
        assert_eq!(value["type"], "ToggleAction");
        assert_eq!(value["actionType"], "WIFI");
    }

    #[test]
    fn empty_payload_is_a_request() {
        let (kind, value) =
            decode_payload(Route::Status, "/status", &[], PlatformInfo::default()).unwrap();
        assert_eq!(kind, PayloadKind::Request);
        assert!(value.is_null());
    }

    #[test]
    fn unknown_paths_fall_back_to_hex() {
        let (kind, value) =
            decode_payload(Route::Ping, "/ping", &[0xab, 0x01], PlatformInfo::default()).unwrap();
        assert_eq!(kind, PayloadKind::Bytes);
        assert_eq!(value, Value::from("ab01"));
        assert_eq!(kind.to_string(), "bytes");
        assert_eq!(serde_json::to_value(PayloadKind::I32).unwrap(), Value::from("i32"));
    }

    #[test]
    fn garbage_action_is_rejected() {
        let err = decode_payload(Route::Actions, "/actions", b"{\"type\":1}", PlatformInfo::default());
        assert!(err.is_err());
    }
}
