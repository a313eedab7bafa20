// ── Device state value objects ──
//
// Snapshots reported by the phone and typed views over multi-choice
// action values.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

// ── Adjustment ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Direction {
    Up,
    Down,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AudioStreamType {
    Music,
    Ringtone,
    VoiceCall,
    Alarm,
}

// ── Battery ──────────────────────────────────────────────────────

/// Battery snapshot. Structurally compared so repeated identical reports
/// collapse to no-ops in the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawBatteryStatus")]
pub struct BatteryStatus {
    pub battery_level: u8,
    pub is_charging: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBatteryStatus {
    battery_level: u8,
    is_charging: bool,
}

impl From<RawBatteryStatus> for BatteryStatus {
    fn from(raw: RawBatteryStatus) -> Self {
        Self::new(raw.battery_level, raw.is_charging)
    }
}

impl BatteryStatus {
    /// Level is clamped to 100.
    pub fn new(battery_level: u8, is_charging: bool) -> Self {
        Self {
            battery_level: battery_level.min(100),
            is_charging,
        }
    }
}

// ── Wi-Fi radio ──────────────────────────────────────────────────

/// Wi-Fi radio state, carried on the wire as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WifiState {
    Disabling,
    Disabled,
    Enabling,
    Enabled,
    Unknown,
}

impl WifiState {
    pub fn code(self) -> i32 {
        match self {
            WifiState::Disabling => 0,
            WifiState::Disabled => 1,
            WifiState::Enabling => 2,
            WifiState::Enabled => 3,
            WifiState::Unknown => 4,
        }
    }

    /// Unrecognized codes map to [`WifiState::Unknown`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => WifiState::Disabling,
            1 => WifiState::Disabled,
            2 => WifiState::Enabling,
            3 => WifiState::Enabled,
            _ => WifiState::Unknown,
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, WifiState::Enabled | WifiState::Enabling)
    }
}

// ── App lifecycle ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Foreground,
    Background,
    #[default]
    Closed,
}

// ── Multi-choice views ───────────────────────────────────────────

/// Do-not-disturb policy, in multi-choice order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DndChoice {
    Off,
    Priority,
    Alarms,
    Silence,
}

impl DndChoice {
    pub fn choice(self) -> i32 {
        match self {
            DndChoice::Off => 0,
            DndChoice::Priority => 1,
            DndChoice::Alarms => 2,
            DndChoice::Silence => 3,
        }
    }

    pub fn from_choice(choice: i32) -> Self {
        match choice.rem_euclid(4) {
            1 => DndChoice::Priority,
            2 => DndChoice::Alarms,
            3 => DndChoice::Silence,
            _ => DndChoice::Off,
        }
    }

    /// Value of the global `zen_mode` setting.
    pub fn zen_mode(self) -> i32 {
        match self {
            DndChoice::Off => 0,
            DndChoice::Priority => 1,
            DndChoice::Silence => 2,
            DndChoice::Alarms => 3,
        }
    }

    /// Argument for `cmd notification set_dnd`.
    pub fn shell_arg(self) -> &'static str {
        match self {
            DndChoice::Off => "off",
            DndChoice::Priority => "priority",
            DndChoice::Alarms => "alarms",
            DndChoice::Silence => "none",
        }
    }
}

/// Ringer mode, in multi-choice order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RingerChoice {
    Vibration,
    Sound,
    Silent,
}

impl RingerChoice {
    pub fn choice(self) -> i32 {
        match self {
            RingerChoice::Vibration => 0,
            RingerChoice::Sound => 1,
            RingerChoice::Silent => 2,
        }
    }

    pub fn from_choice(choice: i32) -> Self {
        match choice.rem_euclid(3) {
            1 => RingerChoice::Sound,
            2 => RingerChoice::Silent,
            _ => RingerChoice::Vibration,
        }
    }
}

/// Location mode on platforms that still have four of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationState {
    Off,
    SensorsOnly,
    BatterySaving,
    HighAccuracy,
}

impl LocationState {
    /// Multi-choice index, which is also the secure `location_mode` value.
    pub fn choice(self) -> i32 {
        match self {
            LocationState::Off => 0,
            LocationState::SensorsOnly => 1,
            LocationState::BatterySaving => 2,
            LocationState::HighAccuracy => 3,
        }
    }

    pub fn from_choice(choice: i32) -> Self {
        match choice.rem_euclid(4) {
            1 => LocationState::SensorsOnly,
            2 => LocationState::BatterySaving,
            3 => LocationState::HighAccuracy,
            _ => LocationState::Off,
        }
    }
}

// ── Sleep timer ──────────────────────────────────────────────────

/// Progress of a running sleep timer, `startMs;elapsedMs` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SleepTimerStatus {
    pub start_ms: i64,
    pub elapsed_ms: i64,
}

impl SleepTimerStatus {
    pub fn to_wire(self) -> String {
        format!("{};{}", self.start_ms, self.elapsed_ms)
    }

    /// Negative fields are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (start, elapsed) = s.trim().split_once(';')?;
        let status = Self {
            start_ms: start.parse().ok()?,
            elapsed_ms: elapsed.parse().ok()?,
        };
        (status.start_ms >= 0 && status.elapsed_ms >= 0).then_some(status)
    }

    pub fn remaining_ms(self) -> i64 {
        self.start_ms.saturating_sub(self.elapsed_ms).max(0)
    }

    /// A zero duration is how the phone reports "no timer".
    pub fn is_running(self) -> bool {
        self.start_ms > 0 && self.remaining_ms() > 0
    }
}
