// ── Route table ──
//
// Paths are coarse RPC selectors. Each route declares whether it matches a
// whole family of sub-paths (prefix) or a single command (exact).

use strum::{Display, EnumIter, IntoEnumIterator};

// ── Paths ────────────────────────────────────────────────────────────

pub const STATUS_PATH: &str = "/status";
pub const WIFI_STATUS_PATH: &str = "/status/wifi";
pub const BATTERY_STATUS_PATH: &str = "/status/battery";
pub const BLUETOOTH_STATUS_PATH: &str = "/status/bluetooth";

pub const ACTIONS_PATH: &str = "/actions";

pub const APP_STATE_PATH: &str = "/app-state";
pub const PING_PATH: &str = "/ping";
pub const VERSION_PATH: &str = "/version";
pub const START_ACTIVITY_PATH: &str = "/start-activity";
pub const BT_DISCOVER_PATH: &str = "/bt-discover";

pub const MUSIC_PLAYERS_PATH: &str = "/music/players";
pub const OPEN_MUSIC_PLAYER_PATH: &str = "/music/open";
pub const PLAY_COMMAND_PATH: &str = "/music/play";

pub const APPS_PATH: &str = "/apps";
pub const LAUNCH_APP_PATH: &str = "/apps/launch";

pub const SLEEP_TIMER_ENABLED_PATH: &str = "/sleeptimer/enabled";
pub const SLEEP_TIMER_START_PATH: &str = "/sleeptimer/start";
pub const SLEEP_TIMER_STOP_PATH: &str = "/sleeptimer/stop";
pub const SLEEP_TIMER_STATUS_PATH: &str = "/sleeptimer/status";

/// Wire protocol revision reported on [`VERSION_PATH`].
pub const PROTOCOL_VERSION: i32 = 1;

// ── Routes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Route {
    Status,
    Actions,
    Music,
    Apps,
    SleepTimer,
    AppState,
    Ping,
    Version,
    StartActivity,
    BtDiscover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    /// Matches the root itself and anything below `root/`.
    Prefix,
}

impl Route {
    pub fn root(self) -> &'static str {
        match self {
            Route::Status => STATUS_PATH,
            Route::Actions => ACTIONS_PATH,
            Route::Music => "/music",
            Route::Apps => APPS_PATH,
            Route::SleepTimer => "/sleeptimer",
            Route::AppState => APP_STATE_PATH,
            Route::Ping => PING_PATH,
            Route::Version => VERSION_PATH,
            Route::StartActivity => START_ACTIVITY_PATH,
            Route::BtDiscover => BT_DISCOVER_PATH,
        }
    }

    pub fn match_kind(self) -> MatchKind {
        match self {
            Route::Status | Route::Actions | Route::Music | Route::Apps | Route::SleepTimer => {
                MatchKind::Prefix
            }
            Route::AppState
            | Route::Ping
            | Route::Version
            | Route::StartActivity
            | Route::BtDiscover => MatchKind::Exact,
        }
    }

    /// Resolve a path to its route. `None` for paths no route claims, which
    /// keeps older peers tolerant of paths introduced by newer ones.
    pub fn resolve(path: &str) -> Option<Route> {
        Route::iter().find(|route| route.matches(path))
    }

    fn matches(self, path: &str) -> bool {
        let root = self.root();
        match self.match_kind() {
            MatchKind::Exact => path == root,
            MatchKind::Prefix => path
                .strip_prefix(root)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}
