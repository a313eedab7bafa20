//! Shared configuration for wearlink tools.
//!
//! TOML profiles (one per simulated or real device), global defaults for
//! timeouts and privilege switches, and translation to
//! `wearlink_core::CompanionConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wearlink_core::{CompanionConfig, PlatformInfo, Role};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("watch".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::Validation {
                field: "default_profile".into(),
                reason: "no profile named and no default set".into(),
            })?;
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_wait_ms")]
    pub discovery_timeout_ms: u64,

    #[serde(default = "default_wait_ms")]
    pub status_wait_ms: u64,

    #[serde(default = "default_wait_ms")]
    pub action_wait_ms: u64,

    /// Use the privileged broker when it is running.
    #[serde(default = "default_true")]
    pub broker: bool,

    /// Escalate to a root shell as a last resort.
    #[serde(default)]
    pub root: bool,

    /// Run actions through the privileged helper.
    #[serde(default)]
    pub helper: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_wait_ms(),
            status_wait_ms: default_wait_ms(),
            action_wait_ms: default_wait_ms(),
            broker: true,
            root: false,
            helper: false,
        }
    }
}

fn default_wait_ms() -> u64 {
    5_000
}
fn default_true() -> bool {
    true
}

/// One side of a companion pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    pub role: Role,

    /// Transport node id. Defaults to the profile name.
    pub node_id: Option<String>,

    /// OS platform level; decides DND and location shapes.
    pub platform_level: Option<u32>,

    /// Where the watch keeps its caches. Relative paths resolve against
    /// the platform cache directory.
    pub cache_dir: Option<PathBuf>,

    pub broker: Option<bool>,
    pub root: Option<bool>,
    pub helper: Option<bool>,
    pub action_wait_ms: Option<u64>,
}

impl Profile {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            node_id: None,
            platform_level: None,
            cache_dir: None,
            broker: None,
            root: None,
            helper: None,
            action_wait_ms: None,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "wearlink", "wearlink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Base directory for watch caches.
pub fn cache_root() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wearlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(base: Figment) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(base)
        .merge(Env::prefixed("WEARLINK_").split("__"))
}

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(Figment::from(Toml::file(path))).extract()?;
    Ok(config)
}

/// Parse a TOML document (no environment overlay).
pub fn parse_config(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml_str))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// A starter config with one phone and one watch profile.
pub fn example_config() -> Config {
    let mut phone = Profile::new(Role::Phone);
    phone.node_id = Some("phone-1".into());
    let mut watch = Profile::new(Role::Watch);
    watch.node_id = Some("watch-1".into());
    watch.cache_dir = Some(PathBuf::from("watch-1"));

    Config {
        default_profile: Some("watch".into()),
        defaults: Defaults::default(),
        profiles: HashMap::from([("phone".into(), phone), ("watch".into(), watch)]),
    }
}

// ── Translation ─────────────────────────────────────────────────────

fn duration_ms(field: &str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

/// Build a `CompanionConfig` from a profile and the global defaults.
pub fn profile_to_companion_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CompanionConfig, ConfigError> {
    let node_id = profile.node_id.as_deref().unwrap_or(profile_name);
    if node_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "node_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = CompanionConfig::for_role(profile.role, node_id);
    if let Some(level) = profile.platform_level {
        config.platform = PlatformInfo::new(level);
    }
    config.discovery_timeout = duration_ms("discovery_timeout_ms", defaults.discovery_timeout_ms)?;
    config.status_wait = duration_ms("status_wait_ms", defaults.status_wait_ms)?;
    config.action_wait = duration_ms(
        "action_wait_ms",
        profile.action_wait_ms.unwrap_or(defaults.action_wait_ms),
    )?;
    config.broker_enabled = profile.broker.unwrap_or(defaults.broker);
    config.root_enabled = profile.root.unwrap_or(defaults.root);
    config.use_helper = profile.helper.unwrap_or(defaults.helper);
    config.cache_dir = profile.cache_dir.as_ref().map(|dir| {
        if dir.is_absolute() {
            dir.clone()
        } else {
            cache_root().join(dir)
        }
    });
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_profile = "wrist"

[defaults]
action_wait_ms = 2500
root = true

[profiles.wrist]
role = "watch"
node_id = "w-42"
cache_dir = "/tmp/wearlink-test"

[profiles.pocket]
role = "phone"
platform_level = 26
root = false
action_wait_ms = 900
"#;

    #[test]
    fn parses_profiles_and_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("wrist"));
        assert_eq!(cfg.defaults.action_wait_ms, 2500);
        assert_eq!(cfg.defaults.status_wait_ms, 5000);
        assert!(cfg.defaults.broker);
        assert_eq!(cfg.profiles.len(), 2);
    }

    #[test]
    fn default_profile_translates_with_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "wrist");

        let companion = profile_to_companion_config(profile, name, &cfg.defaults).unwrap();
        assert_eq!(companion.role, Role::Watch);
        assert_eq!(companion.node_id.as_str(), "w-42");
        assert_eq!(companion.action_wait, Duration::from_millis(2500));
        assert!(companion.root_enabled);
        assert_eq!(companion.cache_dir, Some(PathBuf::from("/tmp/wearlink-test")));
        assert_eq!(companion.peer_capability, wearlink_core::config::PHONE_CAPABILITY);
    }

    #[test]
    fn profile_overrides_win() {
        let cfg = parse_config(SAMPLE).unwrap();
        let (name, profile) = cfg.profile(Some("pocket")).unwrap();

        let companion = profile_to_companion_config(profile, name, &cfg.defaults).unwrap();
        assert_eq!(companion.node_id.as_str(), "pocket");
        assert_eq!(companion.platform, PlatformInfo::new(26));
        assert!(!companion.root_enabled);
        assert_eq!(companion.action_wait, Duration::from_millis(900));
        assert_eq!(companion.cache_dir, None);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = parse_config(SAMPLE).unwrap();
        let err = cfg.profile(Some("desk")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { .. }));
    }

    #[test]
    fn zero_wait_is_rejected() {
        let cfg = parse_config("[defaults]\nstatus_wait_ms = 0\n").unwrap();
        let profile = Profile::new(Role::Watch);
        let err = profile_to_companion_config(&profile, "w", &cfg.defaults).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "status_wait_ms"));
    }

    #[test]
    fn bad_role_fails_to_parse() {
        let err = parse_config("[profiles.x]\nrole = \"tablet\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
    }

    #[test]
    fn saved_example_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        save_config_to(&example_config(), &path).unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (_, watch) = cfg.profile(Some("watch")).unwrap();
        assert_eq!(watch.role, Role::Watch);
        assert_eq!(watch.node_id.as_deref(), Some("watch-1"));
        assert!(cfg.profiles.contains_key("phone"));
    }
}
