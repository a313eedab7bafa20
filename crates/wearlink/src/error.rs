//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use wearlink_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const DECODE: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wearlink::validation))]
    Validation { field: String, reason: String },

    // ── Payloads ─────────────────────────────────────────────────────

    #[error("Cannot decode payload on {path}: {reason}")]
    #[diagnostic(
        code(wearlink::decode),
        help("Pass the raw payload bytes as hex, e.g. 7b7d for {{}}.")
    )]
    Decode { path: String, reason: String },

    #[error("No route handles {path}")]
    #[diagnostic(
        code(wearlink::unrouted),
        help("Known roots: /status, /actions, /app-state, /ping, /version, /music, /apps, /sleeptimer, /start-activity, /bt-discover")
    )]
    Unrouted { path: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found")]
    #[diagnostic(
        code(wearlink::no_config),
        help(
            "Create one with: wearlink config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{path} already exists")]
    #[diagnostic(code(wearlink::conflict), help("Use --force to overwrite it."))]
    AlreadyExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(wearlink::config))]
    Config(#[from] ConfigError),

    // ── Simulation ───────────────────────────────────────────────────

    #[error("Watch did not receive the full state within {seconds}s ({cached} of {expected} actions)")]
    #[diagnostic(
        code(wearlink::timeout),
        help("Raise defaults.status_wait_ms in the config file.")
    )]
    SyncTimeout {
        seconds: u64,
        cached: usize,
        expected: usize,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render config: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Decode { .. } | Self::Unrouted { .. } => exit_code::DECODE,
            Self::AlreadyExists { .. } => exit_code::CONFLICT,
            Self::SyncTimeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}
