//! Clap derive structures for the `wearlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wearlink -- inspect and simulate the phone/watch companion protocol
#[derive(Debug, Parser)]
#[command(
    name = "wearlink",
    version,
    about = "Inspect and simulate the phone/watch companion protocol",
    long_about = "Tools for the wearlink companion protocol: the action catalog and\n\
        escalation plans, an in-process phone/watch simulation, and a decoder\n\
        for captured wire payloads.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "WEARLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Profile to use
    #[arg(long, short = 'p', env = "WEARLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List action types with their default shapes and escalation plans
    #[command(alias = "ls")]
    Catalog(CatalogArgs),

    /// Run a phone and a watch session in-process and sync them
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Decode a hex-encoded wire payload
    Decode(DecodeArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Platform level used to pick DND and location shapes
    #[arg(long, default_value_t = wearlink_core::PlatformInfo::DEFAULT_LEVEL)]
    pub platform_level: u32,

    /// Only types exchanged in full-state dumps
    #[arg(long)]
    pub synced: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DndArg {
    Off,
    Priority,
    Alarms,
    Silence,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Turn Wi-Fi off from the watch after connecting
    #[arg(long)]
    pub wifi_off: bool,

    /// Request a do-not-disturb mode from the watch
    #[arg(long, value_enum)]
    pub dnd: Option<DndArg>,

    /// Refuse the normal-permission control for an action type (repeatable)
    #[arg(long, value_name = "TYPE")]
    pub deny: Vec<String>,

    /// Simulate a running privileged broker
    #[arg(long)]
    pub broker: bool,

    /// Grant secure-settings writes
    #[arg(long)]
    pub secure_settings: bool,

    /// Simulate a rooted phone
    #[arg(long)]
    pub root: bool,

    /// Phone platform level
    #[arg(long)]
    pub platform_level: Option<u32>,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Message path the payload was sent on
    #[arg(long)]
    pub path: String,

    /// Payload bytes as hex (empty for requests)
    #[arg(default_value = "")]
    pub hex: String,

    /// Platform level used to decode multi-choice actions
    #[arg(long, default_value_t = wearlink_core::PlatformInfo::DEFAULT_LEVEL)]
    pub platform_level: u32,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration
    Show,

    /// Write a starter config with a phone and a watch profile
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
