//! In-process phone/watch simulation over the loopback hub.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use wearlink_config::{Config, Profile, profile_to_companion_config};
use wearlink_core::config::{PHONE_CAPABILITY, WATCH_CAPABILITY};
use wearlink_core::model::DndChoice;
use wearlink_core::stub::{LoopbackHub, SimulatedDevice, SimulatedState};
use wearlink_core::{
    Action, ActionExecutor, ActionStatus, ActionType, CompanionConfig, EscalationChain,
    MultiChoiceAction, PhoneController, PlatformInfo, PrivilegedHelper, Role, ToggleAction,
    WatchController,
};

use crate::cli::{DndArg, GlobalOpts, SimulateArgs};
use crate::commands::config_cmd;
use crate::error::CliError;
use crate::output;

const WATCH_NODE: &str = "watch-sim";

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CachedAction {
    action_type: ActionType,
    shape: &'static str,
    value: String,
    status: ActionStatus,
}

#[derive(Tabled)]
struct CachedRow {
    #[tabled(rename = "Type")]
    action_type: String,
    #[tabled(rename = "Shape")]
    shape: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Short human rendering of an action's value.
fn describe(action: &Action) -> String {
    match action {
        Action::Toggle(a) => String::from(if a.enabled() { "on" } else { "off" }),
        Action::MultiChoice(a) => match a.action_type() {
            ActionType::DoNotDisturb => DndChoice::from_choice(a.choice()).to_string(),
            _ => format!("{} of {}", a.choice(), a.number_of_states()),
        },
        Action::Value(a) => a.direction().to_string(),
        Action::Volume(a) => format!("{} {}", a.stream_type(), a.direction()),
        Action::Normal(_) => "-".into(),
        Action::Timed(a) => format!("{} at {}ms", a.action().action_type(), a.time_in_millis()),
    }
}

// ── Setup ───────────────────────────────────────────────────────────

/// Phone profile: the named one, else the first phone profile, else built-in.
fn phone_profile(cfg: &Config, name: Option<&str>) -> Result<(String, Profile), CliError> {
    if let Some(name) = name {
        let (name, profile) = cfg.profile(Some(name))?;
        if profile.role != Role::Phone {
            return Err(CliError::Validation {
                field: "profile".into(),
                reason: format!("{name} is not a phone profile"),
            });
        }
        return Ok((name.to_owned(), profile.clone()));
    }

    let first_phone = cfg
        .profiles
        .iter()
        .filter(|(_, p)| p.role == Role::Phone)
        .min_by(|a, b| a.0.cmp(b.0));
    Ok(match first_phone {
        Some((name, profile)) => (name.clone(), profile.clone()),
        None => ("phone".to_owned(), Profile::new(Role::Phone)),
    })
}

fn simulated_state(args: &SimulateArgs) -> Result<SimulatedState, CliError> {
    let mut state = SimulatedState::default();
    for raw in &args.deny {
        let action_type = ActionType::from_str(raw).map_err(|_| CliError::Validation {
            field: "deny".into(),
            reason: format!("unknown action type {raw}"),
        })?;
        state.denied.insert(action_type);
    }
    state.broker_running = args.broker;
    state.secure_settings_granted = args.secure_settings;
    state.root = args.root;
    Ok(state)
}

fn dnd_request(arg: DndArg, platform: PlatformInfo) -> Action {
    let choice = match arg {
        DndArg::Off => DndChoice::Off,
        DndArg::Priority => DndChoice::Priority,
        DndArg::Alarms => DndChoice::Alarms,
        DndArg::Silence => DndChoice::Silence,
    };
    if platform.has_dnd_policy() {
        MultiChoiceAction::new(ActionType::DoNotDisturb, choice.choice(), platform).into()
    } else {
        ToggleAction::new(ActionType::DoNotDisturb, choice != DndChoice::Off).into()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config_cmd::load(global)?;
    let (profile_name, profile) = phone_profile(&cfg, global.profile.as_deref())?;

    let mut phone_config = profile_to_companion_config(&profile, &profile_name, &cfg.defaults)?;
    phone_config.cache_dir = None;
    if let Some(level) = args.platform_level {
        phone_config.platform = PlatformInfo::new(level);
    }
    if args.root {
        phone_config.root_enabled = true;
    }
    let platform = phone_config.platform;

    let mut watch_config = CompanionConfig::for_role(Role::Watch, WATCH_NODE);
    watch_config.platform = platform;
    watch_config.discovery_timeout = phone_config.discovery_timeout;
    watch_config.status_wait = phone_config.status_wait;
    watch_config.action_wait = phone_config.action_wait;

    let device = Arc::new(SimulatedDevice::with_state(platform, simulated_state(&args)?));
    let chain = EscalationChain::standard(
        device.clone(),
        device.clone(),
        device.clone(),
        device.clone(),
        &phone_config,
    );

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let executor: Arc<dyn ActionExecutor> = if phone_config.use_helper {
        Arc::new(PrivilegedHelper::spawn(
            Arc::new(chain),
            platform,
            phone_config.action_wait,
            cancel.clone(),
            &tracker,
        ))
    } else {
        Arc::new(chain)
    };

    info!(profile = %profile_name, node = %phone_config.node_id, platform_level = platform.level, "starting simulation");
    let hub = LoopbackHub::new();
    let (phone_transport, phone_rx) = hub.connect(phone_config.node_id.clone(), &[PHONE_CAPABILITY]);
    let (watch_transport, watch_rx) = hub.connect(WATCH_NODE, &[WATCH_CAPABILITY]);
    let status_wait = watch_config.status_wait;
    let phone = PhoneController::new(phone_config, phone_transport, device, executor);
    let watch = WatchController::new(watch_config, watch_transport);

    phone.start(phone_rx).await;
    watch.start(watch_rx).await;

    let result = drive(&args, global, &watch, platform).await;

    watch.shutdown().await;
    phone.shutdown().await;
    cancel.cancel();
    tracker.close();
    tracker.wait().await;

    result.map_err(|(cached, expected)| CliError::SyncTimeout {
        seconds: status_wait.as_secs(),
        cached,
        expected,
    })
}

/// Sync, run the requested actions and print the watch cache. Errors carry
/// the cached and expected action counts of an incomplete sync.
async fn drive(
    args: &SimulateArgs,
    global: &GlobalOpts,
    watch: &WatchController,
    platform: PlatformInfo,
) -> Result<(), (usize, usize)> {
    let expected = ActionType::sync_catalog().count();
    let cached = watch.connect().await;
    if cached < expected {
        return Err((cached, expected));
    }

    let color = output::should_color(&global.color);
    let mut requests: Vec<Action> = Vec::new();
    if args.wifi_off {
        requests.push(ToggleAction::new(ActionType::Wifi, false).into());
    }
    if let Some(dnd) = args.dnd {
        requests.push(dnd_request(dnd, platform));
    }
    for request in requests {
        let result = watch.request_action(request).await;
        if !global.quiet {
            eprintln!(
                "{} -> {}",
                result.action_type(),
                output::paint_status(result.status(), color)
            );
        }
    }

    let snapshot = watch.dashboard().actions_snapshot();
    let data: Vec<CachedAction> = snapshot
        .iter()
        .map(|action| CachedAction {
            action_type: action.action_type(),
            shape: action.variant_name(),
            value: describe(action),
            status: action.status(),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &data,
        |a| CachedRow {
            action_type: a.action_type.to_string(),
            shape: a.shape,
            value: a.value.clone(),
            status: output::paint_status(a.status, color),
        },
        |a| format!("{}={}", a.action_type, a.value),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
