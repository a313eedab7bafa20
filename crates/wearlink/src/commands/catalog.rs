use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use wearlink_core::exec::{Tier, plan};
use wearlink_core::{Action, ActionType, PlatformInfo};

use crate::cli::{CatalogArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    action_type: ActionType,
    shape: &'static str,
    states: Option<u32>,
    synced: bool,
    timed_target: bool,
    plan: &'static [Tier],
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Type")]
    action_type: String,
    #[tabled(rename = "Shape")]
    shape: &'static str,
    #[tabled(rename = "States")]
    states: String,
    #[tabled(rename = "Synced")]
    synced: &'static str,
    #[tabled(rename = "Timed")]
    timed: &'static str,
    #[tabled(rename = "Escalation")]
    plan: String,
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "-" }
}

fn entries(platform: PlatformInfo, synced_only: bool) -> Vec<CatalogEntry> {
    let synced: Vec<ActionType> = ActionType::sync_catalog().collect();
    ActionType::iter()
        .filter(|t| !synced_only || synced.contains(t))
        .map(|action_type| {
            let shape = Action::default_for(action_type, platform);
            let states = match &shape {
                Action::MultiChoice(m) => Some(m.number_of_states()),
                _ => None,
            };
            CatalogEntry {
                action_type,
                shape: shape.variant_name(),
                states,
                synced: synced.contains(&action_type),
                timed_target: action_type.is_timed_target(),
                plan: plan(action_type),
            }
        })
        .collect()
}

pub fn handle(args: &CatalogArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let platform = PlatformInfo::new(args.platform_level);
    let data = entries(platform, args.synced);

    let out = output::render_list(
        &global.output,
        &data,
        |e| CatalogRow {
            action_type: e.action_type.to_string(),
            shape: e.shape,
            states: e.states.map_or_else(|| "-".into(), |n| n.to_string()),
            synced: yes_no(e.synced),
            timed: yes_no(e.timed_target),
            plan: if e.plan.is_empty() {
                "scheduled".into()
            } else {
                e.plan
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" > ")
            },
        },
        |e| e.action_type.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_shapes_follow_platform() {
        let modern = entries(PlatformInfo::new(34), false);
        let location = modern
            .iter()
            .find(|e| e.action_type == ActionType::Location)
            .map(|e| e.shape);
        assert_eq!(location, Some("ToggleAction"));

        let legacy = entries(PlatformInfo::new(22), false);
        let location = legacy.iter().find(|e| e.action_type == ActionType::Location);
        assert_eq!(location.map(|e| e.shape), Some("MultiChoiceAction"));
        assert_eq!(location.and_then(|e| e.states), Some(4));
    }

    #[test]
    fn synced_filter_drops_timed_and_gestures() {
        let synced = entries(PlatformInfo::default(), true);
        assert_eq!(synced.len(), 16);
        assert!(synced.iter().all(|e| e.synced));
    }
}
