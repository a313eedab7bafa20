// ── Action execution ──
//
// `EscalationChain` runs an action through the privilege tiers planned for
// its type, weakest first, and folds the attempts into one `ActionStatus`.

pub mod provider;
pub mod scheduler;
pub mod shell;
pub mod tiers;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::CompanionConfig;
use crate::device::{DevicePlatform, PrivilegedBroker, SecureSettings};
use crate::model::{Action, ActionStatus, ActionType};

pub use provider::{CapabilityProvider, Tier, TierError};
pub use scheduler::TimedActionScheduler;
pub use shell::{ShellRunner, SuShell, command_for};
pub use tiers::{BrokerTier, NormalTier, RootShellTier, SecureSettingsTier};

/// Anything that can carry out an action on this device.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn perform(&self, action: &Action) -> ActionStatus;
}

/// Tiers attempted for `action_type`, in order.
pub fn plan(action_type: ActionType) -> &'static [Tier] {
    match action_type {
        ActionType::Wifi | ActionType::Bluetooth | ActionType::Nfc => {
            &[Tier::Normal, Tier::RootShell]
        }
        ActionType::DoNotDisturb | ActionType::LockScreen => {
            &[Tier::Normal, Tier::Broker, Tier::SecureSettings]
        }
        ActionType::Location | ActionType::MobileData => &[Tier::SecureSettings],
        ActionType::TimedAction => &[],
        _ => &[Tier::Normal],
    }
}

#[derive(Default)]
pub struct EscalationChain {
    providers: Vec<Arc<dyn CapabilityProvider>>,
}

impl EscalationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in tiers over the given device seams. The broker and
    /// root tiers follow the config switches.
    pub fn standard(
        device: Arc<dyn DevicePlatform>,
        broker: Arc<dyn PrivilegedBroker>,
        settings: Arc<dyn SecureSettings>,
        shell: Arc<dyn ShellRunner>,
        config: &CompanionConfig,
    ) -> Self {
        Self::new()
            .with_provider(Arc::new(NormalTier::new(device)))
            .with_provider(Arc::new(BrokerTier::new(broker, config.broker_enabled)))
            .with_provider(Arc::new(SecureSettingsTier::new(settings)))
            .with_provider(Arc::new(RootShellTier::new(shell, config.root_enabled)))
    }

    /// Register a provider. Only the first provider for a tier is used.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    fn provider(&self, tier: Tier) -> Option<&Arc<dyn CapabilityProvider>> {
        self.providers.iter().find(|p| p.tier() == tier)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.providers.iter().map(|p| p.tier()).collect()
    }

    /// Stop at the first tier that succeeds. Otherwise any tier that tried
    /// and failed makes it `REMOTE_FAILURE`, and a chain where every tier
    /// declined is `REMOTE_PERMISSION_DENIED`.
    pub async fn run(&self, action: &Action) -> ActionStatus {
        let action_type = action.action_type();
        let mut failed = false;

        for &tier in plan(action_type) {
            let Some(provider) = self.provider(tier) else {
                debug!(%action_type, %tier, "tier not configured");
                continue;
            };
            if !provider.is_available().await {
                debug!(%action_type, %tier, "tier unavailable");
                continue;
            }

            match provider.try_execute(action).await {
                Ok(()) => {
                    info!(%action_type, %tier, "action performed");
                    return ActionStatus::Success;
                }
                Err(TierError::Failed(reason)) => {
                    warn!(%action_type, %tier, %reason, "tier failed, escalating");
                    failed = true;
                }
                Err(e) => debug!(%action_type, %tier, error = %e, "tier declined, escalating"),
            }
        }

        let status = if failed {
            ActionStatus::RemoteFailure
        } else {
            ActionStatus::RemotePermissionDenied
        };
        warn!(%action_type, %status, "no tier could perform action");
        status
    }
}

#[async_trait]
impl ActionExecutor for EscalationChain {
    async fn perform(&self, action: &Action) -> ActionStatus {
        self.run(action).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{MultiChoiceAction, NormalAction, PlatformInfo, ToggleAction};

    type Log = Arc<Mutex<Vec<Tier>>>;

    struct Scripted {
        tier: Tier,
        available: bool,
        result: Result<(), TierError>,
        log: Log,
    }

    #[async_trait]
    impl CapabilityProvider for Scripted {
        fn tier(&self) -> Tier {
            self.tier
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn try_execute(&self, _: &Action) -> Result<(), TierError> {
            self.log.lock().unwrap().push(self.tier);
            self.result.clone()
        }
    }

    fn chain(log: &Log, scripts: Vec<(Tier, bool, Result<(), TierError>)>) -> EscalationChain {
        scripts
            .into_iter()
            .fold(EscalationChain::new(), |chain, (tier, available, result)| {
                chain.with_provider(Arc::new(Scripted {
                    tier,
                    available,
                    result,
                    log: Arc::clone(log),
                }))
            })
    }

    fn denied() -> Result<(), TierError> {
        Err(TierError::PermissionDenied("no grant".into()))
    }

    fn dnd(choice: i32) -> Action {
        MultiChoiceAction::new(ActionType::DoNotDisturb, choice, PlatformInfo::default()).into()
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let log = Log::default();
        let chain = chain(
            &log,
            vec![
                (Tier::Normal, true, denied()),
                (Tier::Broker, true, Ok(())),
                (Tier::SecureSettings, true, Ok(())),
            ],
        );

        assert_eq!(chain.run(&dnd(2)).await, ActionStatus::Success);
        assert_eq!(*log.lock().unwrap(), vec![Tier::Normal, Tier::Broker]);
    }

    #[tokio::test]
    async fn all_declined_is_remote_permission_denied() {
        let log = Log::default();
        let chain = chain(
            &log,
            vec![
                (Tier::Normal, true, denied()),
                (Tier::Broker, false, Ok(())),
                (Tier::SecureSettings, false, Ok(())),
            ],
        );

        assert_eq!(chain.run(&dnd(2)).await, ActionStatus::RemotePermissionDenied);
        assert_eq!(*log.lock().unwrap(), vec![Tier::Normal]);
    }

    #[tokio::test]
    async fn a_failed_attempt_is_remote_failure() {
        let log = Log::default();
        let chain = chain(
            &log,
            vec![
                (Tier::Normal, true, Err(TierError::Failed("radio busy".into()))),
                (Tier::RootShell, true, denied()),
            ],
        );

        let wifi: Action = ToggleAction::new(ActionType::Wifi, true).into();
        assert_eq!(chain.run(&wifi).await, ActionStatus::RemoteFailure);
        assert_eq!(*log.lock().unwrap(), vec![Tier::Normal, Tier::RootShell]);
    }

    #[tokio::test]
    async fn each_tier_is_tried_at_most_once_in_plan_order() {
        let log = Log::default();
        let chain = chain(
            &log,
            vec![
                (Tier::SecureSettings, true, denied()),
                (Tier::Broker, true, denied()),
                (Tier::Normal, true, denied()),
                (Tier::Normal, true, Ok(())),
            ],
        );

        let lock: Action = NormalAction::new(ActionType::LockScreen).into();
        assert_eq!(chain.run(&lock).await, ActionStatus::RemotePermissionDenied);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Tier::Normal, Tier::Broker, Tier::SecureSettings]
        );
    }

    #[tokio::test]
    async fn location_skips_normal_tier() {
        let log = Log::default();
        let chain = chain(
            &log,
            vec![(Tier::Normal, true, Ok(())), (Tier::SecureSettings, true, Ok(()))],
        );

        let loc: Action = ToggleAction::new(ActionType::Location, true).into();
        assert_eq!(chain.run(&loc).await, ActionStatus::Success);
        assert_eq!(*log.lock().unwrap(), vec![Tier::SecureSettings]);
    }

    #[test]
    fn timed_actions_have_no_plan() {
        assert!(plan(ActionType::TimedAction).is_empty());
        assert_eq!(plan(ActionType::Torch), &[Tier::Normal]);
    }
}
