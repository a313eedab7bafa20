// ── Privileged helper ──
//
// A separate executor that owns its own escalation chain and accepts work
// as `RemoteAction` envelopes over a channel, replying on a oneshot with a
// result code and payload. The companion hands actions to it through
// `HelperHandle`, which is itself an `ActionExecutor`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use strum::Display;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::codec::{decode_action, encode_action};
use crate::error::CoreError;
use crate::exec::{ActionExecutor, EscalationChain};
use crate::model::{Action, ActionStatus, PlatformInfo};

const QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Ok,
    Canceled,
}

/// Reply to a [`RemoteAction`]: JSON action on `Ok`, an error string on
/// `Canceled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperReply {
    pub code: ResultCode,
    pub payload: String,
}

impl HelperReply {
    fn canceled(reason: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Canceled,
            payload: reason.into(),
        }
    }
}

pub struct RemoteAction {
    pub action: Action,
    pub reply: oneshot::Sender<HelperReply>,
}

pub struct PrivilegedHelper;

impl PrivilegedHelper {
    /// Start the helper loop on `tracker`; it runs until `cancel` fires or
    /// every handle is dropped.
    pub fn spawn(
        chain: Arc<EscalationChain>,
        platform: PlatformInfo,
        timeout: Duration,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) -> HelperHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tracker.spawn(helper_loop(chain, rx, cancel));
        HelperHandle {
            tx,
            platform,
            timeout,
        }
    }
}

async fn helper_loop(
    chain: Arc<EscalationChain>,
    mut rx: mpsc::Receiver<RemoteAction>,
    cancel: CancellationToken,
) {
    info!("privileged helper started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = rx.recv() => {
                let Some(request) = request else { break };
                let reply = run_remote(&chain, request.action).await;
                if request.reply.send(reply).is_err() {
                    debug!("helper caller went away before the reply");
                }
            }
        }
    }
    info!("privileged helper stopped");
}

async fn run_remote(chain: &EscalationChain, action: Action) -> HelperReply {
    if matches!(action, Action::Timed(_)) {
        return HelperReply::canceled("timed actions are scheduled by the companion, not the helper");
    }

    let status = chain.run(&action).await;
    let result = action.with_status(status);
    match encode_action(&result) {
        Some(json) => HelperReply {
            code: ResultCode::Ok,
            payload: String::from_utf8_lossy(&json).into_owned(),
        },
        None => HelperReply::canceled("cannot encode result"),
    }
}

#[derive(Clone)]
pub struct HelperHandle {
    tx: mpsc::Sender<RemoteAction>,
    platform: PlatformInfo,
    timeout: Duration,
}

impl HelperHandle {
    /// Submit an action and wait (bounded) for the helper's result.
    pub async fn submit(&self, action: Action) -> Result<Action, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RemoteAction {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::HelperUnavailable {
                message: "helper is not running".into(),
            })?;

        let reply = tokio::time::timeout(self.timeout, reply_rx)
            .await
            .map_err(|_| CoreError::Timeout {
                what: "privileged helper".into(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|_| CoreError::HelperUnavailable {
                message: "helper dropped the request".into(),
            })?;

        match reply.code {
            ResultCode::Ok => decode_action(reply.payload.as_bytes(), self.platform).ok_or_else(|| {
                CoreError::InvalidAction {
                    message: "helper returned an undecodable action".into(),
                }
            }),
            ResultCode::Canceled => Err(CoreError::HelperUnavailable {
                message: reply.payload,
            }),
        }
    }
}

#[async_trait]
impl ActionExecutor for HelperHandle {
    async fn perform(&self, action: &Action) -> ActionStatus {
        match self.submit(action.clone()).await {
            Ok(result) => result.status(),
            Err(CoreError::Timeout { .. }) => ActionStatus::Timeout,
            Err(e) => {
                warn!(action_type = %action.action_type(), error = %e, "helper could not run action");
                ActionStatus::RemoteFailure
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::{CapabilityProvider, Tier, TierError};
    use crate::model::{ActionType, NormalAction, TimedAction, ToggleAction};

    struct AlwaysOk;

    #[async_trait]
    impl CapabilityProvider for AlwaysOk {
        fn tier(&self) -> Tier {
            Tier::Normal
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn try_execute(&self, _: &Action) -> Result<(), TierError> {
            Ok(())
        }
    }

    fn helper(cancel: &CancellationToken) -> HelperHandle {
        let chain = Arc::new(EscalationChain::new().with_provider(Arc::new(AlwaysOk)));
        PrivilegedHelper::spawn(
            chain,
            PlatformInfo::default(),
            Duration::from_secs(1),
            cancel.clone(),
            &TaskTracker::new(),
        )
    }

    #[tokio::test]
    async fn helper_runs_action_and_returns_result() {
        let cancel = CancellationToken::new();
        let handle = helper(&cancel);

        let torch: Action = ToggleAction::new(ActionType::Torch, true).into();
        let result = handle.submit(torch.clone()).await.unwrap();
        assert_eq!(result, torch.with_status(ActionStatus::Success));

        let lock: Action = NormalAction::new(ActionType::LockScreen).into();
        assert_eq!(handle.perform(&lock).await, ActionStatus::Success);
    }

    #[tokio::test]
    async fn timed_actions_are_canceled() {
        let cancel = CancellationToken::new();
        let handle = helper(&cancel);

        let timed = TimedAction::new(0, ToggleAction::new(ActionType::Wifi, true).into()).unwrap();
        let err = handle.submit(timed.into()).await.unwrap_err();
        assert!(matches!(err, CoreError::HelperUnavailable { .. }));
    }

    #[tokio::test]
    async fn stopped_helper_reports_remote_failure() {
        let cancel = CancellationToken::new();
        let handle = helper(&cancel);
        cancel.cancel();
        tokio::task::yield_now().await;

        let torch: Action = ToggleAction::new(ActionType::Torch, true).into();
        let status = handle.perform(&torch).await;
        assert_eq!(status, ActionStatus::RemoteFailure);
    }
}
