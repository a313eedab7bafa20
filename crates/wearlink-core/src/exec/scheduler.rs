// ── Timed action scheduling ──
//
// A `TimedAction` is acknowledged immediately and its target runs later
// through the executor. At most one pending schedule per target type: a new
// schedule replaces the old one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use uuid::Uuid;

use super::ActionExecutor;
use crate::events::CompanionEvent;
use crate::model::{ActionStatus, ActionType, TimedAction};
use crate::status::{StatusReporter, StatusScope};

pub struct TimedActionScheduler {
    executor: Arc<dyn ActionExecutor>,
    reporter: Arc<StatusReporter>,
    events: broadcast::Sender<Arc<CompanionEvent>>,
    pending: Arc<DashMap<ActionType, (Uuid, CancellationToken)>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TimedActionScheduler {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        reporter: Arc<StatusReporter>,
        events: broadcast::Sender<Arc<CompanionEvent>>,
        cancel: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            executor,
            reporter,
            events,
            pending: Arc::new(DashMap::new()),
            cancel,
            tracker,
        }
    }

    /// Queue `timed` and return the acknowledgement status.
    pub fn schedule(&self, timed: TimedAction) -> ActionStatus {
        if self.cancel.is_cancelled() {
            return ActionStatus::Failure;
        }

        let delay_ms = timed
            .time_in_millis()
            .saturating_sub(Utc::now().timestamp_millis());
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        let target = timed.into_action();
        let target_type = target.action_type();

        let id = Uuid::new_v4();
        let token = self.cancel.child_token();
        if let Some((_, (_, previous))) = self.pending.remove(&target_type) {
            debug!(%target_type, "replacing pending schedule");
            previous.cancel();
        }
        self.pending.insert(target_type, (id, token.clone()));

        let executor = Arc::clone(&self.executor);
        let reporter = Arc::clone(&self.reporter);
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);

        info!(%target_type, delay_ms = delay.as_millis(), "timed action scheduled");
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(%target_type, "timed action cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
            pending.remove_if(&target_type, |_, (pending_id, _)| *pending_id == id);

            let status = executor.perform(&target).await;
            info!(%target_type, %status, "timed action fired");
            let _ = events.send(Arc::new(CompanionEvent::TimedActionFired {
                action: target.clone().with_status(status),
                status,
            }));

            if status.is_success() {
                reporter.send_action_update(None, target_type).await;
                if let Some(scope) = StatusScope::for_action(target_type) {
                    reporter.send_status_update(None, Some(scope)).await;
                }
            }
        });

        ActionStatus::Success
    }

    /// Drop the pending schedule for `action_type`. Returns whether one existed.
    pub fn cancel(&self, action_type: ActionType) -> bool {
        match self.pending.remove(&action_type) {
            Some((_, (_, token))) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> Vec<ActionType> {
        let mut types: Vec<ActionType> = self.pending.iter().map(|e| *e.key()).collect();
        types.sort();
        types
    }
}
