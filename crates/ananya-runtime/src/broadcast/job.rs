//! Broadcast job state.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ananya_core::delivery::{BroadcastRecord, BroadcastStatus, DeliveryOutcome, DeliverySummary};
use ananya_core::ids::{BroadcastId, UserId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// One fan-out of a message to a fixed target snapshot.
///
/// Results hold at most one outcome per target; the first recorded outcome
/// wins. The job is terminal once every target has an outcome.
pub struct BroadcastJob {
    id: BroadcastId,
    message: String,
    targets: Vec<UserId>,
    target_set: HashSet<UserId>,
    created_at: DateTime<Utc>,
    completed_at: Mutex<Option<DateTime<Utc>>>,
    results: Mutex<HashMap<UserId, DeliveryOutcome>>,
    status: watch::Sender<BroadcastStatus>,
    cancel: CancellationToken,
}

impl fmt::Debug for BroadcastJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastJob")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("total", &self.targets.len())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Job id.
    pub id: BroadcastId,
    /// Lifecycle state.
    pub status: BroadcastStatus,
    /// Counts so far.
    pub summary: DeliverySummary,
    /// Whether cancellation was requested.
    pub cancelled: bool,
    /// Admission time.
    pub created_at: DateTime<Utc>,
    /// Completion time, once terminal.
    pub completed_at: Option<DateTime<Utc>>,
}

impl BroadcastJob {
    /// New job in `Created` state. Duplicate targets are dropped, first occurrence kept.
    pub fn new(message: impl Into<String>, targets: impl IntoIterator<Item = UserId>) -> Self {
        let mut target_set = HashSet::new();
        let targets: Vec<UserId> = targets.into_iter().filter(|id| target_set.insert(*id)).collect();
        let (status, _) = watch::channel(BroadcastStatus::Created);
        Self {
            id: BroadcastId::new(),
            message: message.into(),
            targets,
            target_set,
            created_at: Utc::now(),
            completed_at: Mutex::new(None),
            results: Mutex::new(HashMap::new()),
            status,
            cancel: CancellationToken::new(),
        }
    }

    /// Job id.
    pub fn id(&self) -> &BroadcastId {
        &self.id
    }

    /// Message body.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Target snapshot in dispatch order.
    pub fn targets(&self) -> &[UserId] {
        &self.targets
    }

    /// Number of targets.
    pub fn total(&self) -> usize {
        self.targets.len()
    }

    /// Current state.
    pub fn status(&self) -> BroadcastStatus {
        *self.status.borrow()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record a terminal outcome. Returns `false` for non-targets and repeats.
    pub fn record(&self, user_id: UserId, outcome: DeliveryOutcome) -> bool {
        if !self.target_set.contains(&user_id) {
            return false;
        }
        let mut results = self.results.lock();
        if results.contains_key(&user_id) {
            return false;
        }
        let _ = results.insert(user_id, outcome);
        true
    }

    /// Outcome recorded for `user_id`, if any.
    pub fn outcome(&self, user_id: UserId) -> Option<DeliveryOutcome> {
        self.results.lock().get(&user_id).cloned()
    }

    /// Recorded outcomes in target order.
    pub fn outcomes(&self) -> Vec<(UserId, DeliveryOutcome)> {
        let results = self.results.lock();
        self.targets
            .iter()
            .filter_map(|id| results.get(id).map(|o| (*id, o.clone())))
            .collect()
    }

    /// Live counts.
    pub fn summary(&self) -> DeliverySummary {
        let mut summary = DeliverySummary {
            total: self.total(),
            ..DeliverySummary::default()
        };
        for outcome in self.results.lock().values() {
            summary.add(outcome);
        }
        summary
    }

    /// Completion time, once terminal.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        *self.completed_at.lock()
    }

    /// Admission time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status(),
            summary: self.summary(),
            cancelled: self.is_cancelled(),
            created_at: self.created_at,
            completed_at: self.completed_at(),
        }
    }

    /// Archive form. Outcomes are in target order.
    pub fn to_record(&self) -> BroadcastRecord {
        BroadcastRecord {
            id: self.id.clone(),
            message: self.message.clone(),
            summary: self.summary(),
            cancelled: self.is_cancelled(),
            created_at: self.created_at,
            completed_at: self.completed_at().unwrap_or_else(Utc::now),
            outcomes: self.outcomes(),
        }
    }

    /// Wait until the job reaches `Completed`.
    pub async fn wait(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|s| *s == BroadcastStatus::Completed).await;
    }

    pub(crate) fn mark_running(&self) {
        let _ = self.status.send_replace(BroadcastStatus::Running);
    }

    pub(crate) fn stamp_completion(&self) {
        let _ = self.completed_at.lock().get_or_insert_with(Utc::now);
    }

    pub(crate) fn mark_completed(&self) {
        let _ = self.status.send_replace(BroadcastStatus::Completed);
    }
}
