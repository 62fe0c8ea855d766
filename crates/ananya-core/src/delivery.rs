//! Broadcast delivery outcome types.
//!
//! Shared between the dispatcher (which produces outcomes), the ledger
//! (which aggregates them), and the store (which archives them).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BroadcastId, UserId};

/// Reason recorded for targets skipped after cancellation.
pub const CANCELLED_REASON: &str = "cancelled";

/// Terminal result of delivering a broadcast to one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The platform accepted the message.
    Delivered,
    /// The recipient has blocked the bot.
    Blocked,
    /// Delivery failed permanently or exhausted its retries.
    Failed {
        /// Short failure reason.
        reason: String,
    },
}

impl DeliveryOutcome {
    /// Failed outcome with a reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }

    /// Stable label (`delivered` / `blocked` / `failed`).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Blocked => "blocked",
            Self::Failed { .. } => "failed",
        }
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            Self::Delivered | Self::Blocked => None,
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Lifecycle state of a broadcast job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    /// Admitted, not started.
    Created,
    /// Sends in progress.
    Running,
    /// Every target has a terminal outcome.
    Completed,
}

impl BroadcastStatus {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

/// Aggregated counts for one broadcast.
///
/// `delivered + blocked + failed == total` once the job is completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    /// Messages accepted by the platform.
    pub delivered: usize,
    /// Recipients that blocked the bot.
    pub blocked: usize,
    /// Permanent failures, exhausted retries, and cancelled targets.
    pub failed: usize,
    /// Size of the target snapshot.
    pub total: usize,
}

impl DeliverySummary {
    /// Count one outcome.
    pub fn add(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Blocked => self.blocked += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Number of targets with a recorded outcome.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.delivered + self.blocked + self.failed
    }

    /// Whether every target has an outcome.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.recorded() == self.total
    }
}

/// Archived record of a completed broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecord {
    /// Broadcast ID.
    pub id: BroadcastId,
    /// Message text that was sent.
    pub message: String,
    /// Final counts.
    pub summary: DeliverySummary,
    /// Whether the job was cancelled before finishing.
    pub cancelled: bool,
    /// When the job was admitted.
    pub created_at: DateTime<Utc>,
    /// When the last outcome was recorded.
    pub completed_at: DateTime<Utc>,
    /// Per-user outcomes in target order.
    pub outcomes: Vec<(UserId, DeliveryOutcome)>,
}
