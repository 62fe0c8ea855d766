//! Delivery ledger.
//!
//! Summarizes finished broadcasts for the admin surface. Recent summaries are
//! kept in memory; full per-recipient outcomes go to the [`BroadcastArchive`].

use std::collections::VecDeque;
use std::sync::Arc;

use ananya_core::delivery::{BroadcastRecord, DeliverySummary};
use ananya_core::ids::BroadcastId;
use ananya_store::BroadcastArchive;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::broadcast::BroadcastJob;

/// Summaries kept in memory by default.
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// Record of finished broadcasts.
pub struct DeliveryLedger {
    history: RwLock<VecDeque<BroadcastRecord>>,
    capacity: usize,
    archive: Option<Arc<dyn BroadcastArchive>>,
}

impl Default for DeliveryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryLedger {
    /// Memory-only ledger.
    pub fn new() -> Self {
        Self {
            history: RwLock::new(VecDeque::new()),
            capacity: DEFAULT_LEDGER_CAPACITY,
            archive: None,
        }
    }

    /// Ledger that also persists every record.
    pub fn with_archive(archive: Arc<dyn BroadcastArchive>) -> Self {
        Self {
            archive: Some(archive),
            ..Self::new()
        }
    }

    /// Counts for a job. Pure aggregation over its recorded outcomes.
    pub fn summarize(job: &BroadcastJob) -> DeliverySummary {
        job.summary()
    }

    /// Summarize a finished job, retain the summary, and archive the outcomes.
    ///
    /// Archive failures are logged; the summary is still returned and retained.
    pub async fn record(&self, job: &BroadcastJob) -> DeliverySummary {
        let record = job.to_record();
        let summary = record.summary;

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.save_broadcast(&record).await {
                warn!(broadcast_id = %record.id, error = %e, "failed to archive broadcast");
            }
        }

        info!(
            broadcast_id = %record.id,
            delivered = summary.delivered,
            blocked = summary.blocked,
            failed = summary.failed,
            total = summary.total,
            cancelled = record.cancelled,
            "broadcast recorded"
        );

        self.retain(BroadcastRecord {
            outcomes: Vec::new(),
            ..record
        });
        summary
    }

    /// Load recent summaries from the archive (newest first). Returns how many were loaded.
    pub async fn preload(&self) -> usize {
        let Some(archive) = &self.archive else {
            return 0;
        };
        match archive.recent_broadcasts(self.capacity).await {
            Ok(records) => {
                let loaded = records.len();
                let mut history = self.history.write();
                for record in records.into_iter().rev() {
                    if history.iter().all(|r| r.id != record.id) {
                        history.push_front(record);
                    }
                }
                history.truncate(self.capacity);
                loaded
            }
            Err(e) => {
                warn!(error = %e, "failed to load broadcast history");
                0
            }
        }
    }

    /// Newest-first summaries.
    pub fn recent(&self, limit: usize) -> Vec<BroadcastRecord> {
        self.history.read().iter().take(limit).cloned().collect()
    }

    /// Summary of one broadcast.
    pub fn get(&self, id: &BroadcastId) -> Option<BroadcastRecord> {
        self.history.read().iter().find(|r| &r.id == id).cloned()
    }

    /// Retained summaries.
    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }

    /// Deliveries across retained summaries.
    pub fn delivered_total(&self) -> usize {
        self.history.read().iter().map(|r| r.summary.delivered).sum()
    }

    fn retain(&self, record: BroadcastRecord) {
        let mut history = self.history.write();
        history.push_front(record);
        history.truncate(self.capacity);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
