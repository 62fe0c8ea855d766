//! Broadcast dispatcher.
//!
//! `dispatch` validates and admits a job, then runs it on a background task:
//! a bounded pool of workers pulls targets from the snapshot, waits on the
//! global rate limiter, sends with a timeout, and retries transient failures
//! with exponential backoff. Each target ends with exactly one outcome, even
//! when the background task dies: its admission is released on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ananya_core::delivery::{CANCELLED_REASON, DeliveryOutcome};
use ananya_core::errors::{AnanyaError, Result};
use ananya_core::ids::{BroadcastId, UserId};
use ananya_core::text::char_len;
use dashmap::DashMap;
use futures::StreamExt;
use metrics::{counter, gauge};
use tracing::{debug, info, instrument, warn};

use super::job::{BroadcastJob, JobSnapshot};
use super::rate_limit::RateLimiter;
use super::{BROADCAST_JOBS_RESOURCE, BroadcastConfig};
use crate::ledger::DeliveryLedger;
use crate::transport::{SendError, Transport};

/// Recipients left without an outcome when a job's task ends abnormally.
pub const ABORTED_REASON: &str = "broadcast aborted";

struct Shared {
    transport: Arc<dyn Transport>,
    config: BroadcastConfig,
    limiter: RateLimiter,
    ledger: Arc<DeliveryLedger>,
    running: DashMap<BroadcastId, Arc<BroadcastJob>>,
    active: AtomicUsize,
}

/// Fans one message out to many users.
pub struct BroadcastDispatcher {
    shared: Arc<Shared>,
}

impl BroadcastDispatcher {
    /// Dispatcher sending through `transport` and recording into `ledger`.
    pub fn new(transport: Arc<dyn Transport>, config: BroadcastConfig, ledger: Arc<DeliveryLedger>) -> Self {
        let limiter = RateLimiter::per_second(config.sends_per_second);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                limiter,
                ledger,
                running: DashMap::new(),
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BroadcastConfig {
        &self.shared.config
    }

    /// Ledger receiving finished jobs.
    pub fn ledger(&self) -> &Arc<DeliveryLedger> {
        &self.shared.ledger
    }

    /// Admit and start a broadcast of `message` to `user_ids`.
    ///
    /// The message is trimmed. Empty or over-long messages and empty target
    /// sets are `Validation` errors; exceeding the running-job limit is a
    /// `Capacity` error. The returned handle can be polled, awaited, or cancelled.
    #[instrument(skip_all, fields(targets = user_ids.len()))]
    pub fn dispatch(&self, message: &str, user_ids: Vec<UserId>) -> Result<Arc<BroadcastJob>> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AnanyaError::validation("broadcast message is empty"));
        }
        let len = char_len(message);
        let max = self.shared.config.max_message_chars;
        if len > max {
            return Err(AnanyaError::validation(format!(
                "broadcast message is too long ({len} characters, limit {max})"
            )));
        }
        if user_ids.is_empty() {
            return Err(AnanyaError::validation("no active users to broadcast to"));
        }

        let limit = self.shared.config.max_active_jobs;
        if self
            .shared
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
            .is_err()
        {
            warn!(limit, "broadcast rejected, too many running jobs");
            return Err(AnanyaError::Capacity {
                resource: BROADCAST_JOBS_RESOURCE,
                limit,
            });
        }

        let job = Arc::new(BroadcastJob::new(message, user_ids));
        let _ = self.shared.running.insert(job.id().clone(), Arc::clone(&job));
        gauge!("broadcast_jobs_active").set(self.shared.active.load(Ordering::SeqCst) as f64);
        info!(broadcast_id = %job.id(), total = job.total(), "broadcast admitted");

        let admission = Admission {
            shared: Arc::clone(&self.shared),
            job: Arc::clone(&job),
        };
        drop(tokio::spawn(async move { admission.shared.run(&admission.job).await }));
        Ok(job)
    }

    /// Running job by id.
    pub fn job(&self, id: &BroadcastId) -> Option<Arc<BroadcastJob>> {
        self.shared.running.get(id).map(|j| Arc::clone(j.value()))
    }

    /// Snapshots of running jobs.
    pub fn running(&self) -> Vec<JobSnapshot> {
        self.shared.running.iter().map(|j| j.snapshot()).collect()
    }

    /// Number of running jobs.
    pub fn active_jobs(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Request cancellation of a running job. Returns `false` if it is not running.
    pub fn cancel(&self, id: &BroadcastId) -> bool {
        match self.shared.running.get(id) {
            Some(job) => {
                info!(broadcast_id = %id, "broadcast cancellation requested");
                job.cancel();
                true
            }
            None => false,
        }
    }
}

/// A job's hold on a running slot.
///
/// Dropping it settles unfinished recipients, frees the slot and wakes
/// waiters, whether `run` returned, panicked or was never polled.
struct Admission {
    shared: Arc<Shared>,
    job: Arc<BroadcastJob>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        let job = &self.job;
        let unsettled = job
            .targets()
            .iter()
            .filter(|&&user_id| job.record(user_id, DeliveryOutcome::failed(ABORTED_REASON)))
            .count();
        if unsettled > 0 {
            warn!(broadcast_id = %job.id(), unsettled, "broadcast task ended early");
            job.stamp_completion();
        }

        let _ = self.shared.running.remove(job.id());
        let remaining = self.shared.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        gauge!("broadcast_jobs_active").set(remaining as f64);
        job.mark_completed();
    }
}

impl Shared {
    async fn run(&self, job: &BroadcastJob) {
        job.mark_running();
        let workers = self.config.workers;
        let targets = job.targets().to_vec();

        futures::stream::iter(targets)
            .for_each_concurrent(workers, |user_id| {
                async move {
                    let outcome = if job.is_cancelled() {
                        DeliveryOutcome::failed(CANCELLED_REASON)
                    } else {
                        self.deliver(job, user_id).await
                    };
                    counter!("broadcast_deliveries_total", "outcome" => outcome.label()).increment(1);
                    debug!(broadcast_id = %job.id(), user_id = %user_id, outcome = %outcome, "recipient finished");
                    let _ = job.record(user_id, outcome);
                }
            })
            .await;

        job.stamp_completion();
        let summary = self.ledger.record(job).await;
        debug_assert!(summary.is_complete());
    }

    /// Send to one recipient until a terminal outcome is reached.
    async fn deliver(&self, job: &BroadcastJob, user_id: UserId) -> DeliveryOutcome {
        let retry = &self.config.retry;
        let cancel = job.cancel_token();
        let mut attempt = 0u32;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return DeliveryOutcome::failed(CANCELLED_REASON),
                () = self.limiter.acquire() => {}
            }

            let sent = tokio::time::timeout(self.config.send_timeout, self.transport.send(user_id, job.message()))
                .await
                .unwrap_or_else(|_| {
                    Err(SendError::transient(format!(
                        "send timed out after {}ms",
                        self.config.send_timeout.as_millis()
                    )))
                });

            let (reason, retry_after) = match sent {
                Ok(()) => return DeliveryOutcome::Delivered,
                Err(SendError::Blocked) => return DeliveryOutcome::Blocked,
                Err(SendError::Permanent { reason }) => return DeliveryOutcome::failed(reason),
                Err(SendError::Transient { reason, retry_after }) => (reason, retry_after),
            };

            if attempt >= retry.max_retries {
                warn!(broadcast_id = %job.id(), user_id = %user_id, attempts = attempt + 1, reason = %reason, "retries exhausted");
                return DeliveryOutcome::failed(reason);
            }

            let delay = retry.delay_for(attempt).max(retry_after.unwrap_or_default());
            attempt += 1;
            counter!("broadcast_retries_total").increment(1);
            debug!(
                broadcast_id = %job.id(),
                user_id = %user_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "retrying send"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return DeliveryOutcome::failed(CANCELLED_REASON),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ananya_core::delivery::BroadcastStatus;
    use assert_matches::assert_matches;

    use ananya_core::delivery::BroadcastRecord;
    use ananya_store::BroadcastArchive;
    use async_trait::async_trait;

    use crate::test_utils::{ScriptedTransport, SendStep};

    struct FailingArchive;

    #[async_trait]
    impl BroadcastArchive for FailingArchive {
        async fn save_broadcast(&self, _record: &BroadcastRecord) -> ananya_store::Result<()> {
            panic!("archive unavailable");
        }

        async fn recent_broadcasts(&self, _limit: usize) -> ananya_store::Result<Vec<BroadcastRecord>> {
            Ok(Vec::new())
        }

        async fn broadcast_count(&self) -> ananya_store::Result<u64> {
            Ok(0)
        }
    }

    fn users(n: i64) -> Vec<UserId> {
        (1..=n).map(UserId::new).collect()
    }

    fn dispatcher(transport: Arc<ScriptedTransport>, config: BroadcastConfig) -> BroadcastDispatcher {
        BroadcastDispatcher::new(transport, config, Arc::new(DeliveryLedger::new()))
    }

    fn fast_config() -> BroadcastConfig {
        BroadcastConfig {
            sends_per_second: 1000,
            ..BroadcastConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_target_gets_one_outcome() {
        let transport = Arc::new(ScriptedTransport::new());
        let d = dispatcher(transport.clone(), fast_config());
        let job = d.dispatch("hello", users(25)).unwrap();
        job.wait().await;

        assert_eq!(job.status(), BroadcastStatus::Completed);
        assert_eq!(job.outcomes().len(), 25);
        assert_eq!(job.summary().delivered, 25);
        assert_eq!(transport.sent().len(), 25);
        assert_eq!(d.active_jobs(), 0);
        assert!(d.job(job.id()).is_none());
        assert_eq!(d.ledger().get(job.id()).unwrap().summary.delivered, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried_and_isolated() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(UserId::new(3), [SendStep::Permanent("chat not found")]);
        let d = dispatcher(transport.clone(), fast_config());
        let job = d.dispatch("hello", users(5)).unwrap();
        job.wait().await;

        assert_eq!(job.outcome(UserId::new(3)), Some(DeliveryOutcome::failed("chat not found")));
        assert_eq!(transport.attempts(UserId::new(3)), 1);
        for id in [1, 2, 4, 5] {
            assert_eq!(job.outcome(UserId::new(id)), Some(DeliveryOutcome::Delivered));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            UserId::new(1),
            [
                SendStep::Transient("flood"),
                SendStep::Transient("flood"),
                SendStep::Transient("flood"),
            ],
        );
        let d = dispatcher(transport.clone(), fast_config());
        let job = d.dispatch("hello", users(1)).unwrap();
        job.wait().await;

        assert_eq!(job.outcome(UserId::new(1)), Some(DeliveryOutcome::failed("flood")));
        assert_eq!(transport.attempts(UserId::new(1)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_is_respected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(UserId::new(1), [SendStep::RetryAfter(Duration::from_secs(30))]);
        let d = dispatcher(transport.clone(), fast_config());
        let start = tokio::time::Instant::now();
        let job = d.dispatch("hello", users(1)).unwrap();
        job.wait().await;

        assert_eq!(job.outcome(UserId::new(1)), Some(DeliveryOutcome::Delivered));
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_send_times_out_as_transient() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(UserId::new(1), [SendStep::Hang, SendStep::Hang, SendStep::Hang]);
        let d = dispatcher(transport.clone(), fast_config());
        let job = d.dispatch("hello", users(2)).unwrap();
        job.wait().await;

        assert_matches!(job.outcome(UserId::new(1)), Some(DeliveryOutcome::Failed { ref reason }) if reason.contains("timed out"));
        assert_eq!(job.outcome(UserId::new(2)), Some(DeliveryOutcome::Delivered));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_respect_rate_ceiling() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = BroadcastConfig {
            sends_per_second: 10,
            workers: 8,
            ..BroadcastConfig::default()
        };
        let d = dispatcher(transport.clone(), config);
        let start = tokio::time::Instant::now();
        let job = d.dispatch("hello", users(21)).unwrap();
        job.wait().await;

        assert_eq!(job.summary().delivered, 21);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_skips_remaining_targets() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = BroadcastConfig {
            sends_per_second: 1,
            workers: 1,
            ..BroadcastConfig::default()
        };
        let d = dispatcher(transport.clone(), config);
        let job = d.dispatch("hello", users(10)).unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(d.cancel(job.id()));
        job.wait().await;

        let summary = job.summary();
        assert!(summary.is_complete());
        assert!(job.is_cancelled());
        assert!(summary.delivered >= 1 && summary.delivered < 10);
        assert_eq!(summary.failed, 10 - summary.delivered);
        assert_eq!(transport.sent().len(), summary.delivered);
        let cancelled = job
            .outcomes()
            .into_iter()
            .filter(|(_, o)| o.reason() == Some(CANCELLED_REASON))
            .count();
        assert_eq!(cancelled, summary.failed);
        assert!(!d.cancel(job.id()));
    }

    #[tokio::test]
    async fn admission_rejects_bad_messages() {
        let d = dispatcher(Arc::new(ScriptedTransport::new()), fast_config());
        assert_matches!(d.dispatch("   ", users(1)), Err(AnanyaError::Validation { .. }));
        assert_matches!(d.dispatch(&"x".repeat(4001), users(1)), Err(AnanyaError::Validation { .. }));
        assert_matches!(
            d.dispatch("hi", Vec::new()),
            Err(AnanyaError::Validation { ref message }) if message.contains("no active users")
        );
        assert_eq!(d.active_jobs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn running_job_limit_is_enforced() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = BroadcastConfig {
            sends_per_second: 1,
            max_active_jobs: 1,
            ..BroadcastConfig::default()
        };
        let d = dispatcher(transport, config);
        let first = d.dispatch("one", users(3)).unwrap();
        assert_matches!(
            d.dispatch("two", users(3)),
            Err(AnanyaError::Capacity { resource: BROADCAST_JOBS_RESOURCE, limit: 1 })
        );
        assert_eq!(d.running().len(), 1);
        first.wait().await;
        assert!(d.dispatch("two", users(3)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn message_is_trimmed_before_sending() {
        let transport = Arc::new(ScriptedTransport::new());
        let d = dispatcher(transport.clone(), fast_config());
        let job = d.dispatch("  Happy Diwali!  ", users(1)).unwrap();
        job.wait().await;
        assert_eq!(transport.sent(), vec![(UserId::new(1), "Happy Diwali!".to_owned())]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_task_releases_its_slot() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = BroadcastConfig {
            max_active_jobs: 1,
            ..fast_config()
        };
        let d = BroadcastDispatcher::new(
            transport,
            config,
            Arc::new(DeliveryLedger::with_archive(Arc::new(FailingArchive))),
        );
        let first = d.dispatch("one", users(3)).unwrap();
        tokio::time::timeout(Duration::from_secs(5), first.wait()).await.unwrap();

        assert_eq!(first.status(), BroadcastStatus::Completed);
        assert!(first.summary().is_complete());
        assert_eq!(d.active_jobs(), 0);
        assert!(d.running().is_empty());
        assert!(d.dispatch("two", users(3)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_admission_settles_unfinished_recipients() {
        let transport = Arc::new(ScriptedTransport::new());
        let d = dispatcher(transport, fast_config());
        let job = Arc::new(BroadcastJob::new("hi", users(2)));
        assert!(job.record(UserId::new(1), DeliveryOutcome::Delivered));
        d.shared.active.store(1, Ordering::SeqCst);
        let _ = d.shared.running.insert(job.id().clone(), Arc::clone(&job));

        drop(Admission {
            shared: Arc::clone(&d.shared),
            job: Arc::clone(&job),
        });

        assert_eq!(job.status(), BroadcastStatus::Completed);
        assert_eq!(job.outcome(UserId::new(1)), Some(DeliveryOutcome::Delivered));
        assert_eq!(job.outcome(UserId::new(2)), Some(DeliveryOutcome::failed(ABORTED_REASON)));
        assert_eq!(d.active_jobs(), 0);
        assert!(d.job(job.id()).is_none());
    }
}
