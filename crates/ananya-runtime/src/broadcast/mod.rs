//! Broadcast fan-out.
//!
//! - [`BroadcastDispatcher`]: admission, worker pool, retry, cancellation
//! - [`BroadcastJob`]: target snapshot, per-recipient results, status
//! - [`RateLimiter`]: global sends-per-second ceiling shared by all jobs

mod dispatcher;
mod job;
mod rate_limit;

pub use dispatcher::{ABORTED_REASON, BroadcastDispatcher};
pub use job::{BroadcastJob, JobSnapshot};
pub use rate_limit::RateLimiter;

use std::time::Duration;

use ananya_core::constants::PLATFORM_MESSAGE_LIMIT;
use ananya_core::retry::RetryConfig;
use ananya_settings::BroadcastSettings;

/// Resource name reported when too many jobs are running.
pub const BROADCAST_JOBS_RESOURCE: &str = "broadcast_jobs";

/// Dispatcher tuning.
#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    /// Per-recipient retry policy for transient failures.
    pub retry: RetryConfig,
    /// Global send ceiling.
    pub sends_per_second: u32,
    /// Concurrent sends per job.
    pub workers: usize,
    /// Bound on a single send.
    pub send_timeout: Duration,
    /// Jobs allowed to run at once.
    pub max_active_jobs: usize,
    /// Longest accepted message, in characters.
    pub max_message_chars: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self::from(&BroadcastSettings::default())
    }
}

impl From<&BroadcastSettings> for BroadcastConfig {
    fn from(settings: &BroadcastSettings) -> Self {
        Self {
            retry: settings.retry_config(),
            sends_per_second: settings.sends_per_second.max(1),
            workers: settings.workers.max(1),
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            max_active_jobs: settings.max_active_jobs.max(1),
            max_message_chars: settings.max_message_chars.clamp(1, PLATFORM_MESSAGE_LIMIT),
        }
    }
}
