//! Prometheus recorder and metric names.
//!
//! The runtime records through the `metrics` facade with the same names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder. Call once at startup.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Chat turns (counter, labels: outcome).
pub const CHAT_TURNS_TOTAL: &str = "chat_turns_total";
/// Chat turn duration (histogram).
pub const CHAT_TURN_DURATION_SECONDS: &str = "chat_turn_duration_seconds";
/// Broadcast recipient outcomes (counter, labels: outcome).
pub const BROADCAST_DELIVERIES_TOTAL: &str = "broadcast_deliveries_total";
/// Broadcast send retries (counter).
pub const BROADCAST_RETRIES_TOTAL: &str = "broadcast_retries_total";
/// Running broadcast jobs (gauge).
pub const BROADCAST_JOBS_ACTIVE: &str = "broadcast_jobs_active";
/// Voice notes forwarded without a transcript (counter, labels: reason).
pub const TRANSCRIPTION_FAILURES_TOTAL: &str = "transcription_failures_total";
/// Telegram updates received (counter, labels: kind).
pub const TELEGRAM_UPDATES_TOTAL: &str = "telegram_updates_total";
/// Authenticated admin requests (counter, labels: route).
pub const ADMIN_REQUESTS_TOTAL: &str = "admin_requests_total";
