//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Broadcasts running now.
    pub active_broadcasts: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, active_broadcasts: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        active_broadcasts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reports_uptime() {
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        let resp = health_check(start, 1);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs >= 59);
        assert_eq!(resp.active_broadcasts, 1);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(health_check(Instant::now(), 0)).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptimeSecs"].is_number());
        assert_eq!(json["activeBroadcasts"], 0);
    }
}
