//! Global send pacing.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spaces permits at least `1 / rate` seconds apart.
///
/// Each caller reserves the next free slot and sleeps until it arrives, so
/// throttling delays senders and never rejects them.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `per_second` permits per second (minimum 1).
    pub fn per_second(per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / per_second.max(1),
            next_slot: Mutex::new(None),
        }
    }

    /// Spacing between permits.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next permit.
    pub async fn acquire(&self) {
        let slot = {
            let now = Instant::now();
            let mut next = self.next_slot.lock();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn permits_are_spaced_by_interval() {
        let limiter = RateLimiter::per_second(10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // First permit is immediate, the next four wait 100ms each.
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_the_ceiling() {
        let limiter = Arc::new(RateLimiter::per_second(20));
        let start = Instant::now();
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::from_millis(950));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_limiter_does_not_bank_permits() {
        let limiter = RateLimiter::per_second(2);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_is_clamped() {
        assert_eq!(RateLimiter::per_second(0).interval(), Duration::from_secs(1));
    }
}
