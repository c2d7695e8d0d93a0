//! Client-side request pacing.
//!
//! Keeps at most `calls` requests within any `period`. A request over the
//! limit waits for the oldest one to leave the window; nothing is retried.

use crate::core::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    calls: usize,
    period: Duration,
    window: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            calls: config.calls,
            period: config.period(),
            window: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(&RateLimitConfig::disabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.calls > 0 && !self.period.is_zero()
    }

    /// Waits until another request may start, then records it.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }

        let mut window = self.window.lock().await;
        loop {
            let now = Instant::now();
            while window
                .front()
                .is_some_and(|started| now.duration_since(*started) >= self.period)
            {
                window.pop_front();
            }

            if window.len() < self.calls {
                window.push_back(now);
                return;
            }

            // Full window: the oldest entry decides when a slot opens.
            let wait = match window.front() {
                Some(oldest) => self.period.saturating_sub(now.duration_since(*oldest)),
                None => Duration::ZERO,
            };
            debug!(
                "Rate limit of {} per {:?} reached, waiting {:?}",
                self.calls, self.period, wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests started within the current window.
    pub async fn in_flight(&self) -> usize {
        let window = self.window.lock().await;
        let now = Instant::now();
        window
            .iter()
            .filter(|started| now.duration_since(**started) < self.period)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(calls: usize, period: Duration) -> RateLimiter {
        RateLimiter {
            calls,
            period,
            window: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    #[tokio::test]
    async fn test_default_limits() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        assert!(limiter.is_enabled());
        assert_eq!(limiter.calls, 20);
        assert_eq!(limiter.period, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_huge_limit_from_config() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            calls: usize::MAX,
            period_secs: 1,
        });
        assert!(limiter.is_enabled());
        limiter.acquire().await;
        assert_eq!(limiter.in_flight().await, 1);
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        assert!(!limiter.is_enabled());
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_acquire_within_limit_is_immediate() {
        let limiter = limiter(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.in_flight().await, 3);
    }

    #[tokio::test]
    async fn test_acquire_over_limit_waits_for_window() {
        let period = Duration::from_millis(100);
        let limiter = limiter(2, period);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= period);
        assert!(limiter.in_flight().await <= 2);
    }

    #[tokio::test]
    async fn test_clone_shares_window() {
        let first = limiter(2, Duration::from_secs(60));
        let second = first.clone();

        first.acquire().await;
        second.acquire().await;
        assert_eq!(first.in_flight().await, 2);
        assert_eq!(second.in_flight().await, 2);
    }
}
