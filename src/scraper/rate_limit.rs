use crate::config::ScraperConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Enforces a pause between consecutive fetches. The first fetch goes out
/// immediately.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    jitter_ms: u64,
    last_fetch: Option<Instant>,
}

impl RateLimiter {
    pub fn new(delay: Duration, jitter_ms: u64) -> Self {
        Self {
            delay,
            jitter_ms,
            last_fetch: None,
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(Duration::from_millis(config.request_delay_ms), config.jitter_ms)
    }

    /// Sleep for the configured delay + random jitter, measured from the previous fetch.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_fetch {
            let jitter = if self.jitter_ms > 0 {
                rand::rng().random_range(0..=self.jitter_ms)
            } else {
                0
            };
            let pause = self.delay + Duration::from_millis(jitter);
            let elapsed = last.elapsed();
            if pause > elapsed {
                debug!("Rate limiting for {:?}", pause - elapsed);
                sleep(pause - elapsed).await;
            }
        }
        self.last_fetch = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fetch_is_not_delayed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 0);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_fetches_are_spaced() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30), 0);
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
