//! Polite pauses between outbound search calls.
//!
//! Search fan-out and verification hit the provider back to back; a
//! [`Pacer`] spaces those calls out. Zero-length pacers are used in tests.

use rand::Rng;
use std::time::Duration;

/// A pause of either a fixed or a uniformly random length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    /// Random pause in `[min, max]`. If `min > max`, `min` is used as a fixed pause.
    pub fn between(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Pick the next delay without sleeping.
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::none()
    }
}
