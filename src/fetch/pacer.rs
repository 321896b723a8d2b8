// src/fetch/pacer.rs

//! Inter-request pacing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared pacing policy bounding the aggregate request rate.
///
/// Every caller (the pagination walk and each detail worker) awaits
/// [`Pacer::pause`] before issuing a request. Slots are handed out at
/// fixed intervals, so total request rate stays bounded regardless of
/// how many workers share the pacer.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Pacer that spaces requests by the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Pacer from a delay in milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Zero-delay pacer for tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next request slot.
    pub async fn pause(&self) {
        if self.interval.is_zero() {
            return;
        }

        let wake = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            let at = match *slot {
                Some(t) if t > now => t,
                _ => now,
            };
            *slot = Some(at + self.interval);
            at
        };

        tokio::time::sleep_until(wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn none_returns_immediately() {
        let pacer = Pacer::none();
        let start = Instant::now();
        for _ in 0..100 {
            pacer.pause().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn slots_are_spaced_by_interval() {
        let pacer = Pacer::from_millis(100);
        let start = Instant::now();

        pacer.pause().await; // first slot is immediate
        pacer.pause().await;
        pacer.pause().await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_the_schedule() {
        use std::sync::Arc;

        let pacer = Arc::new(Pacer::from_millis(50));
        let start = Instant::now();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                tokio::spawn(async move { pacer.pause().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // 4 callers -> slots at 0, 50, 100, 150ms
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
