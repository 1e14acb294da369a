//! Clock that never blocks.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::clock::Clock;

/// Clock whose sleeps return immediately.
///
/// Every requested sleep is recorded and advances [`Clock::now`] by the
/// same amount, so durations computed from `now()` stay meaningful.
#[derive(Debug)]
pub struct InstantClock {
    start: DateTime<Utc>,
    elapsed: Mutex<Duration>,
    sleeps: RwLock<Vec<Duration>>,
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantClock {
    /// Create a clock starting at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: RwLock::new(Vec::new()),
        }
    }

    /// All sleeps requested so far.
    pub async fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.read().await.clone()
    }

    /// Sum of all requested sleeps.
    pub fn total_slept(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.total_slept();
        self.start + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.write().await.push(duration);
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += duration;
        tokio::task::yield_now().await;
    }
}
