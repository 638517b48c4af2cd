//! Time source for cooldowns, membership age and audit timestamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Supplies the current wall-clock time and a way to wait.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Wall clock anchored at construction and advanced by tokio's timer.
///
/// Reading the time through `tokio::time::Instant` keeps `now()` consistent
/// with every `sleep` the bot performs, including under a paused test
/// runtime where virtual time jumps forward.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_wall: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// A clock whose `now()` reads `wall` at the moment of construction.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.anchor.elapsed();
        self.anchor_wall + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX)
    }
}
