//! Wall-clock timestamps that advance with the tokio clock.
//!
//! Round start times are persisted as wall-clock values, while timers and reveal pauses run
//! on `tokio::time`. Reading both through one clock keeps lateness checks and countdowns in
//! step with the timers, including when the tokio clock is paused.
use std::time::SystemTime;

use tokio::time::Instant;

/// Clock anchored on the wall time observed at construction.
#[derive(Debug, Clone, Copy)]
pub struct RoundClock {
    wall: SystemTime,
    anchor: Instant,
}

impl RoundClock {
    /// Anchor a clock on the current wall time and tokio instant.
    pub fn new() -> Self {
        Self {
            wall: SystemTime::now(),
            anchor: Instant::now(),
        }
    }

    /// Current wall time as seen through the tokio clock.
    pub fn now(&self) -> SystemTime {
        self.wall + self.anchor.elapsed()
    }
}

impl Default for RoundClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_time() {
        let clock = RoundClock::new();
        let before = clock.now();
        tokio::time::advance(Duration::from_secs(42)).await;
        assert_eq!(
            clock.now().duration_since(before).unwrap(),
            Duration::from_secs(42)
        );
    }
}
