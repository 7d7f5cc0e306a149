//! Cancelable pauses between a round's reveal and the next question.
use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::Notify,
    time::{Instant, sleep},
};

use crate::state::game::SessionId;

struct RevealWindow {
    started: Instant,
    length: Duration,
    cancel: Arc<Notify>,
}

impl RevealWindow {
    fn remaining(&self, now: Instant) -> Duration {
        self.length
            .saturating_sub(now.saturating_duration_since(self.started))
    }
}

/// How a reveal pause ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// The window ran to its end.
    Elapsed,
    /// The window was cut short.
    Cancelled,
}

/// Named, cancelable reveal windows keyed by session.
#[derive(Default)]
pub struct RevealPauses {
    windows: DashMap<SessionId, RevealWindow>,
}

impl RevealPauses {
    /// Registry with no open window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the reveal window of a session and return how much of it remains.
    ///
    /// Re-opening a window that is still running keeps its original start.
    pub fn open(&self, session_id: &str, length: Duration) -> Duration {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(session_id.to_owned())
            .or_insert_with(|| RevealWindow {
                started: now,
                length,
                cancel: Arc::new(Notify::new()),
            });
        if entry.remaining(now).is_zero() {
            *entry = RevealWindow {
                started: now,
                length,
                cancel: Arc::new(Notify::new()),
            };
        }
        entry.remaining(now)
    }

    /// Time left in the session's reveal window; zero when none is running.
    pub fn remaining(&self, session_id: &str) -> Duration {
        self.windows
            .get(session_id)
            .map(|window| window.remaining(Instant::now()))
            .unwrap_or_default()
    }

    /// Wait for the rest of the session's window, or until it is cancelled.
    pub async fn wait(&self, session_id: &str) -> PauseOutcome {
        let (remaining, started, cancel) = match self.windows.get(session_id) {
            Some(window) => (
                window.remaining(Instant::now()),
                window.started,
                Arc::clone(&window.cancel),
            ),
            None => return PauseOutcome::Elapsed,
        };

        tokio::select! {
            _ = sleep(remaining) => {
                self.windows
                    .remove_if(session_id, |_, window| window.started == started);
                PauseOutcome::Elapsed
            }
            _ = cancel.notified() => PauseOutcome::Cancelled,
        }
    }

    /// Cancel the session's window, waking its waiter. Returns whether one was open.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.windows.remove(session_id) {
            Some((_, window)) => {
                window.cancel.notify_one();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn reopening_keeps_the_original_start() {
        let pauses = RevealPauses::new();
        assert_eq!(pauses.open("GAREVEAL", WINDOW), WINDOW);

        advance(Duration::from_secs(2)).await;
        assert_eq!(pauses.open("GAREVEAL", WINDOW), Duration::from_secs(3));
        assert_eq!(pauses.remaining("GAREVEAL"), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_lasts_for_the_remaining_window() {
        let pauses = RevealPauses::new();
        pauses.open("GAREVEAL", WINDOW);
        advance(Duration::from_secs(1)).await;

        let started = Instant::now();
        assert_eq!(pauses.wait("GAREVEAL").await, PauseOutcome::Elapsed);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(pauses.remaining("GAREVEAL"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wakes_the_waiter() {
        let pauses = Arc::new(RevealPauses::new());
        pauses.open("GAREVEAL", WINDOW);

        let waiter = {
            let pauses = Arc::clone(&pauses);
            tokio::spawn(async move { pauses.wait("GAREVEAL").await })
        };
        tokio::task::yield_now().await;
        assert!(pauses.cancel("GAREVEAL"));

        assert_eq!(waiter.await.unwrap(), PauseOutcome::Cancelled);
        assert_eq!(pauses.remaining("GAREVEAL"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_without_a_window_returns_immediately() {
        let pauses = RevealPauses::new();
        assert_eq!(pauses.wait("GANOWAIT").await, PauseOutcome::Elapsed);
        assert!(!pauses.cancel("GANOWAIT"));
    }
}
