//! Per-session question timeouts.
//!
//! The registry holds handles only; what a timeout means is decided by whoever scheduled
//! it, once it fires, against the live session record.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{
    sync::oneshot,
    task::AbortHandle,
    time::{Instant, sleep},
};
use tracing::debug;

use crate::state::game::SessionId;

struct TimerSlot {
    generation: u64,
    question_index: u32,
    deadline: Instant,
    handle: AbortHandle,
}

/// Pending timeout as seen from outside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimeout {
    /// 0-based question the timer closes.
    pub question_index: u32,
    /// Time left before it fires.
    pub remaining: Duration,
}

/// One timer slot per session.
#[derive(Default)]
pub struct QuestionScheduler {
    slots: Arc<DashMap<SessionId, TimerSlot>>,
    generation: AtomicU64,
}

impl QuestionScheduler {
    /// Registry with no pending timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timeout of `session_id` for the round at `question_index`.
    ///
    /// Any timer already armed for the session is cancelled first. `on_fire` runs after
    /// the slot has been released, so it may schedule the next round itself.
    pub fn schedule<F, Fut>(&self, session_id: &str, question_index: u32, after: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(session_id);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(&self.slots);
        let key = session_id.to_owned();
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // Wait until the slot is registered so the release below cannot race it.
            if armed_rx.await.is_err() {
                return;
            }
            sleep(after).await;
            let released = slots
                .remove_if(&key, |_, slot| slot.generation == generation)
                .is_some();
            if released {
                on_fire().await;
            }
        });

        self.slots.insert(
            session_id.to_owned(),
            TimerSlot {
                generation,
                question_index,
                deadline: Instant::now() + after,
                handle: task.abort_handle(),
            },
        );
        let _ = armed_tx.send(());
        debug!(session_id, question_index, ?after, "question timeout armed");
    }

    /// Disarm the timeout of a session. Returns whether one was armed.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.slots.remove(session_id) {
            Some((_, slot)) => {
                slot.handle.abort();
                debug!(
                    session_id,
                    question_index = slot.question_index,
                    "question timeout cancelled"
                );
                true
            }
            None => false,
        }
    }

    /// Timeout currently armed for a session, if any.
    pub fn pending(&self, session_id: &str) -> Option<ScheduledTimeout> {
        self.slots.get(session_id).map(|slot| ScheduledTimeout {
            question_index: slot.question_index,
            remaining: slot.deadline.saturating_duration_since(Instant::now()),
        })
    }

    /// Number of sessions with an armed timeout.
    pub fn armed_count(&self) -> usize {
        self.slots.len()
    }
}
