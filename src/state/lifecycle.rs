//! Session status transitions.
use thiserror::Error;

use crate::dao::models::SessionStatus;

/// Events that move a session through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The owner (or session creation, for solo play) starts the game.
    Start,
    /// An advancement found no question left to dispatch.
    Exhausted,
}

/// Error returned when an event is not valid from the current status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the event was applied to.
    pub from: SessionStatus,
    /// Rejected event.
    pub event: SessionEvent,
}

/// Compute the status reached by applying `event` to `from`.
///
/// `pending -> started -> finished`; `finished` is terminal.
pub fn next_status(
    from: SessionStatus,
    event: SessionEvent,
) -> Result<SessionStatus, InvalidTransition> {
    match (from, event) {
        (SessionStatus::Pending, SessionEvent::Start) => Ok(SessionStatus::Started),
        (SessionStatus::Started, SessionEvent::Exhausted) => Ok(SessionStatus::Finished),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}
