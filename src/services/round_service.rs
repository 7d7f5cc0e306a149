//! Round advancement: dispatch, resolution, reveal pause, timeouts, completion and recovery.
//!
//! Every path that moves a session forward goes through [`resolve_round`] and
//! [`dispatch_round`]. Both write with a guarded update on the session record, so when two
//! triggers race for the same round (an answer and a timeout, two answers) exactly one of
//! them advances it and the others become no-ops.

use std::{sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{SessionGuard, SessionPatch, SessionStatus},
        session_store::SessionStore,
    },
    error::ServiceError,
    services::{
        access::load_session,
        ranking_service::compute_ranking,
        room_events::{finished_payload, push_finished, push_question, push_reveal, require_question},
    },
    state::{
        SharedState,
        game::{RoundPhase, SessionId, time_available},
        lifecycle::{SessionEvent, next_status},
        mode::policy_for,
        reveal::PauseOutcome,
    },
};

/// Store used by engine-driven work; unlike request handlers it keeps running while a
/// freshly installed store is still being recovered.
async fn engine_store(state: &SharedState) -> Result<Arc<dyn SessionStore>, ServiceError> {
    state.store().await.ok_or(ServiceError::Degraded)
}

/// Open the round at the session's current index, or finish the session when no question
/// is left.
///
/// Dispatching a round that is already open is a no-op.
pub async fn dispatch_round(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    let store = engine_store(state).await?;
    let session = load_session(store.as_ref(), session_id).await?;
    if session.status != SessionStatus::Started || session.is_round_open() {
        debug!(session_id, status = ?session.status, "nothing to dispatch");
        return Ok(());
    }

    let total = store.count_questions(session.quiz_id).await?;
    let index = session.current_question_index;
    if index >= total {
        return finish_session(state, store.as_ref(), session_id).await;
    }

    let question = require_question(store.as_ref(), &session, index).await?;
    let patch = SessionPatch {
        question_start_time: Some(Some(state.now())),
        ..SessionPatch::default()
    };
    let Some(session) = store
        .update_session(session_id.to_owned(), SessionGuard::round(index, false), patch)
        .await?
    else {
        debug!(session_id, index, "round already dispatched elsewhere");
        return Ok(());
    };

    let policy = policy_for(session.mode);
    if let Some(limit) = policy.duration(session.difficulty.as_deref(), state.config().timing()) {
        let timeout_state = Arc::clone(state);
        let timeout_session = session_id.to_owned();
        state.scheduler().schedule(session_id, index, limit, move || {
            handle_timeout(timeout_state, timeout_session, index)
        });
    }

    info!(session_id, question = index + 1, total, "question dispatched");
    push_question(state, store.as_ref(), &session, &question, total).await
}

/// Close the round at `index`.
///
/// Returns the reveal window when this call resolved the round, `None` when the session had
/// already moved on. The round is left open if its question data is inconsistent.
pub async fn resolve_round(
    state: &SharedState,
    session_id: &str,
    index: u32,
) -> Result<Option<Duration>, ServiceError> {
    let store = engine_store(state).await?;
    let session = load_session(store.as_ref(), session_id).await?;
    if !SessionGuard::round(index, true).matches(&session) {
        debug!(
            session_id,
            index,
            live_index = session.current_question_index,
            "stale resolution ignored"
        );
        return Ok(None);
    }

    let question = require_question(store.as_ref(), &session, index).await?;
    if question.correct_option().is_none() {
        return Err(ServiceError::Inconsistent(format!(
            "question `{}` has no correct option",
            question.id
        )));
    }

    let patch = SessionPatch {
        current_question_index: Some(index + 1),
        question_start_time: Some(None),
        ..SessionPatch::default()
    };
    let Some(session) = store
        .update_session(session_id.to_owned(), SessionGuard::round(index, true), patch)
        .await?
    else {
        debug!(session_id, index, "round resolved concurrently");
        return Ok(None);
    };

    state.scheduler().cancel(session_id);
    let window = policy_for(session.mode).reveal_window(state.config().timing());
    let remaining = if window.is_zero() {
        window
    } else {
        state.reveals().open(session_id, window)
    };

    info!(session_id, question = index + 1, "round resolved");
    // The round is closed in the store; the next dispatch must be scheduled regardless.
    if let Err(err) = push_reveal(state, store.as_ref(), &session, &question, remaining).await {
        err.log("push_reveal");
        warn!(session_id, error = %err, "reveal not pushed; continuing to the next question");
    }
    Ok(Some(remaining))
}

/// Resolve the round at `index`, then dispatch the next one once the reveal window is over.
///
/// Returns whether this call resolved the round. A zero-length window dispatches inline;
/// otherwise the dispatch runs in the background after the pause.
pub async fn resolve_and_advance(
    state: &SharedState,
    session_id: &str,
    index: u32,
) -> Result<bool, ServiceError> {
    let Some(window) = resolve_round(state, session_id, index).await? else {
        return Ok(false);
    };

    if window.is_zero() {
        dispatch_round(state, session_id).await?;
    } else {
        let state = Arc::clone(state);
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            if state.reveals().wait(&session_id).await == PauseOutcome::Cancelled {
                debug!(session_id = %session_id, "reveal pause cancelled");
                return;
            }
            if let Err(err) = dispatch_round(&state, &session_id).await {
                err.log("dispatch_round");
                warn!(session_id = %session_id, error = %err, "failed to dispatch next question");
            }
        });
    }
    Ok(true)
}

/// Timer callback for the round at `index`; a timer that fires after the round moved on
/// does nothing.
pub fn handle_timeout(state: SharedState, session_id: SessionId, index: u32) -> BoxFuture<'static, ()> {
    async move {
        match resolve_and_advance(&state, &session_id, index).await {
            Ok(true) => info!(session_id = %session_id, question = index + 1, "question timed out"),
            Ok(false) => debug!(session_id = %session_id, index, "stale question timeout ignored"),
            Err(err) => {
                err.log("question_timeout");
                warn!(session_id = %session_id, error = %err, "question timeout failed");
            }
        }
    }
    .boxed()
}

/// Move a started session to `finished` and push the final ranking. Finishing twice is a no-op.
pub async fn finish_session(
    state: &SharedState,
    store: &dyn SessionStore,
    session_id: &str,
) -> Result<(), ServiceError> {
    let finished = next_status(SessionStatus::Started, SessionEvent::Exhausted)?;
    let patch = SessionPatch {
        status: Some(finished),
        question_start_time: Some(None),
        ..SessionPatch::default()
    };
    let Some(session) = store
        .update_session(
            session_id.to_owned(),
            SessionGuard::status(SessionStatus::Started),
            patch,
        )
        .await?
    else {
        debug!(session_id, "session already finished");
        return Ok(());
    };

    state.scheduler().cancel(session_id);
    state.reveals().cancel(session_id);

    let total = store.count_questions(session.quiz_id).await?;
    let ranking = compute_ranking(store, &session).await?;
    info!(session_id, total, "session finished");
    push_finished(state, session_id, &finished_payload(&session, total, ranking));
    Ok(())
}

/// What a recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Open rounds whose time ran out while no timer was armed.
    pub resolved: u32,
    /// Open rounds that got a timer for their remaining time.
    pub rearmed: u32,
    /// Sessions found between rounds and dispatched again.
    pub dispatched: u32,
    /// Sessions left untouched because recovering them failed.
    pub failed: u32,
}

/// Rebuild in-memory round state for every started session after a restart.
///
/// Timers and reveal pauses only live in memory; the session record is the source of truth
/// they are rebuilt from.
pub async fn recover_sessions(state: &SharedState) -> Result<RecoveryReport, ServiceError> {
    let store = engine_store(state).await?;
    let sessions = store.list_sessions_with_status(SessionStatus::Started).await?;
    let mut report = RecoveryReport::default();
    let now = state.now();

    for session in sessions {
        let session_id = session.id.clone();
        let outcome = match RoundPhase::of(&session) {
            RoundPhase::Open { index, started_at } => {
                let limit = policy_for(session.mode)
                    .duration(session.difficulty.as_deref(), state.config().timing());
                match limit.map(|limit| time_available(started_at, limit, now)) {
                    Some(left) if left.is_zero() => resolve_and_advance(state, &session_id, index)
                        .await
                        .map(|_| report.resolved += 1),
                    Some(left) => {
                        let timeout_state = Arc::clone(state);
                        let timeout_session = session_id.clone();
                        state.scheduler().schedule(&session_id, index, left, move || {
                            handle_timeout(timeout_state, timeout_session, index)
                        });
                        report.rearmed += 1;
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
            RoundPhase::Revealing { .. } | RoundPhase::Lobby => dispatch_round(state, &session_id)
                .await
                .map(|_| report.dispatched += 1),
            RoundPhase::Finished => Ok(()),
        };

        if let Err(err) = outcome {
            err.log("recover_sessions");
            warn!(session_id = %session_id, error = %err, "failed to recover session");
            report.failed += 1;
        }
    }

    info!(
        resolved = report.resolved,
        rearmed = report.rearmed,
        dispatched = report.dispatched,
        failed = report.failed,
        "session recovery finished"
    );
    Ok(report)
}
