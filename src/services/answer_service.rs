//! Answer submission: validation against the open round, recording and scoring.
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, SessionStatus},
    error::{Rejection, ServiceError},
    services::{
        access::{authorize_participant, load_session},
        room_events::require_question,
        round_service::resolve_and_advance,
    },
    state::{
        SharedState,
        game::{Player, RoundPhase, elapsed_since, from_wire_index},
        mode::{SubmissionOutcome, policy_for},
    },
};

/// Result of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// Whether the chosen option was right.
    pub is_correct: bool,
    /// Right option, 1-based as the client sees it.
    pub correct_option_index: u32,
    /// Whether this answer closed the round.
    pub resolved: bool,
}

/// Validate, record and score one answer, resolving the round when the mode says so.
///
/// `question_index` is the 1-based index the client saw; `option_index` is passed through
/// unchanged.
pub async fn submit_answer(
    state: &SharedState,
    session_id: &str,
    player: Option<&Player>,
    question_index: u32,
    option_index: u32,
) -> Result<AnswerReceipt, ServiceError> {
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    authorize_participant(store.as_ref(), &session, player).await?;
    let policy = policy_for(session.mode);

    match session.status {
        SessionStatus::Pending => return Err(Rejection::NotStarted.into()),
        SessionStatus::Finished => return Err(Rejection::Finished.into()),
        SessionStatus::Started => {}
    }
    let index = from_wire_index(question_index).ok_or(Rejection::InvalidQuestionIndex)?;
    if index != session.current_question_index {
        return Err(Rejection::InvalidQuestionIndex.into());
    }
    let total = store.count_questions(session.quiz_id).await?;
    if index >= total {
        return Err(Rejection::Finished.into());
    }
    let RoundPhase::Open { started_at, .. } = RoundPhase::of(&session) else {
        return Err(Rejection::RoundNotOpen.into());
    };

    let question = require_question(store.as_ref(), &session, index).await?;
    let chosen = question
        .option(option_index)
        .ok_or(Rejection::InvalidOption)?;
    let correct = question.correct_option().ok_or_else(|| {
        ServiceError::Inconsistent(format!("question `{}` has no correct option", question.id))
    })?;

    let member = if policy.is_multiplayer() {
        player.map(Player::as_member)
    } else {
        None
    };
    let player_id = member.as_ref().map(|member| member.player_id.clone());
    if store
        .find_answer(session.id.clone(), question.id, player_id.clone())
        .await?
        .is_some()
    {
        return Err(Rejection::AlreadyAnswered.into());
    }

    let now = state.now();
    if let Some(limit) = policy.duration(session.difficulty.as_deref(), state.config().timing()) {
        if elapsed_since(started_at, now) > limit {
            return Err(Rejection::TimeoutExceeded.into());
        }
    }

    let answer = AnswerEntity {
        id: Uuid::new_v4(),
        session_id: session.id.clone(),
        question_id: question.id,
        option_id: chosen.id,
        is_correct: chosen.is_correct,
        player: member,
        answered_at: now,
    };
    match store.create_answer(answer).await {
        Ok(()) => {}
        Err(err) => {
            return Err(match ServiceError::from(err) {
                ServiceError::Conflict(_) => Rejection::AlreadyAnswered.into(),
                other => other,
            });
        }
    }

    let outcome = if policy.is_multiplayer() {
        SubmissionOutcome {
            is_correct: chosen.is_correct,
            answered: store
                .count_answers_for_question(session.id.clone(), question.id)
                .await?,
            participants: store.count_participants(session.id.clone()).await?,
        }
    } else {
        SubmissionOutcome {
            is_correct: chosen.is_correct,
            answered: 1,
            participants: 1,
        }
    };
    debug!(
        session_id,
        question = question_index,
        player = player_id.as_deref().unwrap_or("session"),
        is_correct = chosen.is_correct,
        answered = outcome.answered,
        participants = outcome.participants,
        "answer recorded"
    );

    let resolved = if policy.resolve_trigger(outcome) {
        resolve_and_advance(state, session_id, index).await?
    } else {
        false
    };
    if resolved {
        info!(session_id, question = question_index, "round closed by an answer");
    }

    Ok(AnswerReceipt {
        is_correct: chosen.is_correct,
        correct_option_index: correct.index,
        resolved,
    })
}
