//! Event builders shared by room pushes and client resyncs.
//!
//! A resync is computed with the same builders a push uses, from the same store reads,
//! so a client that missed a push converges to what it would have received.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::TimingConfig,
    dao::{
        models::{AnswerEntity, QuestionEntity, SessionEntity, TeamEntity},
        session_store::SessionStore,
    },
    dto::{
        events::{
            AnswerResultPayload, ErrorPayload, GameFinishedPayload, GameStartedPayload,
            IsCorrectAnswerPayload, JoinedGamePayload, NewQuestionPayload, OptionPayload,
            Ranking, RosterPayload,
        },
        session::{MemberSummary, TeamSummary},
    },
    error::ServiceError,
    services::{
        access::{authorize_participant, load_session},
        ranking_service::{compute_ranking, correct_answers_of},
    },
    state::{
        RoomEvent, SharedState,
        game::{Player, RoundPhase, time_available, to_wire_index},
        mode::policy_for,
    },
};

/// A round opened.
pub const EVENT_NEW_QUESTION: &str = "newQuestion";
/// Aggregate of a resolved round.
pub const EVENT_ANSWER_RESULT: &str = "answerResult";
/// Right answer of a resolved round.
pub const EVENT_IS_CORRECT_ANSWER: &str = "isCorrectAnswer";
/// Final standings.
pub const EVENT_GAME_FINISHED: &str = "gameFinished";
/// Roster after a join.
pub const EVENT_PLAYER_JOINED: &str = "playerJoined";
/// Roster after a team switch.
pub const EVENT_TEAM_SWITCH: &str = "teamSwitch";
/// Roster after a departure.
pub const EVENT_PLAYER_LEFT: &str = "playerLeft";
/// The session left the lobby.
pub const EVENT_GAME_STARTED: &str = "gameStarted";
/// Direct reply to a websocket join.
pub const EVENT_JOINED_GAME: &str = "joinedGame";
/// Direct reply carrying a refusal.
pub const EVENT_ERROR: &str = "error";

/// Build the `newQuestion` payload for the round currently stored on `session`.
pub fn question_payload(
    session: &SessionEntity,
    question: &QuestionEntity,
    total: u32,
    correct_answers_nb: u32,
    timing: &TimingConfig,
    now: SystemTime,
) -> NewQuestionPayload {
    let limit = policy_for(session.mode).duration(session.difficulty.as_deref(), timing);
    let available = limit.map(|limit| match session.question_start_time {
        Some(started_at) => time_available(started_at, limit, now),
        None => limit,
    });

    let mut options: Vec<OptionPayload> = question
        .options
        .iter()
        .map(|option| OptionPayload {
            option_index: option.index,
            option_content: option.content.clone(),
        })
        .collect();
    options.sort_by_key(|option| option.option_index);

    NewQuestionPayload {
        game_finished: false,
        question_text: question.text.clone(),
        options,
        question_index: to_wire_index(question.index),
        nb_questions_total: total,
        correct_answers_nb,
        question_type: question.question_type.clone(),
        question_difficulty: question.difficulty.clone(),
        question_category: question.category.clone(),
        quiz_id: session.quiz_id,
        time_limit: limit.map(|limit| limit.as_secs()),
        time_available: available.map(|left| left.as_secs_f64()),
    }
}

/// Build the `answerResult` payload for a resolved question.
pub fn reveal_payload(
    question: &QuestionEntity,
    remaining: Duration,
) -> Result<AnswerResultPayload, ServiceError> {
    let correct = question.correct_option().ok_or_else(|| {
        ServiceError::Inconsistent(format!("question `{}` has no correct option", question.id))
    })?;
    Ok(AnswerResultPayload {
        question_index: to_wire_index(question.index),
        correct_option_index: correct.index,
        time_remaining: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
    })
}

/// Whether the answer recorded under `player_id` for `question_id` was correct.
pub fn verdict(
    answers: &[AnswerEntity],
    question_id: Uuid,
    player_id: Option<&str>,
) -> IsCorrectAnswerPayload {
    let is_correct = answers.iter().any(|answer| {
        answer.question_id == question_id && answer.player_id() == player_id && answer.is_correct
    });
    IsCorrectAnswerPayload { is_correct }
}

/// Push a freshly opened round, personalized per connected player in multiplayer rooms.
pub async fn push_question(
    state: &SharedState,
    store: &dyn SessionStore,
    session: &SessionEntity,
    question: &QuestionEntity,
    total: u32,
) -> Result<(), ServiceError> {
    let answers = store.list_answers(session.id.clone()).await?;
    let timing = state.config().timing();
    let now = state.now();
    let rooms = state.rooms();

    if policy_for(session.mode).is_multiplayer() {
        for player_id in rooms.room_members(&session.id) {
            let count = correct_answers_of(&answers, Some(&player_id));
            let payload = question_payload(session, question, total, count, timing, now);
            if let Some(event) = build_event(EVENT_NEW_QUESTION, &payload) {
                rooms.send_to_recipient(&session.id, &player_id, event);
            }
        }
    } else {
        let count = correct_answers_of(&answers, None);
        let payload = question_payload(session, question, total, count, timing, now);
        send_room_event(state, &session.id, EVENT_NEW_QUESTION, &payload);
    }
    Ok(())
}

/// Push the reveal of a resolved round: one verdict per player, then the room-wide result.
pub async fn push_reveal(
    state: &SharedState,
    store: &dyn SessionStore,
    session: &SessionEntity,
    question: &QuestionEntity,
    remaining: Duration,
) -> Result<(), ServiceError> {
    let result = reveal_payload(question, remaining)?;
    let answers = store.list_answers(session.id.clone()).await?;
    let rooms = state.rooms();

    if policy_for(session.mode).is_multiplayer() {
        for player_id in rooms.room_members(&session.id) {
            let payload = verdict(&answers, question.id, Some(&player_id));
            if let Some(event) = build_event(EVENT_IS_CORRECT_ANSWER, &payload) {
                rooms.send_to_recipient(&session.id, &player_id, event);
            }
        }
    } else {
        let payload = verdict(&answers, question.id, None);
        send_room_event(state, &session.id, EVENT_IS_CORRECT_ANSWER, &payload);
    }
    send_room_event(state, &session.id, EVENT_ANSWER_RESULT, &result);
    Ok(())
}

/// Broadcast the final standings.
pub fn push_finished(state: &SharedState, session_id: &str, payload: &GameFinishedPayload) {
    send_room_event(state, session_id, EVENT_GAME_FINISHED, payload);
}

/// Announce that a session left the lobby.
pub fn push_game_started(state: &SharedState, session_id: &str, total: u32) {
    let payload = GameStartedPayload {
        game_id: session_id.to_owned(),
        nb_questions_total: total,
    };
    send_room_event(state, session_id, EVENT_GAME_STARTED, &payload);
}

/// Broadcast the roster after `player` joined, switched team or left.
pub fn push_roster(
    state: &SharedState,
    event: &str,
    session_id: &str,
    player: &Player,
    teams: &[TeamEntity],
) {
    let payload = roster_payload(session_id, Some(player), teams);
    send_room_event(state, session_id, event, &payload);
}

/// Direct confirmation of a join or team switch.
pub fn joined_game_event(session_id: &str, team_name: &str) -> Option<RoomEvent> {
    build_event(
        EVENT_JOINED_GAME,
        &JoinedGamePayload {
            game_id: session_id.to_owned(),
            team_name: team_name.to_owned(),
        },
    )
}

/// Direct reply carrying a refusal message.
pub fn error_event(message: String) -> Option<RoomEvent> {
    build_event(EVENT_ERROR, &ErrorPayload { message })
}

fn roster_payload(session_id: &str, player: Option<&Player>, teams: &[TeamEntity]) -> RosterPayload {
    RosterPayload {
        game_id: session_id.to_owned(),
        player: player.map(|player| MemberSummary::from(&player.as_member())),
        teams: teams.iter().map(TeamSummary::from).collect(),
    }
}

/// What a client must replay to catch up with a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionView {
    /// Still gathering players.
    Lobby(RosterPayload),
    /// A round is open.
    Question(NewQuestionPayload),
    /// Between a reveal and the next question.
    Reveal {
        /// Right answer of the resolved round.
        verdict: IsCorrectAnswerPayload,
        /// Aggregate of the resolved round.
        result: AnswerResultPayload,
    },
    /// Standings of a finished session.
    Finished(GameFinishedPayload),
}

impl SessionView {
    /// Label reported next to the replayed events.
    pub fn phase(&self) -> &'static str {
        match self {
            SessionView::Lobby(_) => "lobby",
            SessionView::Question(_) => "question",
            SessionView::Reveal { .. } => "reveal",
            SessionView::Finished(_) => "finished",
        }
    }

    /// Events in the order a push would have delivered them.
    pub fn into_events(self) -> Vec<RoomEvent> {
        let events = match self {
            SessionView::Lobby(roster) => vec![build_event(EVENT_PLAYER_JOINED, &roster)],
            SessionView::Question(payload) => vec![build_event(EVENT_NEW_QUESTION, &payload)],
            SessionView::Reveal { verdict, result } => vec![
                build_event(EVENT_IS_CORRECT_ANSWER, &verdict),
                build_event(EVENT_ANSWER_RESULT, &result),
            ],
            SessionView::Finished(payload) => vec![build_event(EVENT_GAME_FINISHED, &payload)],
        };
        events.into_iter().flatten().collect()
    }
}

/// Resync read: the view of `session_id` for `player`, from live store state.
pub async fn current_view(
    state: &SharedState,
    session_id: &str,
    player: Option<&Player>,
) -> Result<SessionView, ServiceError> {
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    authorize_participant(store.as_ref(), &session, player).await?;
    build_view(state, store.as_ref(), &session, player).await
}

/// Compute the view of an already loaded session.
pub async fn build_view(
    state: &SharedState,
    store: &dyn SessionStore,
    session: &SessionEntity,
    player: Option<&Player>,
) -> Result<SessionView, ServiceError> {
    let total = store.count_questions(session.quiz_id).await?;
    let player_key = if policy_for(session.mode).is_multiplayer() {
        player.map(|player| player.id.as_str())
    } else {
        None
    };

    match RoundPhase::of(session) {
        RoundPhase::Lobby => {
            let teams = store.list_teams(session.id.clone()).await?;
            Ok(SessionView::Lobby(roster_payload(&session.id, None, &teams)))
        }
        RoundPhase::Finished => {
            let ranking = compute_ranking(store, session).await?;
            Ok(SessionView::Finished(finished_payload(session, total, ranking)))
        }
        RoundPhase::Open { index, .. } => {
            let question = require_question(store, session, index).await?;
            let answers = store.list_answers(session.id.clone()).await?;
            let count = correct_answers_of(&answers, player_key);
            Ok(SessionView::Question(question_payload(
                session,
                &question,
                total,
                count,
                state.config().timing(),
                state.now(),
            )))
        }
        RoundPhase::Revealing { resolved_index } => {
            let question = require_question(store, session, resolved_index).await?;
            let answers = store.list_answers(session.id.clone()).await?;
            let remaining = state.reveals().remaining(&session.id);
            Ok(SessionView::Reveal {
                verdict: verdict(&answers, question.id, player_key),
                result: reveal_payload(&question, remaining)?,
            })
        }
    }
}

/// Final standings payload, including the creator.
pub fn finished_payload(session: &SessionEntity, total: u32, ranking: Ranking) -> GameFinishedPayload {
    GameFinishedPayload {
        nb_questions_total: total,
        quiz_id: session.quiz_id,
        ranking,
    }
}

/// Question `index` of the session's set; its absence is a consistency error.
pub async fn require_question(
    store: &dyn SessionStore,
    session: &SessionEntity,
    index: u32,
) -> Result<QuestionEntity, ServiceError> {
    store
        .find_question(session.quiz_id, index)
        .await?
        .ok_or_else(|| {
            ServiceError::Inconsistent(format!(
                "question {index} of quiz `{}` missing for session `{}`",
                session.quiz_id, session.id
            ))
        })
}

fn build_event(event: &str, payload: &impl Serialize) -> Option<RoomEvent> {
    match RoomEvent::json(event, payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize room event payload");
            None
        }
    }
}

fn send_room_event(state: &SharedState, session_id: &str, event: &str, payload: &impl Serialize) {
    if let Some(event) = build_event(event, payload) {
        state.rooms().send_to_room(session_id, event);
    }
}
