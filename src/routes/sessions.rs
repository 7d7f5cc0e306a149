//! HTTP handlers for session lifecycle, answers and standings.
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        events::{EventFrame, JoinedGamePayload, Ranking, SessionStateResponse},
        session::{
            AnswerResponse, InitSessionRequest, JoinSessionRequest, SessionSummary,
            SubmitAnswerRequest, SwitchTeamRequest,
        },
    },
    error::AppError,
    extractors::Identity,
    services::{
        answer_service, room_events,
        session_service::{self, JoinReceipt},
    },
    state::SharedState,
};

/// Routes driving a session from creation to its final ranking.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(init_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/switch", post(switch_team))
        .route("/sessions/{id}/leave", post(leave_session))
        .route("/sessions/{id}/answers", post(submit_answer))
        .route("/sessions/{id}/state", get(session_state))
        .route("/sessions/{id}/ranking", get(session_ranking))
}

/// Open a session on a question set.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = InitSessionRequest,
    responses(
        (status = 200, description = "Session created", body = SessionSummary),
        (status = 400, description = "Invalid settings for the requested mode"),
        (status = 401, description = "Multiplayer sessions need an identity"),
        (status = 404, description = "Unknown or empty question set")
    )
)]
pub async fn init_session(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<InitSessionRequest>>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::init_session(&state, identity.player(), payload).await?;
    Ok(Json(summary))
}

/// Summary of a session by join code.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::session_summary(&state, &id).await?;
    Ok(Json(summary))
}

/// Start a pending multiplayer session; only its creator may do so.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    responses(
        (status = 204, description = "Session started and question 1 dispatched"),
        (status = 403, description = "Caller is not the creator"),
        (status = 409, description = "Already started or roster incomplete")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    session_service::start_session(&state, identity.player(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a pending session; team sessions need a team name.
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Joined", body = JoinedGamePayload),
        (status = 409, description = "Already joined, full or already started")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<JoinedGamePayload>, AppError> {
    let receipt = session_service::join_session(
        &state,
        identity.player(),
        &id,
        payload.team_name.as_deref(),
    )
    .await?;
    Ok(Json(joined(id, receipt)))
}

/// Move to another team while the session is pending.
#[utoipa::path(
    post,
    path = "/sessions/{id}/switch",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    request_body = SwitchTeamRequest,
    responses(
        (status = 200, description = "Team switched", body = JoinedGamePayload),
        (status = 400, description = "Unknown team or not a team session")
    )
)]
pub async fn switch_team(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<SwitchTeamRequest>>,
) -> Result<Json<JoinedGamePayload>, AppError> {
    let receipt =
        session_service::switch_team(&state, identity.player(), &id, &payload.team_name).await?;
    Ok(Json(joined(id, receipt)))
}

/// Leave a pending session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/leave",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    responses(
        (status = 204, description = "Left the session"),
        (status = 403, description = "Caller is not part of the session")
    )
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    session_service::leave_session(&state, identity.player(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer the open question. Solo sessions get the verdict and move on right away.
#[utoipa::path(
    post,
    path = "/sessions/{id}/answers",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerResponse),
        (status = 400, description = "Wrong question, option or timing"),
        (status = 409, description = "Already answered or session finished")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    let receipt = answer_service::submit_answer(
        &state,
        &id,
        identity.player(),
        payload.question_index,
        payload.option_index,
    )
    .await?;
    Ok(Json(AnswerResponse {
        is_correct: receipt.is_correct,
        correct_option_index: receipt.correct_option_index,
    }))
}

/// Everything a reconnecting client has to replay.
#[utoipa::path(
    get,
    path = "/sessions/{id}/state",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Current view", body = SessionStateResponse),
        (status = 403, description = "Caller is not part of the session")
    )
)]
pub async fn session_state(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<SessionStateResponse>, AppError> {
    let view = room_events::current_view(&state, &id, identity.player()).await?;
    Ok(Json(SessionStateResponse {
        phase: view.phase().to_owned(),
        events: view.into_events().into_iter().map(EventFrame::from).collect(),
    }))
}

/// Standings so far, or the final ones once finished.
#[utoipa::path(
    get,
    path = "/sessions/{id}/ranking",
    tag = "sessions",
    params(("id" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Current standings", body = Ranking),
        (status = 403, description = "Caller is not part of the session")
    )
)]
pub async fn session_ranking(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Ranking>, AppError> {
    let ranking = session_service::session_ranking(&state, identity.player(), &id).await?;
    Ok(Json(ranking))
}

fn joined(game_id: String, receipt: JoinReceipt) -> JoinedGamePayload {
    JoinedGamePayload {
        game_id,
        team_name: receipt.team_name,
    }
}
