use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::init_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::start_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::switch_team,
        crate::routes::sessions::leave_session,
        crate::routes::sessions::submit_answer,
        crate::routes::sessions::session_state,
        crate::routes::sessions::session_ranking,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::session::InitSessionRequest,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::SwitchTeamRequest,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::AnswerResponse,
            crate::dto::session::SessionSummary,
            crate::dto::ws::ClientMessage,
            crate::dto::events::NewQuestionPayload,
            crate::dto::events::AnswerResultPayload,
            crate::dto::events::IsCorrectAnswerPayload,
            crate::dto::events::GameFinishedPayload,
            crate::dto::events::RosterPayload,
            crate::dto::events::GameStartedPayload,
            crate::dto::events::JoinedGamePayload,
            crate::dto::events::ErrorPayload,
            crate::dto::events::Ranking,
            crate::dto::events::SessionStateResponse,
            crate::dao::models::GameMode,
            crate::dao::models::SessionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle, answers and standings"),
        (name = "players", description = "WebSocket channel for players"),
    )
)]
/// OpenAPI document for the HTTP surface.
pub struct ApiDoc;
