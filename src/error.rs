//! Error layers: user rejections, service failures and their HTTP mapping.
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{
    dao::{
        models::{GameMode, SessionStatus},
        storage::StorageError,
    },
    state::lifecycle::{InvalidTransition, SessionEvent},
};

/// Message shown to clients when a request failed for reasons they cannot act on.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// User errors: the request was refused and the session left untouched.
///
/// Each message is rendered verbatim by clients, so variants stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The answer targets a question other than the open one.
    #[error("Question's index invalid")]
    InvalidQuestionIndex,
    /// The session is still pending.
    #[error("Game not started")]
    NotStarted,
    /// Every question was played.
    #[error("Game is finished")]
    Finished,
    /// The session left `pending` already.
    #[error("Game has already started.")]
    AlreadyStarted,
    /// Between rounds; the next question has not been dispatched.
    #[error("The next question is not open yet.")]
    RoundNotOpen,
    /// The option does not exist on the question.
    #[error("Invalid option index")]
    InvalidOption,
    /// This player already answered the question.
    #[error("Player has already answered this question")]
    AlreadyAnswered,
    /// The round's time ran out.
    #[error("Timeout exceeded for this question")]
    TimeoutExceeded,
    /// Only the creator may do this.
    #[error("Only the game creator can start the game.")]
    NotOwner,
    /// The caller is not on any team of the session.
    #[error("You are not part of this game.")]
    NotMember,
    /// A scrum session needs its full quota before starting.
    #[error("The number of players was not reached. ({current}/{required})")]
    QuotaNotReached {
        /// Players currently joined.
        current: u32,
        /// Configured quota.
        required: u32,
    },
    /// A team session needs two teams with players before starting.
    #[error("At least two teams need a player to start the game. ({ready}/2)")]
    NotEnoughTeams {
        /// Teams with at least one player.
        ready: u32,
    },
    /// The player is already on a team of the session.
    #[error("You have already joined this game.")]
    AlreadyJoined,
    /// The scrum quota is already met.
    #[error("Scrum game is full.")]
    SessionFull,
    /// No team of the session has that name.
    #[error("Team not found for this game.")]
    UnknownTeam,
    /// Team mode joins need a team name.
    #[error("The Team name is required to join a game with Team mode.")]
    TeamNameRequired,
    /// The mode has no such action.
    #[error("The {mode} game mode does not support the {action} action.")]
    UnsupportedAction {
        /// Mode of the session.
        mode: GameMode,
        /// Action that was attempted.
        action: &'static str,
    },
    /// The action needs an identity.
    #[error("You have to be authenticated to {0}.")]
    AuthenticationRequired(&'static str),
}

impl From<InvalidTransition> for Rejection {
    fn from(err: InvalidTransition) -> Self {
        match (err.from, err.event) {
            (SessionStatus::Finished, _) => Rejection::Finished,
            (SessionStatus::Pending, SessionEvent::Exhausted) => Rejection::NotStarted,
            (_, SessionEvent::Start) => Rejection::AlreadyStarted,
            (SessionStatus::Started, SessionEvent::Exhausted) => Rejection::Finished,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller's request was refused.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// Stored data contradicts itself; the round is left as it is.
    #[error("inconsistent session data: {0}")]
    Inconsistent(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A concurrent write claimed the same unique key.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Message safe to hand back to the caller.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::Rejected(rejection) => rejection.to_string(),
            ServiceError::Inconsistent(_) => INTERNAL_ERROR_MESSAGE.to_owned(),
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                "Service temporarily unavailable".to_owned()
            }
            ServiceError::InvalidInput(message)
            | ServiceError::Conflict(message)
            | ServiceError::NotFound(message) => message.clone(),
        }
    }

    /// Log errors the caller did not cause.
    pub fn log(&self, action: &str) {
        match self {
            ServiceError::Inconsistent(_) => error!(action, error = %self, "consistency error"),
            ServiceError::Unavailable(source) => {
                error!(action, error = %source, "storage failure")
            }
            _ => {}
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::Conflict(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::Rejected(err.into())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Missing identity.
    #[error("{0}")]
    Unauthorized(String),
    /// Identity known but not allowed.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        err.log("http");
        let message = err.client_message();
        match err {
            ServiceError::Rejected(rejection) => match rejection {
                Rejection::AuthenticationRequired(_) => AppError::Unauthorized(message),
                Rejection::NotOwner | Rejection::NotMember => AppError::Forbidden(message),
                Rejection::AlreadyAnswered
                | Rejection::AlreadyJoined
                | Rejection::AlreadyStarted
                | Rejection::Finished
                | Rejection::SessionFull
                | Rejection::QuotaNotReached { .. }
                | Rejection::NotEnoughTeams { .. } => AppError::Conflict(message),
                _ => AppError::BadRequest(message),
            },
            ServiceError::Inconsistent(_) => AppError::Internal(message),
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                AppError::ServiceUnavailable(message)
            }
            ServiceError::InvalidInput(_) => AppError::BadRequest(message),
            ServiceError::Conflict(_) => AppError::Conflict(message),
            ServiceError::NotFound(_) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
