//! Messages players send over the WebSocket.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::validate_session_code;

/// Error raised when an inbound frame cannot be turned into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum ClientMessageError {
    /// The frame is not a known JSON message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The message failed validation.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a pending session.
    JoinGame {
        /// Join code.
        game_id: String,
        /// Target team, required in team mode.
        #[serde(default)]
        team_name: Option<String>,
    },
    /// Start a pending session; creator only.
    StartGame {
        /// Join code.
        game_id: String,
    },
    /// Answer the open question.
    SendAnswer {
        /// Join code.
        game_id: String,
        /// 1-based.
        question_index: u32,
        /// Stored 0-based option position.
        option_index: u32,
    },
    /// Ask for the current state of a session.
    GetQuestionInformations {
        /// Join code.
        game_id: String,
    },
    /// Move to another team of a pending team session.
    SwitchTeam {
        /// Join code.
        game_id: String,
        /// Team to move to.
        team_name: String,
    },
    /// Leave a pending session.
    LeaveGame {
        /// Join code.
        game_id: String,
    },
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ClientMessageError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Join code the message targets.
    pub fn game_id(&self) -> &str {
        match self {
            ClientMessage::JoinGame { game_id, .. }
            | ClientMessage::StartGame { game_id }
            | ClientMessage::SendAnswer { game_id, .. }
            | ClientMessage::GetQuestionInformations { game_id }
            | ClientMessage::SwitchTeam { game_id, .. }
            | ClientMessage::LeaveGame { game_id } => game_id,
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_session_code(self.game_id()) {
            errors.add("game_id", e);
        }

        if let ClientMessage::SwitchTeam { team_name, .. } = self {
            if team_name.trim().is_empty() {
                errors.add("team_name", validator::ValidationError::new("team_name_empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
