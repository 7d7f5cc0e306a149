//! Payloads of the events pushed to session rooms, plus the ranking shapes they carry.
use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::session::{MemberSummary, TeamSummary},
    state::RoomEvent,
};

/// Option as shown to players; the correct flag never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OptionPayload {
    /// Stored 0-based position, sent back unchanged when answering.
    pub option_index: u32,
    /// Text shown to players.
    pub option_content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Pushed when a round opens, and replayed on resync while it is open.
pub struct NewQuestionPayload {
    /// Always `false`; kept for clients that branch on it.
    pub game_finished: bool,
    /// Question text.
    pub question_text: String,
    /// Options in display order.
    pub options: Vec<OptionPayload>,
    /// 1-based.
    pub question_index: u32,
    /// Number of questions in the session.
    pub nb_questions_total: u32,
    /// Correct answers of the recipient so far (of the session for solo play).
    pub correct_answers_nb: u32,
    /// Question type label.
    pub question_type: String,
    /// Difficulty tier label.
    pub question_difficulty: String,
    /// Category label.
    pub question_category: String,
    /// Question set being played.
    pub quiz_id: Uuid,
    /// Seconds allotted to the round, absent for untimed play.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    /// Seconds left in the round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_available: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Room-wide reveal of a resolved round.
pub struct AnswerResultPayload {
    /// 1-based index of the resolved question.
    pub question_index: u32,
    /// Display position of the right option.
    pub correct_option_index: u32,
    /// Milliseconds left in the reveal window.
    pub time_remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
/// Personal verdict sent alongside a reveal.
pub struct IsCorrectAnswerPayload {
    /// Whether the recipient answered correctly.
    pub is_correct: bool,
}

/// Score line of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerScore {
    /// Display name.
    pub username: String,
    /// Correct answers.
    pub score: u32,
}

/// Totals of one team.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TeamScore {
    /// Mean score across the current members.
    pub average_score: f64,
    /// Sum of member scores.
    pub total_score: u32,
    /// Member scores, highest first.
    pub members: Vec<PlayerScore>,
}

/// Score of a solo session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct SoloScore {
    /// Correct answers of the session.
    pub correct_answers_nb: u32,
}

/// Final standings; the shape depends on the game mode.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Ranking {
    /// Solo session score.
    Solo(SoloScore),
    /// Players sorted by descending score.
    Players(Vec<PlayerScore>),
    /// Team name to its totals, in ranking order.
    Teams(IndexMap<String, TeamScore>),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Pushed once when a session reaches `finished`, and replayed on resync afterwards.
pub struct GameFinishedPayload {
    /// Number of questions played.
    pub nb_questions_total: u32,
    /// Question set played.
    pub quiz_id: Uuid,
    /// Final standings.
    pub ranking: Ranking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Roster update broadcast on join, team switch and leave.
pub struct RosterPayload {
    /// Join code of the session.
    pub game_id: String,
    /// Player whose move triggered the update; absent on a lobby resync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<MemberSummary>,
    /// Every team with its members.
    pub teams: Vec<TeamSummary>,
}

/// Broadcast when the creator starts the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GameStartedPayload {
    /// Join code of the session.
    pub game_id: String,
    /// Number of questions to play.
    pub nb_questions_total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Sent to the joining connection only.
pub struct JoinedGamePayload {
    /// Join code of the session.
    pub game_id: String,
    /// Team the player landed in.
    pub team_name: String,
}

/// Rejection reported to a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorPayload {
    /// Human-readable reason.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Event frame as written on the WebSocket.
pub struct EventFrame {
    /// Event name, e.g. `newQuestion`.
    pub event: String,
    /// Event payload.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl From<RoomEvent> for EventFrame {
    fn from(event: RoomEvent) -> Self {
        Self {
            event: event.event,
            data: event.data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Resync answer: the events a client must replay to catch up.
pub struct SessionStateResponse {
    /// `lobby`, `question`, `reveal` or `finished`.
    pub phase: String,
    /// Events in replay order.
    pub events: Vec<EventFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rankings_serialize_without_a_tag() {
        let solo = serde_json::to_value(Ranking::Solo(SoloScore {
            correct_answers_nb: 3,
        }))
        .unwrap();
        assert_eq!(solo, serde_json::json!({ "correct_answers_nb": 3 }));

        let players = serde_json::to_value(Ranking::Players(vec![PlayerScore {
            username: "alice".into(),
            score: 2,
        }]))
        .unwrap();
        assert_eq!(
            players,
            serde_json::json!([{ "username": "alice", "score": 2 }])
        );
    }

    #[test]
    fn untimed_questions_omit_the_countdown() {
        let payload = NewQuestionPayload {
            game_finished: false,
            question_text: "2 + 2?".into(),
            options: vec![],
            question_index: 1,
            nb_questions_total: 3,
            correct_answers_nb: 0,
            question_type: "multiple".into(),
            question_difficulty: "easy".into(),
            question_category: "math".into(),
            quiz_id: Uuid::nil(),
            time_limit: None,
            time_available: None,
        };
        let value = serde_json::to_value(payload).unwrap();
        assert!(value.get("time_limit").is_none());
        assert!(value.get("time_available").is_none());
    }
}
