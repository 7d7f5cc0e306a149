//! REST requests and summaries around a session's lifecycle.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameMode, MemberEntity, SessionEntity, SessionStatus, TeamEntity},
    dto::{format_system_time, validation::validate_team_names},
    state::game::to_wire_index,
};

/// Payload used to open a new session on a question set.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct InitSessionRequest {
    /// Question set to play.
    pub quiz_id: Uuid,
    /// Game mode.
    pub mode: GameMode,
    /// Difficulty tier (`easy`, `medium`, `hard`) for team and timed solo play.
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub difficulty_level: Option<String>,
    /// Participant quota, scrum only.
    #[serde(default)]
    #[validate(range(min = 2, max = 50))]
    pub max_players: Option<u32>,
    /// Team names declared up front, team mode only.
    #[serde(default)]
    #[validate(custom(function = "validate_team_names"))]
    pub teams: Vec<String>,
}

/// Payload used to join a pending session.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    /// Target team, required in team mode.
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub team_name: Option<String>,
}

/// Payload used to move to another team of a pending team session.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SwitchTeamRequest {
    /// Team to move to.
    #[validate(length(min = 1, max = 64))]
    pub team_name: String,
}

/// Answer to the open question.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// 1-based index of the question being answered.
    #[validate(range(min = 1))]
    pub question_index: u32,
    /// Stored 0-based option position, as received in `newQuestion`.
    pub option_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
/// Verdict returned to the submitter.
pub struct AnswerResponse {
    /// Whether the chosen option was right.
    pub is_correct: bool,
    /// Display position of the right option.
    pub correct_option_index: u32,
}

/// Player as listed in a team roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemberSummary {
    /// Stable player identifier.
    pub player_id: String,
    /// Display name.
    pub username: String,
}

impl From<&MemberEntity> for MemberSummary {
    fn from(member: &MemberEntity) -> Self {
        Self {
            player_id: member.player_id.clone(),
            username: member.username.clone(),
        }
    }
}

/// Team with its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamSummary {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Members in join order.
    pub members: Vec<MemberSummary>,
}

impl From<&TeamEntity> for TeamSummary {
    fn from(team: &TeamEntity) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            members: team.members.iter().map(MemberSummary::from).collect(),
        }
    }
}

/// Snapshot of a session returned by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Join code.
    pub id: String,
    /// Game mode.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Question set played.
    pub quiz_id: Uuid,
    /// 1-based index of the question being played or about to be played.
    pub current_question: u32,
    /// Number of questions in the set.
    pub nb_questions_total: u32,
    /// Difficulty tier for timed play.
    pub difficulty_level: Option<String>,
    /// Participant quota for scrum.
    pub max_players: Option<u32>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Teams with their rosters.
    pub teams: Vec<TeamSummary>,
}

impl SessionSummary {
    /// Summarize `session` for a question set of `total` questions.
    pub fn new(session: &SessionEntity, total: u32, teams: &[TeamEntity]) -> Self {
        Self {
            id: session.id.clone(),
            mode: session.mode,
            status: session.status,
            quiz_id: session.quiz_id,
            current_question: to_wire_index(session.current_question_index).min(total),
            nb_questions_total: total,
            difficulty_level: session.difficulty.clone(),
            max_players: session.max_players,
            created_at: format_system_time(session.created_at),
            teams: teams.iter().map(TeamSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    fn request(body: serde_json::Value) -> InitSessionRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn init_request_defaults_optional_fields() {
        let parsed = request(serde_json::json!({
            "quiz_id": Uuid::nil(),
            "mode": "standard",
        }));
        assert_eq!(parsed.mode, GameMode::SoloUntimed);
        assert!(parsed.teams.is_empty());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn scrum_quota_is_bounded() {
        let parsed = request(serde_json::json!({
            "quiz_id": Uuid::nil(),
            "mode": "scrum",
            "max_players": 51,
        }));
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn duplicate_team_names_are_invalid() {
        let parsed = request(serde_json::json!({
            "quiz_id": Uuid::nil(),
            "mode": "team",
            "difficulty_level": "easy",
            "teams": ["Red", "Red"],
        }));
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn question_index_is_one_based() {
        let answer = SubmitAnswerRequest {
            question_index: 0,
            option_index: 0,
        };
        assert!(answer.validate().is_err());
    }
}
