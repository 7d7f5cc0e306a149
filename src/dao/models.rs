//! Records persisted by the session stores.
//!
//! The engine only reads and writes these shapes; how a backend lays them out is its own concern.
use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Play style of a session. Serialized names are the ones clients already send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum GameMode {
    /// Single player, no countdown.
    #[serde(rename = "standard")]
    SoloUntimed,
    /// Single player racing a per-difficulty countdown.
    #[serde(rename = "time")]
    SoloTimed,
    /// Every participant plays for themselves on a shared question stream.
    #[serde(rename = "scrum")]
    Scrum,
    /// Participants grouped into named teams.
    #[serde(rename = "team")]
    Team,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameMode::SoloUntimed => "standard",
            GameMode::SoloTimed => "time",
            GameMode::Scrum => "scrum",
            GameMode::Team => "team",
        };
        f.write_str(label)
    }
}

/// Lifecycle status persisted with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, waiting for players.
    Pending,
    /// Rounds are being played.
    Started,
    /// Every question was played; terminal.
    Finished,
}

/// Persisted session record, the single mutable shared resource of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Join code (`GA` followed by six upper-case alphanumerics).
    pub id: String,
    /// Question set played by this session.
    pub quiz_id: Uuid,
    /// Creator; `None` for anonymous solo play.
    pub owner_id: Option<String>,
    /// Mode the session was created with.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// 0-based index of the question currently played or about to be played.
    pub current_question_index: u32,
    /// Set while a round is open, cleared when it resolves.
    pub question_start_time: Option<SystemTime>,
    /// Difficulty tier label for timed modes.
    pub difficulty: Option<String>,
    /// Participant quota for scrum sessions.
    pub max_players: Option<u32>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last time a patch was written.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// Whether a round is currently accepting answers.
    pub fn is_round_open(&self) -> bool {
        self.question_start_time.is_some()
    }
}

/// Fields a caller wants to overwrite on a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    /// New lifecycle status.
    pub status: Option<SessionStatus>,
    /// New question index.
    pub current_question_index: Option<u32>,
    /// `Some(None)` clears the start time, `None` leaves it untouched.
    pub question_start_time: Option<Option<SystemTime>>,
}

impl SessionPatch {
    /// Apply the patch onto an in-memory copy of the session.
    pub fn apply_to(&self, session: &mut SessionEntity, now: SystemTime) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(index) = self.current_question_index {
            session.current_question_index = index;
        }
        if let Some(start) = self.question_start_time {
            session.question_start_time = start;
        }
        session.updated_at = now;
    }
}

/// Expected state a session must be in for a patch to be written.
///
/// Stores evaluate the guard and the write as one single-record operation, which is what
/// lets concurrent resolutions of the same round race safely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionGuard {
    /// Required lifecycle status.
    pub status: Option<SessionStatus>,
    /// Required question index.
    pub current_question_index: Option<u32>,
    /// Whether a round must be open (`true`) or closed (`false`).
    pub round_open: Option<bool>,
}

impl SessionGuard {
    /// Guard that always matches.
    pub fn any() -> Self {
        Self::default()
    }

    /// Guard on the lifecycle status only.
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Guard on a started session sitting at `index` with the round open or closed.
    pub fn round(index: u32, round_open: bool) -> Self {
        Self {
            status: Some(SessionStatus::Started),
            current_question_index: Some(index),
            round_open: Some(round_open),
        }
    }

    /// Whether `session` satisfies every condition of the guard.
    pub fn matches(&self, session: &SessionEntity) -> bool {
        self.status.is_none_or(|status| session.status == status)
            && self
                .current_question_index
                .is_none_or(|index| session.current_question_index == index)
            && self
                .round_open
                .is_none_or(|open| session.is_round_open() == open)
    }
}

/// Player identity as stored inside team rosters and answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntity {
    /// Stable player identifier from the identity gateway.
    pub player_id: String,
    /// Display name.
    pub username: String,
}

/// Team belonging to a session; scrum players each get a singleton team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Session the team belongs to.
    pub session_id: String,
    /// Display name; unique within a session.
    pub name: String,
    /// Members in join order.
    pub members: Vec<MemberEntity>,
}

impl TeamEntity {
    /// Build an empty team for a session.
    pub fn new(session_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Whether `player_id` is on this team.
    pub fn has_member(&self, player_id: &str) -> bool {
        self.members.iter().any(|member| member.player_id == player_id)
    }
}

/// Selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntity {
    /// Stable identifier for the option.
    pub id: Uuid,
    /// Position of the option as shown to players.
    pub index: u32,
    /// Text shown to players.
    pub content: String,
    /// Whether this is the right answer.
    pub is_correct: bool,
}

/// Read-only question owned by the authoring subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Question set the question belongs to.
    pub quiz_id: Uuid,
    /// 0-based position inside the question set.
    pub index: u32,
    /// Question text.
    pub text: String,
    /// Difficulty tier label.
    pub difficulty: String,
    /// Category label.
    pub category: String,
    /// Question type label (e.g. `multiple`).
    pub question_type: String,
    /// Options in display order.
    pub options: Vec<OptionEntity>,
}

impl QuestionEntity {
    /// Option at display position `index`.
    pub fn option(&self, index: u32) -> Option<&OptionEntity> {
        self.options.iter().find(|option| option.index == index)
    }

    /// The option flagged correct, if the question data is consistent.
    pub fn correct_option(&self) -> Option<&OptionEntity> {
        self.options.iter().find(|option| option.is_correct)
    }
}

/// Append-only answer fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntity {
    /// Stable identifier for the answer.
    pub id: Uuid,
    /// Session the answer was given in.
    pub session_id: String,
    /// Question answered.
    pub question_id: Uuid,
    /// Option chosen.
    pub option_id: Uuid,
    /// Copied from the chosen option when the answer is recorded.
    pub is_correct: bool,
    /// `None` for solo sessions, where the session itself is the identity.
    pub player: Option<MemberEntity>,
    /// When the answer was recorded.
    pub answered_at: SystemTime,
}

impl AnswerEntity {
    /// Answering player, `None` for solo sessions.
    pub fn player_id(&self) -> Option<&str> {
        self.player.as_ref().map(|member| member.player_id.as_str())
    }
}
