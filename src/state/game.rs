//! Player identity, difficulty tiers and the round phase derived from a stored session.
use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::dao::models::{MemberEntity, SessionEntity, SessionStatus};

/// Identifier of a session, doubling as the join code players type in.
pub type SessionId = String;
/// Opaque player identifier issued by the authentication gateway.
pub type PlayerId = String;

const SESSION_CODE_PREFIX: &str = "GA";
const SESSION_CODE_LEN: usize = 6;
const SESSION_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Authenticated caller attached to an inbound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Gateway-issued identifier.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
}

impl Player {
    /// Player from raw parts.
    pub fn new(id: impl Into<PlayerId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }

    /// Roster entry for this player.
    pub fn as_member(&self) -> MemberEntity {
        MemberEntity {
            player_id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Difficulty tiers that drive question durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    /// Longest question duration.
    Easy,
    /// Middle question duration.
    Medium,
    /// Shortest question duration.
    Hard,
}

impl Difficulty {
    /// Parse a stored tier label; anything unrecognized plays as easy.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }
}

/// Where a session stands, derived purely from its persisted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Players are gathering, or the first question has not been dispatched yet.
    Lobby,
    /// The round at `index` accepts answers.
    Open {
        /// 0-based index of the open question.
        index: u32,
        /// Wall time the question was dispatched at.
        started_at: SystemTime,
    },
    /// The round at `resolved_index` was resolved and the next one is not open yet.
    Revealing { resolved_index: u32 },
    /// Every question was played.
    Finished,
}

impl RoundPhase {
    /// Phase of a stored session.
    pub fn of(session: &SessionEntity) -> Self {
        match session.status {
            SessionStatus::Pending => RoundPhase::Lobby,
            SessionStatus::Finished => RoundPhase::Finished,
            SessionStatus::Started => match session.question_start_time {
                Some(started_at) => RoundPhase::Open {
                    index: session.current_question_index,
                    started_at,
                },
                None => match session.current_question_index.checked_sub(1) {
                    Some(resolved_index) => RoundPhase::Revealing { resolved_index },
                    None => RoundPhase::Lobby,
                },
            },
        }
    }
}

/// Convert an internal 0-based question index to its 1-based wire form.
pub fn to_wire_index(index: u32) -> u32 {
    index + 1
}

/// Convert a 1-based wire index to the internal 0-based form.
pub fn from_wire_index(wire: u32) -> Option<u32> {
    wire.checked_sub(1)
}

/// Time spent since a round opened, zero if the clock went backwards.
pub fn elapsed_since(started_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(started_at).unwrap_or_default()
}

/// Time left in a round of length `limit`.
pub fn time_available(started_at: SystemTime, limit: Duration, now: SystemTime) -> Duration {
    limit.saturating_sub(elapsed_since(started_at, now))
}

/// Generate a random join code such as `GA7K2Q9X`.
pub fn generate_session_code() -> SessionId {
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_CODE_LEN)
        .map(|_| {
            let index = rng.random_range(0..SESSION_CODE_CHARSET.len());
            char::from(SESSION_CODE_CHARSET[index])
        })
        .collect();
    format!("{SESSION_CODE_PREFIX}{suffix}")
}

/// Whether `code` has the join code shape.
pub fn is_session_code(code: &str) -> bool {
    code.len() == SESSION_CODE_PREFIX.len() + SESSION_CODE_LEN
        && code.starts_with(SESSION_CODE_PREFIX)
        && code[SESSION_CODE_PREFIX.len()..]
            .bytes()
            .all(|byte| SESSION_CODE_CHARSET.contains(&byte))
}
