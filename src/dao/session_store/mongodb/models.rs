use std::time::SystemTime;

use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    AnswerEntity, GameMode, MemberEntity, OptionEntity, QuestionEntity, SessionEntity,
    SessionGuard, SessionPatch, SessionStatus, TeamEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    owner_id: Option<String>,
    mode: GameMode,
    status: SessionStatus,
    current_question_index: i64,
    question_start_time: Option<DateTime>,
    difficulty: Option<String>,
    max_players: Option<i64>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id.to_string(),
            owner_id: value.owner_id,
            mode: value.mode,
            status: value.status,
            current_question_index: i64::from(value.current_question_index),
            question_start_time: value.question_start_time.map(DateTime::from_system_time),
            difficulty: value.difficulty,
            max_players: value.max_players.map(i64::from),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoSessionDocument> for SessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            quiz_id: parse_uuid(&value.quiz_id)?,
            current_question_index: to_u32(value.current_question_index)?,
            max_players: value.max_players.map(to_u32).transpose()?,
            id: value.id,
            owner_id: value.owner_id,
            mode: value.mode,
            status: value.status,
            question_start_time: value.question_start_time.map(DateTime::to_system_time),
            difficulty: value.difficulty,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: String,
    session_id: String,
    name: String,
    members: Vec<MemberEntity>,
    created_at: DateTime,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id.to_string(),
            session_id: value.session_id,
            name: value.name,
            members: value.members,
            created_at: DateTime::now(),
        }
    }
}

impl TryFrom<MongoTeamDocument> for TeamEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoTeamDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&value.id)?,
            session_id: value.session_id,
            name: value.name,
            members: value.members,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoOptionDocument {
    id: String,
    index: i64,
    content: String,
    is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    index: i64,
    text: String,
    difficulty: String,
    category: String,
    question_type: String,
    options: Vec<MongoOptionDocument>,
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuestionDocument) -> Result<Self, Self::Error> {
        let options = value
            .options
            .into_iter()
            .map(|option| {
                Ok(OptionEntity {
                    id: parse_uuid(&option.id)?,
                    index: to_u32(option.index)?,
                    content: option.content,
                    is_correct: option.is_correct,
                })
            })
            .collect::<Result<Vec<_>, MongoDaoError>>()?;

        Ok(Self {
            id: parse_uuid(&value.id)?,
            quiz_id: parse_uuid(&value.quiz_id)?,
            index: to_u32(value.index)?,
            text: value.text,
            difficulty: value.difficulty,
            category: value.category,
            question_type: value.question_type,
            options,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    #[serde(rename = "_id")]
    id: String,
    session_id: String,
    question_id: String,
    option_id: String,
    is_correct: bool,
    player: Option<MemberEntity>,
    /// Player id, or empty for solo sessions; backs the unique answer index.
    answer_key: String,
    answered_at: DateTime,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            answer_key: answer_key(value.player_id()),
            id: value.id.to_string(),
            session_id: value.session_id,
            question_id: value.question_id.to_string(),
            option_id: value.option_id.to_string(),
            is_correct: value.is_correct,
            player: value.player,
            answered_at: DateTime::from_system_time(value.answered_at),
        }
    }
}

impl TryFrom<MongoAnswerDocument> for AnswerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoAnswerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&value.id)?,
            session_id: value.session_id,
            question_id: parse_uuid(&value.question_id)?,
            option_id: parse_uuid(&value.option_id)?,
            is_correct: value.is_correct,
            player: value.player,
            answered_at: value.answered_at.to_system_time(),
        })
    }
}

pub fn answer_key(player_id: Option<&str>) -> String {
    player_id.unwrap_or_default().to_owned()
}

pub fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "pending",
        SessionStatus::Started => "started",
        SessionStatus::Finished => "finished",
    }
}

/// Filter selecting a session only while it satisfies `guard`.
pub fn guarded_filter(id: &str, guard: &SessionGuard) -> Document {
    let mut filter = doc! { "_id": id };
    if let Some(status) = guard.status {
        filter.insert("status", status_label(status));
    }
    if let Some(index) = guard.current_question_index {
        filter.insert("current_question_index", i64::from(index));
    }
    match guard.round_open {
        Some(true) => {
            filter.insert("question_start_time", doc! { "$ne": Bson::Null });
        }
        Some(false) => {
            filter.insert("question_start_time", Bson::Null);
        }
        None => {}
    }
    filter
}

/// `$set` update carrying the patched fields.
pub fn patch_update(patch: &SessionPatch, now: SystemTime) -> Document {
    let mut set = doc! { "updated_at": DateTime::from_system_time(now) };
    if let Some(status) = patch.status {
        set.insert("status", status_label(status));
    }
    if let Some(index) = patch.current_question_index {
        set.insert("current_question_index", i64::from(index));
    }
    if let Some(start) = patch.question_start_time {
        let value = match start {
            Some(time) => Bson::DateTime(DateTime::from_system_time(time)),
            None => Bson::Null,
        };
        set.insert("question_start_time", value);
    }
    doc! { "$set": set }
}

pub fn member_document(member: &MemberEntity) -> Document {
    doc! {
        "player_id": member.player_id.clone(),
        "username": member.username.clone(),
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(value).map_err(|err| MongoDaoError::MalformedDocument {
        reason: format!("invalid uuid `{value}`: {err}"),
    })
}

fn to_u32(value: i64) -> Result<u32, MongoDaoError> {
    u32::try_from(value).map_err(|_| MongoDaoError::MalformedDocument {
        reason: format!("value `{value}` does not fit an unsigned index"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_round_guard_matches_null_start_time() {
        let filter = guarded_filter("GAABCDEF", &SessionGuard::round(3, false));
        assert_eq!(filter.get_str("status").unwrap(), "started");
        assert_eq!(filter.get_i64("current_question_index").unwrap(), 3);
        assert_eq!(filter.get("question_start_time"), Some(&Bson::Null));
    }

    #[test]
    fn clearing_the_start_time_writes_null() {
        let update = patch_update(
            &SessionPatch {
                current_question_index: Some(4),
                question_start_time: Some(None),
                ..SessionPatch::default()
            },
            SystemTime::now(),
        );
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("question_start_time"), Some(&Bson::Null));
        assert_eq!(set.get_i64("current_question_index").unwrap(), 4);
        assert!(set.get("status").is_none());
    }
}
