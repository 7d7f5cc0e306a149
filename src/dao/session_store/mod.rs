/// Process-local store for development and tests.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerEntity, MemberEntity, QuestionEntity, SessionEntity, SessionGuard, SessionPatch,
        SessionStatus, TeamEntity,
    },
    storage::StorageResult,
};

/// Abstraction over the persistence layer for sessions, teams, questions and answers.
///
/// Every operation is atomic at the single-record level; the engine never relies on
/// multi-record transactions.
pub trait SessionStore: Send + Sync {
    /// Insert a new session; fails with a conflict when the id is taken.
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Session by id.
    fn get_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Write `patch` if the stored session still satisfies `guard`.
    ///
    /// Returns the updated session, or `None` when the session is missing or the guard
    /// did not match.
    fn update_session(
        &self,
        id: String,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Every session currently in `status`.
    fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>>;

    /// Insert a team; fails with a conflict when its name is taken in the session.
    fn create_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Teams of a session in creation order.
    fn list_teams(&self, session_id: String) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Append a member to a team. Fails with a conflict when the player already belongs
    /// to a team of the same session.
    fn add_member(
        &self,
        team_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a player from whichever team of the session holds them.
    fn remove_member(
        &self,
        session_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Number of players across every team of the session.
    fn count_participants(&self, session_id: String) -> BoxFuture<'static, StorageResult<u32>>;

    /// Number of questions in a question set.
    fn count_questions(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<u32>>;
    /// Question at 0-based `index` of a question set.
    fn find_question(
        &self,
        quiz_id: Uuid,
        index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;

    /// Record an answer. Fails with a conflict when the (session, question, player) key
    /// already exists.
    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Answer recorded for a question, keyed by player for multiplayer sessions.
    fn find_answer(
        &self,
        session_id: String,
        question_id: Uuid,
        player_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>>;
    /// Number of distinct answerers for a question.
    fn count_answers_for_question(
        &self,
        session_id: String,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u32>>;
    /// Every answer recorded for the session.
    fn list_answers(&self, session_id: String)
    -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;

    /// Cheap round trip to the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after an outage.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
