//! In-process session store.
use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerEntity, MemberEntity, QuestionEntity, SessionEntity, SessionGuard, SessionPatch,
        SessionStatus, TeamEntity,
    },
    session_store::SessionStore,
    storage::{StorageError, StorageResult, saturating_count},
};

type AnswerKey = (String, Uuid, Option<String>);

/// Process-local store used for development runs and tests.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, SessionEntity>,
    teams: Vec<TeamEntity>,
    questions: HashMap<Uuid, Vec<QuestionEntity>>,
    answers: Vec<AnswerEntity>,
    answer_keys: HashSet<AnswerKey>,
}

impl InMemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a question set. Questions are kept sorted by index.
    pub async fn insert_questions(&self, questions: impl IntoIterator<Item = QuestionEntity>) {
        let mut tables = self.inner.tables.write().await;
        for question in questions {
            let set = tables.questions.entry(question.quiz_id).or_default();
            set.retain(|existing| existing.index != question.index);
            set.push(question);
            set.sort_by_key(|question| question.index);
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store offline"),
            ));
        }
        Ok(())
    }

    async fn apply_update(
        &self,
        id: &str,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> StorageResult<Option<SessionEntity>> {
        self.ensure_online()?;
        let mut tables = self.inner.tables.write().await;
        let Some(session) = tables.sessions.get_mut(id) else {
            return Ok(None);
        };
        if !guard.matches(session) {
            return Ok(None);
        }
        patch.apply_to(session, SystemTime::now());
        Ok(Some(session.clone()))
    }

    async fn insert_member(&self, team_id: Uuid, member: MemberEntity) -> StorageResult<()> {
        self.ensure_online()?;
        let mut tables = self.inner.tables.write().await;
        let session_id = tables
            .teams
            .iter()
            .find(|team| team.id == team_id)
            .map(|team| team.session_id.clone())
            .ok_or_else(|| StorageError::conflict(format!("team `{team_id}` does not exist")))?;

        let already_member = tables
            .teams
            .iter()
            .any(|team| team.session_id == session_id && team.has_member(&member.player_id));
        if already_member {
            return Err(StorageError::conflict(format!(
                "player `{}` already belongs to a team of session `{session_id}`",
                member.player_id
            )));
        }

        if let Some(team) = tables.teams.iter_mut().find(|team| team.id == team_id) {
            team.members.push(member);
        }
        Ok(())
    }

    async fn insert_answer(&self, answer: AnswerEntity) -> StorageResult<()> {
        self.ensure_online()?;
        let mut tables = self.inner.tables.write().await;
        let key = (
            answer.session_id.clone(),
            answer.question_id,
            answer.player_id().map(str::to_owned),
        );
        if !tables.answer_keys.insert(key) {
            return Err(StorageError::conflict(format!(
                "answer already recorded for question `{}` of session `{}`",
                answer.question_id, answer.session_id
            )));
        }
        tables.answers.push(answer);
        Ok(())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            if tables.sessions.contains_key(&session.id) {
                return Err(StorageError::conflict(format!(
                    "session `{}` already exists",
                    session.id
                )));
            }
            tables.sessions.insert(session.id.clone(), session);
            Ok(())
        })
    }

    fn get_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.tables.read().await.sessions.get(&id).cloned())
        })
    }

    fn update_session(
        &self,
        id: String,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.apply_update(&id, guard, patch).await })
    }

    fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .sessions
                .values()
                .filter(|session| session.status == status)
                .cloned()
                .collect())
        })
    }

    fn create_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.inner.tables.write().await.teams.push(team);
            Ok(())
        })
    }

    fn list_teams(&self, session_id: String) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .teams
                .iter()
                .filter(|team| team.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn add_member(
        &self,
        team_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_member(team_id, member).await })
    }

    fn remove_member(
        &self,
        session_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            let mut removed = false;
            for team in tables
                .teams
                .iter_mut()
                .filter(|team| team.session_id == session_id)
            {
                let before = team.members.len();
                team.members.retain(|member| member.player_id != player_id);
                removed |= team.members.len() != before;
            }
            Ok(removed)
        })
    }

    fn count_participants(&self, session_id: String) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let count = tables
                .teams
                .iter()
                .filter(|team| team.session_id == session_id)
                .map(|team| team.members.len())
                .sum::<usize>();
            Ok(saturating_count(count))
        })
    }

    fn count_questions(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let count = tables.questions.get(&quiz_id).map_or(0, Vec::len);
            Ok(saturating_count(count))
        })
    }

    fn find_question(
        &self,
        quiz_id: Uuid,
        index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables.questions.get(&quiz_id).and_then(|set| {
                set.iter()
                    .find(|question| question.index == index)
                    .cloned()
            }))
        })
    }

    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer(answer).await })
    }

    fn find_answer(
        &self,
        session_id: String,
        question_id: Uuid,
        player_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .answers
                .iter()
                .find(|answer| {
                    answer.session_id == session_id
                        && answer.question_id == question_id
                        && answer.player_id() == player_id.as_deref()
                })
                .cloned())
        })
    }

    fn count_answers_for_question(
        &self,
        session_id: String,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let count = tables
                .answers
                .iter()
                .filter(|answer| answer.session_id == session_id && answer.question_id == question_id)
                .count();
            Ok(saturating_count(count))
        })
    }

    fn list_answers(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .answers
                .iter()
                .filter(|answer| answer.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(session_id: &str, question_id: Uuid, player: Option<&str>) -> AnswerEntity {
        AnswerEntity {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            question_id,
            option_id: Uuid::new_v4(),
            is_correct: false,
            player: player.map(|id| MemberEntity {
                player_id: id.into(),
                username: id.into(),
            }),
            answered_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_answer_key_is_a_conflict() {
        let store = InMemorySessionStore::new();
        let question = Uuid::new_v4();
        store
            .create_answer(answer("GAAAAAAA", question, Some("p1")))
            .await
            .unwrap();
        store
            .create_answer(answer("GAAAAAAA", question, Some("p2")))
            .await
            .unwrap();

        let err = store
            .create_answer(answer("GAAAAAAA", question, Some("p1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(
            store
                .count_answers_for_question("GAAAAAAA".into(), question)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn solo_answers_are_keyed_by_session() {
        let store = InMemorySessionStore::new();
        let question = Uuid::new_v4();
        store
            .create_answer(answer("GASOLO01", question, None))
            .await
            .unwrap();
        assert!(
            store
                .create_answer(answer("GASOLO01", question, None))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn player_cannot_hold_two_teams_of_one_session() {
        let store = InMemorySessionStore::new();
        let red = TeamEntity::new("GATEAM01", "red");
        let blue = TeamEntity::new("GATEAM01", "blue");
        store.create_team(red.clone()).await.unwrap();
        store.create_team(blue.clone()).await.unwrap();

        let member = MemberEntity {
            player_id: "p1".into(),
            username: "alice".into(),
        };
        store.add_member(red.id, member.clone()).await.unwrap();
        assert!(store.add_member(blue.id, member).await.is_err());
        assert_eq!(store.count_participants("GATEAM01".into()).await.unwrap(), 1);

        assert!(
            store
                .remove_member("GATEAM01".into(), "p1".into())
                .await
                .unwrap()
        );
        assert_eq!(store.count_participants("GATEAM01".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemorySessionStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
