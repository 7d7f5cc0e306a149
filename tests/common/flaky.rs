use std::{
    io,
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use futures::future::BoxFuture;
use quiz_arena_back::dao::{
    models::{
        AnswerEntity, MemberEntity, QuestionEntity, SessionEntity, SessionGuard, SessionPatch,
        SessionStatus, TeamEntity,
    },
    session_store::{SessionStore, memory::InMemorySessionStore},
    storage::{StorageError, StorageResult},
};
use uuid::Uuid;

/// In-memory store that can fail chosen calls or slip in a competing join.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemorySessionStore,
    failing_answer_lists: AtomicU32,
    failing_member_adds: AtomicU32,
    interloper: Mutex<Option<(TeamEntity, MemberEntity)>>,
}

fn outage(what: &str) -> StorageError {
    StorageError::unavailable(
        format!("{what} failed"),
        io::Error::new(io::ErrorKind::TimedOut, "injected"),
    )
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

impl FlakyStore {
    pub fn new(inner: InMemorySessionStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the next `count` answer listings.
    pub fn fail_answer_lists(&self, count: u32) {
        self.failing_answer_lists.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` member insertions.
    pub fn fail_member_adds(&self, count: u32) {
        self.failing_member_adds.store(count, Ordering::SeqCst);
    }

    /// Seat `member` in a fresh team named after them right before the next member insertion,
    /// as a join running concurrently would.
    pub fn interleave_join(&self, session_id: &str, member: MemberEntity) {
        let team = TeamEntity::new(session_id.to_owned(), member.username.clone());
        *self.interloper.lock().unwrap() = Some((team, member));
    }
}

impl SessionStore for FlakyStore {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.create_session(session)
    }

    fn get_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        self.inner.get_session(id)
    }

    fn update_session(
        &self,
        id: String,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        self.inner.update_session(id, guard, patch)
    }

    fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        self.inner.list_sessions_with_status(status)
    }

    fn create_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.create_team(team)
    }

    fn list_teams(&self, session_id: String) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        self.inner.list_teams(session_id)
    }

    fn add_member(
        &self,
        team_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if take_one(&self.failing_member_adds) {
            return Box::pin(async { Err(outage("add_member")) });
        }
        let inner = self.inner.clone();
        let interloper = self.interloper.lock().unwrap().take();
        Box::pin(async move {
            if let Some((team, other)) = interloper {
                inner.create_team(team.clone()).await?;
                inner.add_member(team.id, other).await?;
            }
            inner.add_member(team_id, member).await
        })
    }

    fn remove_member(
        &self,
        session_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.remove_member(session_id, player_id)
    }

    fn count_participants(&self, session_id: String) -> BoxFuture<'static, StorageResult<u32>> {
        self.inner.count_participants(session_id)
    }

    fn count_questions(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<u32>> {
        self.inner.count_questions(quiz_id)
    }

    fn find_question(
        &self,
        quiz_id: Uuid,
        index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        self.inner.find_question(quiz_id, index)
    }

    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.create_answer(answer)
    }

    fn find_answer(
        &self,
        session_id: String,
        question_id: Uuid,
        player_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        self.inner.find_answer(session_id, question_id, player_id)
    }

    fn count_answers_for_question(
        &self,
        session_id: String,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u32>> {
        self.inner.count_answers_for_question(session_id, question_id)
    }

    fn list_answers(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        if take_one(&self.failing_answer_lists) {
            return Box::pin(async { Err(outage("list_answers")) });
        }
        self.inner.list_answers(session_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
