use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoAnswerDocument, MongoQuestionDocument, MongoSessionDocument, MongoTeamDocument,
        answer_key, guarded_filter, member_document, patch_update, status_label,
    },
};
use crate::dao::{
    models::{
        AnswerEntity, MemberEntity, QuestionEntity, SessionEntity, SessionGuard, SessionPatch,
        SessionStatus, TeamEntity,
    },
    session_store::SessionStore,
    storage::{StorageResult, saturating_count},
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const TEAM_COLLECTION_NAME: &str = "teams";
const QUESTION_COLLECTION_NAME: &str = "questions";
const ANSWER_COLLECTION_NAME: &str = "answers";

/// MongoDB-backed [`SessionStore`].
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, mongodb::bson::Document, bool); 4] = [
            (
                ANSWER_COLLECTION_NAME,
                "session_id,question_id,answer_key",
                doc! { "session_id": 1, "question_id": 1, "answer_key": 1 },
                true,
            ),
            (
                QUESTION_COLLECTION_NAME,
                "quiz_id,index",
                doc! { "quiz_id": 1, "index": 1 },
                true,
            ),
            (TEAM_COLLECTION_NAME, "session_id", doc! { "session_id": 1 }, false),
            (SESSION_COLLECTION_NAME, "status", doc! { "status": 1 }, false),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(Some(unique)).build())
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database().await.collection(SESSION_COLLECTION_NAME)
    }

    async fn teams(&self) -> Collection<MongoTeamDocument> {
        self.database().await.collection(TEAM_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<MongoQuestionDocument> {
        self.database().await.collection(QUESTION_COLLECTION_NAME)
    }

    async fn answers(&self) -> Collection<MongoAnswerDocument> {
        self.database().await.collection(ANSWER_COLLECTION_NAME)
    }

    async fn create_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id.clone();
        let document: MongoSessionDocument = session.into();
        self.sessions()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::Duplicate {
                        message: format!("session `{id}` already exists"),
                    }
                } else {
                    MongoDaoError::WriteSession { id: id.clone(), source }
                }
            })?;
        Ok(())
    }

    async fn get_session(&self, id: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        document.map(SessionEntity::try_from).transpose()
    }

    async fn update_session(
        &self,
        id: String,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one_and_update(
                guarded_filter(&id, &guard),
                patch_update(&patch, SystemTime::now()),
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::WriteSession { id, source })?;
        document.map(SessionEntity::try_from).transpose()
    }

    async fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> MongoResult<Vec<SessionEntity>> {
        let label = status_label(status);
        let documents: Vec<MongoSessionDocument> = self
            .sessions()
            .await
            .find(doc! { "status": label })
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: label.to_owned(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: label.to_owned(),
                source,
            })?;
        documents.into_iter().map(SessionEntity::try_from).collect()
    }

    async fn create_team(&self, team: TeamEntity) -> MongoResult<()> {
        let id = team.id.to_string();
        let document: MongoTeamDocument = team.into();
        self.teams()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::WriteTeam { id, source })?;
        Ok(())
    }

    async fn list_teams(&self, session_id: String) -> MongoResult<Vec<TeamEntity>> {
        let documents: Vec<MongoTeamDocument> = self
            .teams()
            .await
            .find(doc! { "session_id": session_id.as_str() })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: session_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: session_id.clone(),
                source,
            })?;
        documents.into_iter().map(TeamEntity::try_from).collect()
    }

    async fn add_member(&self, team_id: Uuid, member: MemberEntity) -> MongoResult<()> {
        let id = team_id.to_string();
        let teams = self.teams().await;
        let team = teams
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|source| MongoDaoError::WriteTeam {
                id: id.clone(),
                source,
            })?
            .map(TeamEntity::try_from)
            .transpose()?
            .ok_or_else(|| MongoDaoError::Duplicate {
                message: format!("team `{id}` does not exist"),
            })?;

        let holding = teams
            .count_documents(doc! {
                "session_id": team.session_id.as_str(),
                "members.player_id": member.player_id.as_str(),
            })
            .await
            .map_err(|source| MongoDaoError::WriteTeam {
                id: id.clone(),
                source,
            })?;
        if holding > 0 {
            return Err(MongoDaoError::Duplicate {
                message: format!(
                    "player `{}` already belongs to a team of session `{}`",
                    member.player_id, team.session_id
                ),
            });
        }

        teams
            .update_one(
                doc! { "_id": id.as_str(), "members.player_id": { "$ne": member.player_id.as_str() } },
                doc! { "$push": { "members": member_document(&member) } },
            )
            .await
            .map_err(|source| MongoDaoError::WriteTeam { id, source })?;
        Ok(())
    }

    async fn remove_member(&self, session_id: String, player_id: String) -> MongoResult<bool> {
        let result = self
            .teams()
            .await
            .update_many(
                doc! { "session_id": session_id.as_str(), "members.player_id": player_id.as_str() },
                doc! { "$pull": { "members": { "player_id": player_id.as_str() } } },
            )
            .await
            .map_err(|source| MongoDaoError::WriteTeam {
                id: session_id,
                source,
            })?;
        Ok(result.modified_count > 0)
    }

    async fn count_questions(&self, quiz_id: Uuid) -> MongoResult<u32> {
        let quiz = quiz_id.to_string();
        let count = self
            .questions()
            .await
            .count_documents(doc! { "quiz_id": quiz.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadQuestions {
                quiz_id: quiz,
                source,
            })?;
        Ok(saturating_count(count))
    }

    async fn find_question(&self, quiz_id: Uuid, index: u32) -> MongoResult<Option<QuestionEntity>> {
        let quiz = quiz_id.to_string();
        let document = self
            .questions()
            .await
            .find_one(doc! { "quiz_id": quiz.as_str(), "index": i64::from(index) })
            .await
            .map_err(|source| MongoDaoError::LoadQuestions {
                quiz_id: quiz,
                source,
            })?;
        document.map(QuestionEntity::try_from).transpose()
    }

    async fn create_answer(&self, answer: AnswerEntity) -> MongoResult<()> {
        let session_id = answer.session_id.clone();
        let document: MongoAnswerDocument = answer.into();
        self.answers()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::Duplicate {
                        message: format!("answer already recorded for session `{session_id}`"),
                    }
                } else {
                    MongoDaoError::WriteAnswer {
                        session_id: session_id.clone(),
                        source,
                    }
                }
            })?;
        Ok(())
    }

    async fn find_answer(
        &self,
        session_id: String,
        question_id: Uuid,
        player_id: Option<String>,
    ) -> MongoResult<Option<AnswerEntity>> {
        let document = self
            .answers()
            .await
            .find_one(doc! {
                "session_id": session_id.as_str(),
                "question_id": question_id.to_string(),
                "answer_key": answer_key(player_id.as_deref()),
            })
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { session_id, source })?;
        document.map(AnswerEntity::try_from).transpose()
    }

    async fn count_answers_for_question(
        &self,
        session_id: String,
        question_id: Uuid,
    ) -> MongoResult<u32> {
        let count = self
            .answers()
            .await
            .count_documents(doc! {
                "session_id": session_id.as_str(),
                "question_id": question_id.to_string(),
            })
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { session_id, source })?;
        Ok(saturating_count(count))
    }

    async fn list_answers(&self, session_id: String) -> MongoResult<Vec<AnswerEntity>> {
        let documents: Vec<MongoAnswerDocument> = self
            .answers()
            .await
            .find(doc! { "session_id": session_id.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadAnswers {
                session_id: session_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAnswers {
                session_id: session_id.clone(),
                source,
            })?;
        documents.into_iter().map(AnswerEntity::try_from).collect()
    }
}

impl SessionStore for MongoSessionStore {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_session(session).await.map_err(Into::into) })
    }

    fn get_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_session(id).await.map_err(Into::into) })
    }

    fn update_session(
        &self,
        id: String,
        guard: SessionGuard,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_session(id, guard, patch)
                .await
                .map_err(Into::into)
        })
    }

    fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_sessions_with_status(status)
                .await
                .map_err(Into::into)
        })
    }

    fn create_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_team(team).await.map_err(Into::into) })
    }

    fn list_teams(&self, session_id: String) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams(session_id).await.map_err(Into::into) })
    }

    fn add_member(
        &self,
        team_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.add_member(team_id, member).await.map_err(Into::into) })
    }

    fn remove_member(
        &self,
        session_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_member(session_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn count_participants(&self, session_id: String) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move {
            let teams = store.list_teams(session_id).await?;
            let count: usize = teams.iter().map(|team| team.members.len()).sum();
            Ok(saturating_count(count))
        })
    }

    fn count_questions(&self, quiz_id: Uuid) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move { store.count_questions(quiz_id).await.map_err(Into::into) })
    }

    fn find_question(
        &self,
        quiz_id: Uuid,
        index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question(quiz_id, index).await.map_err(Into::into) })
    }

    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_answer(answer).await.map_err(Into::into) })
    }

    fn find_answer(
        &self,
        session_id: String,
        question_id: Uuid,
        player_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_answer(session_id, question_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn count_answers_for_question(
        &self,
        session_id: String,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_answers_for_question(session_id, question_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_answers(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_answers(session_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
