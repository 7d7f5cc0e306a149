#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use quiz_arena_back::{
    config::{AppConfig, TimingConfig},
    dao::{
        models::{GameMode, OptionEntity, QuestionEntity},
        session_store::memory::InMemorySessionStore,
    },
    dto::session::InitSessionRequest,
    services::session_service,
    state::{AppState, ClientConnection, RoomEvent, SharedState, game::Player},
};
use tokio::sync::mpsc;
use uuid::Uuid;

mod flaky;

pub use flaky::FlakyStore;

/// Option index flagged correct on every seeded question.
pub const CORRECT: u32 = 1;
pub const WRONG: u32 = 0;

pub struct Harness {
    pub state: SharedState,
    pub store: Arc<InMemorySessionStore>,
    pub quiz_id: Uuid,
}

impl Harness {
    /// Engine with the built-in timings and a quiz of `questions` questions.
    pub async fn new(questions: u32) -> Self {
        Self::with_timing(questions, TimingConfig::default()).await
    }

    pub async fn with_timing(questions: u32, timing: TimingConfig) -> Self {
        let h = Self::seeded(questions, timing).await;
        h.state.install_store(h.store.clone()).await;
        h
    }

    /// Engine running on a [`FlakyStore`] over the same tables as `store`.
    pub async fn flaky(questions: u32) -> (Self, Arc<FlakyStore>) {
        let h = Self::seeded(questions, TimingConfig::default()).await;
        let flaky = Arc::new(FlakyStore::new(h.store.as_ref().clone()));
        h.state.install_store(flaky.clone()).await;
        (h, flaky)
    }

    async fn seeded(questions: u32, timing: TimingConfig) -> Self {
        let state = AppState::new(AppConfig::new(timing));
        let store = Arc::new(InMemorySessionStore::new());
        let quiz_id = Uuid::new_v4();
        store.insert_questions(quiz(quiz_id, questions)).await;
        Self {
            state,
            store,
            quiz_id,
        }
    }

    pub fn reveal_window(&self) -> Duration {
        self.state.config().timing().reveal_window
    }

    pub async fn create(
        &self,
        creator: Option<&Player>,
        mode: GameMode,
        difficulty: Option<&str>,
        max_players: Option<u32>,
        teams: &[&str],
    ) -> String {
        let request = InitSessionRequest {
            quiz_id: self.quiz_id,
            mode,
            difficulty_level: difficulty.map(str::to_owned),
            max_players,
            teams: teams.iter().map(|name| (*name).to_owned()).collect(),
        };
        session_service::init_session(&self.state, creator, request)
            .await
            .expect("session created")
            .id
    }

    /// Subscribe a fake connection of `player_id` to the session room.
    pub fn listen(&self, session_id: &str, player_id: &str) -> Listener {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .hub()
            .enter(session_id, ClientConnection::new(player_id, tx));
        Listener { rx }
    }
}

pub struct Listener {
    rx: mpsc::UnboundedReceiver<RoomEvent>,
}

impl Listener {
    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn names(events: &[RoomEvent]) -> Vec<&str> {
    events.iter().map(|event| event.event.as_str()).collect()
}

pub fn find<'a>(events: &'a [RoomEvent], name: &str) -> Option<&'a RoomEvent> {
    events.iter().find(|event| event.event == name)
}

pub fn player(id: &str) -> Player {
    Player::new(id, format!("{id}-name"))
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn quiz(quiz_id: Uuid, questions: u32) -> Vec<QuestionEntity> {
    (0..questions)
        .map(|index| QuestionEntity {
            id: Uuid::new_v4(),
            quiz_id,
            index,
            text: format!("Question {}", index + 1),
            difficulty: "easy".into(),
            category: "general".into(),
            question_type: "multiple".into(),
            options: (0..4)
                .map(|option| OptionEntity {
                    id: Uuid::new_v4(),
                    index: option,
                    content: format!("Option {option}"),
                    is_correct: option == CORRECT,
                })
                .collect(),
        })
        .collect()
}
