/// Wall clock driven by the tokio clock.
pub mod clock;
/// Domain values derived from session records.
pub mod game;
/// Connected clients grouped by session room.
pub mod hub;
/// Session status transitions.
pub mod lifecycle;
/// Per-mode rules.
pub mod mode;
/// Reveal pauses between rounds.
pub mod reveal;
/// Per-session question timeouts.
pub mod timer;

use std::{sync::Arc, time::SystemTime};

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
};

pub use self::hub::{ClientConnection, RoomChannel, RoomEvent, RoomHub};
use self::{clock::RoundClock, reveal::RevealPauses, timer::QuestionScheduler};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the store handle plus the in-process registries of the engine.
pub struct AppState {
    store: RwLock<Option<Arc<dyn SessionStore>>>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    hub: RoomHub,
    scheduler: QuestionScheduler,
    reveals: RevealPauses,
    clock: RoundClock,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            config: Arc::new(config),
            hub: RoomHub::new(),
            scheduler: QuestionScheduler::new(),
            reveals: RevealPauses::new(),
            clock: RoundClock::new(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while the service runs without one.
    pub async fn require_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Put a store in place without leaving degraded mode, so background work can use it
    /// before requests do.
    pub async fn set_store(&self, store: Arc<dyn SessionStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn SessionStore>) {
        self.set_store(store).await;
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of connected clients grouped by session room.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    /// Broadcast channel the engine pushes events through.
    pub fn rooms(&self) -> &dyn RoomChannel {
        &self.hub
    }

    /// Per-session question timers.
    pub fn scheduler(&self) -> &QuestionScheduler {
        &self.scheduler
    }

    /// Per-session reveal pauses.
    pub fn reveals(&self) -> &RevealPauses {
        &self.reveals
    }

    /// Wall time used to open rounds and measure their elapsed time.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::session_store::memory::InMemorySessionStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_store(Arc::new(InMemorySessionStore::new()))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_store().await.is_ok());

        state.clear_store().await;
        assert!(state.is_degraded());
        assert!(state.store().await.is_none());
    }
}
