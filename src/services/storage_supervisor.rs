//! Background task that watches storage health and reconnects after outages.
use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{session_store::SessionStore, storage::StorageError},
    services::round_service::recover_sessions,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, recover in-flight sessions, and keep the shared state in
/// degraded mode while the backend is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                if install(&state, store.clone()).await {
                    delay = INITIAL_DELAY;
                    if !watch_health(&state, store.as_ref()).await {
                        warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    }
                }
            }
            Err(err) => warn!(error = %err, "storage connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Install a fresh store, rebuild timers for sessions left mid-round, then accept requests.
///
/// Returns `false`, leaving the service degraded, when the store does not answer.
pub async fn install(state: &SharedState, store: Arc<dyn SessionStore>) -> bool {
    if let Err(err) = store.health_check().await {
        warn!(error = %err, "storage connected but not healthy");
        return false;
    }
    state.set_store(store).await;
    match recover_sessions(state).await {
        Ok(report) if report.failed > 0 => {
            warn!(failed = report.failed, "some sessions could not be recovered")
        }
        Ok(_) => {}
        Err(err) => {
            err.log("recover_sessions");
            warn!(error = %err, "session recovery failed");
        }
    }
    state.update_degraded(false);
    info!("storage connection established; leaving degraded mode");
    true
}

/// Poll the store until it becomes unreachable for good; returns `false` at that point.
async fn watch_health(state: &SharedState, store: &dyn SessionStore) -> bool {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    return false;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn SessionStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::InMemorySessionStore,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn failing_backend_keeps_the_service_degraded() {
        let state = AppState::new(AppConfig::default());
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Err::<Arc<dyn SessionStore>, _>(StorageError::unavailable(
                "connection refused".into(),
                io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            ))
        }));

        sleep(Duration::from_secs(30)).await;
        assert!(state.is_degraded());
        assert!(state.store().await.is_none());
        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn reachable_backend_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Ok(Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>)
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());
        assert!(state.require_store().await.is_ok());
        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_backend_flips_back_to_degraded() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(InMemorySessionStore::new());
        let handle = store.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = handle.clone();
            async move { Ok(store as Arc<dyn SessionStore>) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());

        store.set_offline(true);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_secs(1)).await;
        assert!(state.is_degraded());

        store.set_offline(false);
        sleep(Duration::from_secs(30)).await;
        assert!(!state.is_degraded());
        supervisor.abort();
    }
}
