//! Quiz Arena Back binary entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use quiz_arena_back::{
    config::AppConfig,
    dao::session_store::{SessionStore, memory::InMemorySessionStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_storage(app_state.clone()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the storage backend from `STORAGE_BACKEND` (`mongo` or `memory`).
async fn spawn_storage(state: SharedState) {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().into());
    match backend.as_str() {
        "memory" => {
            warn!("using the in-memory store; sessions are lost on restart");
            let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
            storage_supervisor::install(&state, store).await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state, move || {
                mongo::connect(uri.clone(), db_name.clone())
            }));
        }
        other => warn!(backend = other, "unknown storage backend; staying in degraded mode"),
    }
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

#[cfg(feature = "mongo-store")]
mod mongo {
    use std::sync::Arc;

    use quiz_arena_back::dao::{
        session_store::{
            SessionStore,
            mongodb::{MongoConfig, MongoSessionStore},
        },
        storage::StorageError,
    };

    /// Connect to MongoDB and wrap the connection as a session store.
    pub async fn connect(
        uri: String,
        db_name: Option<String>,
    ) -> Result<Arc<dyn SessionStore>, StorageError> {
        let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
        let store = MongoSessionStore::connect(config).await?;
        Ok(Arc::new(store))
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
