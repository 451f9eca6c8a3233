//! Pelada Back binary entrypoint wiring REST, the live-state WebSocket relay and the record store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use pelada_back::{
    config::AppConfig,
    dao::record_store::memory::MemoryRecordStore,
    routes,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_record_store(&app_state).await;

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

/// Supervise MongoDB when `MONGO_URI` is set, otherwise keep records in memory.
async fn install_record_store(state: &SharedState) {
    #[cfg(feature = "mongo-store")]
    if env::var_os("MONGO_URI").is_some() {
        use pelada_back::{
            dao::{
                record_store::{
                    RecordStore,
                    mongodb::{MongoConfig, MongoRecordStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        info!("MONGO_URI set; supervising MongoDB record store");
        tokio::spawn(storage_supervisor::run(state.clone(), || async {
            let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
            let store = MongoRecordStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }));
        return;
    }

    info!("no database configured; keeping records in memory");
    state
        .install_record_store(Arc::new(MemoryRecordStore::new()))
        .await;
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

        let Ok(mut term) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
