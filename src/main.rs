//! ChatHub Server: multi-tenant chat gateway.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use chathub_api::{AppState, build_router};
use chathub_auth::SessionManager;
use chathub_core::config::{AppConfig, DatabaseConfig, StoreBackend};
use chathub_core::error::AppError;
use chathub_core::traits::{ChatDirectory, CredentialStore, EventLog};
use chathub_database::{
    DatabasePool, MemoryChatDirectory, MemoryCredentialStore, MemoryEventLog, PgChatDirectory,
    PgCredentialStore, PgEventLog,
};
use chathub_realtime::RealtimeEngine;
use chathub_worker::CronScheduler;

#[tokio::main]
async fn main() {
    let env = std::env::var("CHATHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Collaborator implementations selected by `database.backend`.
struct Stores {
    credentials: Arc<dyn CredentialStore>,
    chats: Arc<dyn ChatDirectory>,
    events: Arc<dyn EventLog>,
    db: Option<DatabasePool>,
}

async fn open_stores(config: &DatabaseConfig) -> Result<Stores, AppError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; sessions do not survive a restart");
            Ok(Stores {
                credentials: Arc::new(MemoryCredentialStore::new()),
                chats: Arc::new(MemoryChatDirectory::new()),
                events: Arc::new(MemoryEventLog::new()),
                db: None,
            })
        }
        StoreBackend::Postgres => {
            let db = DatabasePool::connect(config).await?;
            if config.run_migrations {
                chathub_database::run_migrations(db.pool()).await?;
            }
            let pool = db.pool().clone();
            Ok(Stores {
                credentials: Arc::new(PgCredentialStore::new(pool.clone())),
                chats: Arc::new(PgChatDirectory::new(pool.clone())),
                events: Arc::new(PgEventLog::new(pool)),
                db: Some(db),
            })
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ChatHub v{}", env!("CARGO_PKG_VERSION"));

    let stores = open_stores(&config.database).await?;

    let sessions = Arc::new(SessionManager::new(
        stores.credentials,
        &config.auth,
        &config.session,
    ));

    let realtime = RealtimeEngine::start(
        &config.realtime,
        Arc::clone(&sessions),
        stores.chats,
        stores.events,
    )
    .await;

    let scheduler = CronScheduler::new().await?;
    scheduler
        .register_default_tasks(Arc::clone(&sessions), &config.session)
        .await?;
    scheduler.start().await?;

    let config = Arc::new(config);
    let mut state = AppState::new(Arc::clone(&config), sessions, realtime.clone());
    if let Some(db) = stores.db.clone() {
        state = state.with_database(db);
    }
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("ChatHub server listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            let _ = scheduler.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(AppError::internal(format!("Server error: {}", e))),
                Err(e) => Err(AppError::internal(format!("Server task failed: {}", e))),
            };
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let closed = realtime.shutdown().await;
    tracing::info!(closed, "Gateway connections closed");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown failed: {}", e);
    }
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let drained = tokio::time::timeout(grace, server).await;
    if let Some(db) = &stores.db {
        db.close().await;
    }
    match drained {
        Ok(Ok(Ok(()))) => tracing::info!("ChatHub server shut down gracefully"),
        Ok(Ok(Err(e))) => tracing::error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Server task failed: {}", e),
        Err(_) => tracing::warn!(
            grace_seconds = config.server.shutdown_grace_seconds,
            "Grace period elapsed with requests still in flight"
        ),
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
