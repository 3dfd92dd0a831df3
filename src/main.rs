use anyhow::{Context, Result};
use axum::{Router, serve::Listener};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{
    fmt::Debug, fs, future::IntoFuture, io::ErrorKind, path::Path, str::FromStr, sync::Arc,
    time::Duration,
};
use tokio::{
    net::{TcpListener, UnixListener},
    signal,
    sync::Notify,
};
use tracing_subscriber::EnvFilter;

mod backend;
mod config;
mod errors;
mod handlers;
mod models;
mod render;
mod routes;
mod services;
mod state;

use backend::catalog::CatalogBackend;

/// In-flight requests get this long to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    let default_level = if cfg.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("Starting bucket-browser with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite catalog ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );
    let catalog = CatalogBackend::new(db, cfg.storage_dir.clone());

    // --- Handle migration mode ---
    if cfg.migrate {
        let statements = catalog.migrate().await?;
        tracing::info!("Database migration complete ({} statements).", statements);
        return Ok(());
    }

    for mount in &cfg.mounts {
        tracing::info!("Mounted {}", mount);
    }

    // --- Build router ---
    let state = state::AppState::new(cfg.mounts.clone(), Arc::new(catalog), cfg.browse_options()?);
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    if let Some(socket) = &cfg.socket {
        if socket.exists() {
            fs::remove_file(socket)
                .with_context(|| format!("removing stale socket {}", socket.display()))?;
        }
        let listener = UnixListener::bind(socket)?;
        tracing::info!("Server listening on unix:{}", socket.display());
        return serve(listener, app).await;
    }

    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    serve(listener, app).await
}

/// Serve until a shutdown signal, then drain for at most `DRAIN_TIMEOUT`.
async fn serve<L>(listener: L, app: Router) -> Result<()>
where
    L: Listener,
    L::Addr: Debug,
{
    let stopping = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(stopping.clone()))
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(DRAIN_TIMEOUT).await;
        } => {
            tracing::warn!("Shutdown drain timed out after {:?}", DRAIN_TIMEOUT);
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(stopping: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
    stopping.notify_one();
}
