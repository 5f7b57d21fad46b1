use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use tourbook_api::auth::Argon2Hasher;
use tourbook_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use tourbook_api::services::email;
use tourbook_api::{router, seed, AppState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "tourbook-api", version, about = "Tour booking API server")]
struct ServerArgs {
    /// Listen port; overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend
    #[arg(long, value_enum, env = "TOURBOOK_STORE", default_value = "postgres")]
    store: StoreKind,

    /// Insert sample tours before serving
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ServerArgs::parse();

    let mut config = tourbook_api::config::config().clone();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    tracing::info!("Starting tourbook API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match args.store {
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            Arc::new(PgStore::new(pool, config.database.enable_query_logging))
        }
    };

    if args.seed {
        let created = seed::sample_tours(store.as_ref()).await?;
        tracing::info!(created, "seeded sample tours");
    }

    let mailer = email::from_config(&config.email);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store, mailer, Arc::new(Argon2Hasher::default()));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
