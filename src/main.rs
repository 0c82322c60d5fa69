use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zapbot::bot::bridge::BridgeTransport;
use zapbot::bot::{Bot, BotConnector};
use zapbot::config::Config;
use zapbot::hub::NotificationHub;
use zapbot::services::{auth, maintenance};
use zapbot::state::AppState;
use zapbot::store::{CredentialStore, PgCredentialStore};
use zapbot::{build_router, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let pool = db::create_pool(&config.database_url).context("Failed to create database pool")?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;
    tracing::info!("✅ Database ready");

    let store: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));

    if let Err(e) = auth::ensure_admin_user(store.as_ref(), &config).await {
        tracing::error!("❌ Failed to ensure admin user: {}", e);
    }

    let cancel = CancellationToken::new();
    let hub = NotificationHub::new(config.viewer_write_timeout);

    let transport = Arc::new(BridgeTransport::new(
        config.transport_url.clone(),
        config.transport_request_timeout,
    ));
    let bot = Arc::new(Bot::new(transport, hub.clone(), config.dispatch_queue_capacity));
    let bot_task = bot
        .start(cancel.clone())
        .await
        .with_context(|| format!("Failed to connect to chat transport at {}", config.transport_url))?;
    tracing::info!("✅ Bot started");

    let cleanup_task = maintenance::spawn_session_cleanup(
        store.clone(),
        config.session_cleanup_interval,
        cancel.clone(),
    );
    tracing::info!("✅ Background session cleanup started");

    let bot_connector: Arc<dyn BotConnector> = bot.clone();
    let state = AppState::new(store, bot_connector, hub.clone(), config.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);

    let shutdown_hub = hub.clone();
    let shutdown_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("🛑 Shutdown signal received");
            shutdown_hub.close_all().await;
            shutdown_cancel.cancel();
        })
        .await?;

    cancel.cancel();
    if let Err(e) = bot_task.await {
        tracing::error!("❌ Bot task failed: {}", e);
    }
    let _ = cleanup_task.await;

    tracing::info!("👋 Bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("❌ Failed to listen for SIGTERM: {}", e);
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
