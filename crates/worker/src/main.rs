//! Standalone outbox delivery process.
//!
//! Runs the same delivery loop the API can host in-process. Deploy this
//! and set `OUTBOX_WORKER_ENABLED=false` on the API to scale delivery
//! separately from request handling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_events::{OutboxWorker, PgOutboxStore, PushNotifier, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rollcall_worker=debug,rollcall_events=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = rollcall_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    rollcall_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let notifier = PushNotifier::from_env(pool.clone())
        .await
        .expect("Failed to configure push delivery");
    let worker = OutboxWorker::new(
        Arc::new(PgOutboxStore::new(pool)),
        Arc::new(notifier),
        WorkerConfig::from_env(),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    worker.run(cancel).await;
    tracing::info!("Outbox worker stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, stopping"),
        () = terminate => tracing::info!("Received SIGTERM, stopping"),
    }
}
