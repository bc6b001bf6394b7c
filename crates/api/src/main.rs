use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_api::config::ServerConfig;
use rollcall_api::ingest::broadcast::ArrivalQueue;
use rollcall_api::router::build_app_router;
use rollcall_api::state::AppState;
use rollcall_api::{background, ws};
use rollcall_events::{Hub, HubConfig, OutboxWorker, PgOutboxStore, PushNotifier, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rollcall_api=debug,rollcall_events=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = rollcall_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    rollcall_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    rollcall_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Broadcast hub ---
    let (hub, hub_handle) = Hub::spawn(HubConfig {
        viewer_queue_capacity: config.hub_viewer_queue_capacity,
    });
    let heartbeat_handle = ws::start_heartbeat(hub.clone());

    // --- App state ---
    let (arrivals, arrival_rx) = ArrivalQueue::channel();
    let state = AppState::new(pool.clone(), config.clone(), hub.clone(), arrivals);
    let cancel = CancellationToken::new();

    // --- Background jobs ---
    let sweep_handle = tokio::spawn(background::pairing_sweep::run(
        Arc::clone(&state.pairing),
        Duration::from_secs(config.pairing.sweep_interval_secs.max(1)),
        cancel.clone(),
    ));
    let stats_handle = tokio::spawn(background::stats_broadcast::run(
        state.clone(),
        cancel.clone(),
    ));
    let arrival_handle = tokio::spawn(background::arrival_broadcast::run(
        state.clone(),
        arrival_rx,
        cancel.clone(),
    ));

    // --- Outbox delivery ---
    let worker_handle = if config.outbox_worker_enabled {
        let notifier = PushNotifier::from_env(pool.clone())
            .await
            .expect("Failed to configure push delivery");
        let worker = OutboxWorker::new(
            Arc::new(PgOutboxStore::new(pool.clone())),
            Arc::new(notifier),
            WorkerConfig::from_env(),
        );
        let worker_cancel = cancel.clone();
        Some(tokio::spawn(async move { worker.run(worker_cancel).await }))
    } else {
        tracing::info!("Outbox worker disabled in this process");
        None
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(grace, sweep_handle).await;
    let _ = tokio::time::timeout(grace, stats_handle).await;
    let _ = tokio::time::timeout(grace, arrival_handle).await;
    if let Some(handle) = worker_handle {
        let _ = tokio::time::timeout(grace, handle).await;
        tracing::info!("Outbox worker stopped");
    }

    heartbeat_handle.abort();

    match hub.shutdown().await {
        Ok(closed) => tracing::info!(closed, "Closed remaining viewer connections"),
        Err(e) => tracing::warn!(error = %e, "Hub already stopped"),
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), hub_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
