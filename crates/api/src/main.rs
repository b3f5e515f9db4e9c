use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scholarship_api::background::job_reaper::Reaper;
use scholarship_api::config::ServerConfig;
use scholarship_api::engine::ExtractionRunner;
use scholarship_api::notifications::NotificationRouter;
use scholarship_api::router::build_app_router;
use scholarship_api::state::AppState;
use scholarship_api::ws;
use scholarship_events::{EmailConfig, EmailDelivery, EventBus, EventPersistence};
use scholarship_extraction::{DisabledOcr, DocumentAiClient, DocumentAiConfig, OcrEngine, Processor};
use scholarship_storage::StorageConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholarship_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = scholarship_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    scholarship_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    scholarship_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Object storage ---
    let storage_config = StorageConfig::from_env().expect("Invalid storage configuration");
    let storage = scholarship_storage::connect(&storage_config)
        .await
        .expect("Failed to initialize object storage");
    tracing::info!(backend = storage.name(), "Object storage ready");

    // --- OCR ---
    let ocr: Arc<dyn OcrEngine> = match DocumentAiConfig::from_env() {
        Some(ocr_config) => Arc::new(
            DocumentAiClient::new(ocr_config).expect("Failed to build Document AI client"),
        ),
        None => {
            tracing::warn!("Document AI not configured; PDF extraction jobs will fail");
            Arc::new(DisabledOcr)
        }
    };
    let processor = Arc::new(Processor::new(ocr));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.clone());

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    let email = EmailConfig::from_env().and_then(|email_config| {
        match EmailDelivery::new(email_config) {
            Ok(delivery) => Some(Arc::new(delivery)),
            Err(e) => {
                tracing::error!(error = %e, "Email delivery disabled: invalid SMTP configuration");
                None
            }
        }
    });
    if email.is_none() {
        tracing::info!("SMTP not configured; notifications are in-app only");
    }
    let notification_router =
        NotificationRouter::new(pool.clone(), Arc::clone(&ws_manager), email);
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));

    tracing::info!("Event services started (persistence, notification router)");

    // --- Extraction runner and reaper ---
    let extraction_wakeup = Arc::new(Notify::new());
    let runner = Arc::new(ExtractionRunner::new(
        pool.clone(),
        Arc::clone(&storage),
        processor,
        Arc::clone(&ws_manager),
        Arc::clone(&event_bus),
        config.extraction.clone(),
        Arc::clone(&extraction_wakeup),
    ));
    let runner_handle = tokio::spawn(runner.run(cancel.clone()));

    let reaper = Reaper {
        pool: pool.clone(),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        runner_wakeup: Arc::clone(&extraction_wakeup),
        timeout_secs: config.extraction.timeout_secs,
    };
    let reaper_handle = tokio::spawn(reaper.run(config.extraction.reap_interval(), cancel.clone()));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        storage,
        extraction_wakeup,
    };

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
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    // Background tasks hold bus handles, so they stop before the bus closes.
    cancel.cancel();
    let _ = tokio::time::timeout(grace, runner_handle).await;
    let _ = tokio::time::timeout(grace, reaper_handle).await;
    let _ = tokio::time::timeout(grace, heartbeat_handle).await;
    tracing::info!("Extraction runner, reaper, and heartbeat stopped");

    // Dropping the last sender closes the channel and ends the subscribers.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, persistence_handle).await;
    let _ = tokio::time::timeout(grace, router_handle).await;
    tracing::info!("Event services shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
