use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use shark_attack_api::services::dataset::OpenDataSoftClient;
use shark_attack_api::services::event_log::PgEventLog;
use shark_attack_api::services::notifier::BroadcastNotifier;
use shark_attack_api::services::store::PgSharkAttackStore;
use shark_attack_api::services::SharkAttackService;
use shark_attack_api::{api_router, background, database, websocket, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shark_attack_api=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting SharkAttack API server...");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded");

    // Initialize database pool
    let db_pool = database::new_pool(&config.database_url).await?;
    info!("Database connection pool created");

    sqlx::migrate!("./migrations").run(&*db_pool).await?;
    info!("Database migrations applied");

    // Create WebSocket broadcast channel for materialized-view updates
    let broadcast_tx = websocket::create_broadcast_channel();
    info!("WebSocket broadcast channel created");

    // Wire the command service to its collaborators
    let store = Arc::new(PgSharkAttackStore::new(db_pool.clone()));
    let event_log = Arc::new(PgEventLog::new(db_pool.clone()));
    let notifier = Arc::new(BroadcastNotifier::new(broadcast_tx.clone()));
    let dataset = Arc::new(OpenDataSoftClient::new(
        config.dataset_url.clone(),
        config.dataset_page_size,
    ));
    let service = Arc::new(SharkAttackService::new(
        store,
        event_log.clone(),
        notifier,
        dataset,
        config.default_organization.clone(),
    ));

    // Initialize background scheduler (starts automatically)
    let scheduler = Arc::new(
        background::scheduler::BackgroundScheduler::new(service.clone(), config.clone()).await?,
    );
    info!("Background scheduler started");

    // Build application state
    let app_state = AppState {
        service,
        event_log,
        config: config.clone(),
        broadcast_tx,
    };

    let app = api_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // Graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down gracefully...");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
