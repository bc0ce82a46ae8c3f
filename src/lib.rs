// Library root - exports for the binary and for tests

pub mod background;
pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod websocket;

pub use config::Config;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use services::event_log::EventLog;
use services::SharkAttackService;
use websocket::BroadcastChannel;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SharkAttackService>,
    pub event_log: Arc<dyn EventLog>,
    pub config: Arc<Config>,
    pub broadcast_tx: BroadcastChannel,
}

/// Build the full API router, including the auth layer. Kept here so
/// integration tests run against the same routing as the binary.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/shark-attacks",
            get(handlers::list_shark_attacks)
                .post(handlers::create_shark_attack)
                .delete(handlers::delete_shark_attacks),
        )
        .route("/api/shark-attacks/import", post(handlers::import_shark_attacks))
        .route(
            "/api/shark-attacks/:id",
            get(handlers::get_shark_attack).put(handlers::update_shark_attack),
        )
        .route("/api/admin/events", get(handlers::get_events))
        .route("/ws", get(websocket::websocket_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> &'static str {
    "OK"
}
