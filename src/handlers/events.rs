use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::models::{EventFilter, StoredEvent};
use crate::AppState;

#[derive(Deserialize)]
pub struct EventQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub event_type: Option<String>,
    pub aggregate_type: Option<String>,
    pub aggregate_id: Option<String>,
}

/// Operational read over the event log, newest first.
pub async fn get_events(
    Query(params): Query<EventQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredEvent>>, (StatusCode, Json<serde_json::Value>)> {
    let filter = EventFilter {
        aggregate_type: params.aggregate_type,
        event_type: params.event_type,
        aggregate_id: params.aggregate_id,
        limit: params.limit.unwrap_or(100),
        offset: params.offset.unwrap_or(0),
    };

    let events = state.event_log.recent(&filter).await.map_err(|e| {
        tracing::error!("Error fetching events: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "code": "DATABASE_ERROR",
                "message": format!("Database error: {}", e)
            })),
        )
    })?;

    Ok(Json(events))
}
