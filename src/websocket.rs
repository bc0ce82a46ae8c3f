use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, StatusCode},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::middleware::auth::{Claims, READ_ROLE};
use crate::services::notifier::ViewNotification;
use crate::AppState;

/// Topic-scoped broadcast channel.
/// The first element is the topic the message belongs to.
pub type BroadcastChannel = broadcast::Sender<(String, String)>; // (topic, message)

#[derive(Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
    topic: Option<String>,
}

pub fn create_broadcast_channel() -> BroadcastChannel {
    broadcast::channel(100).0
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WebSocketQuery>,
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Response, StatusCode> {
    // Extract token from query parameter or Authorization header
    let token = query.token.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
    });

    let token = token.ok_or_else(|| {
        tracing::warn!("WebSocket connection attempt without token");
        StatusCode::UNAUTHORIZED
    })?;

    // Validate JWT token
    let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_ref());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(&token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("WebSocket token validation failed: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let claims = token_data.claims;
    if !claims.roles.iter().any(|r| r == READ_ROLE) {
        tracing::warn!(
            "WebSocket connection declined for {}: missing {} role",
            claims.preferred_username,
            READ_ROLE
        );
        return Err(StatusCode::FORBIDDEN);
    }

    tracing::info!(
        "WebSocket connection authenticated for user: {}",
        claims.preferred_username
    );

    // Clients may narrow the stream to one topic; by default they get all.
    let topic_filter = query.topic.filter(|t| !t.trim().is_empty());

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, topic_filter)))
}

async fn handle_socket(socket: WebSocket, state: AppState, topic_filter: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.broadcast_tx.subscribe();

    // Spawn task to send messages from broadcast channel to client
    let mut send_task = tokio::spawn(async move {
        while let Ok((topic, msg)) = rx.recv().await {
            if let Some(filter) = &topic_filter {
                if topic != *filter {
                    continue;
                }
            }
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Spawn task to receive messages from client (for ping/pong)
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
}

/// Broadcast a view-refresh notification to every connected subscriber
/// of its topic. Send errors mean no subscribers; that is fine.
pub fn broadcast_view_update(channel: &BroadcastChannel, notification: &ViewNotification) {
    let message = serde_json::to_string(notification).unwrap_or_default();
    let _ = channel.send((notification.topic.clone(), message));
}
