//! Best-effort signals to the materialized-view refresh channel.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::websocket::{self, BroadcastChannel};

/// Topic downstream materialized-view updaters subscribe to.
pub const MATERIALIZED_VIEW_TOPIC: &str = "emi-gateway-materialized-view-updates";

/// Event name the updaters match on for this aggregate.
pub const MODIFIED_EVENT_NAME: &str = "FactsMngSharkAttackModified";

#[derive(Debug, Error)]
#[error("notification send failed: {0}")]
pub struct NotifyError(pub String);

/// A view-refresh signal. Delivery is fire-and-forget: losing one means
/// a view refreshes late, not that data is lost.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewNotification {
    pub topic: String,
    pub event_name: String,
    pub payload: serde_json::Value,
}

impl ViewNotification {
    /// Refresh signal carrying the current record snapshot.
    pub fn modified(payload: serde_json::Value) -> Self {
        Self {
            topic: MATERIALIZED_VIEW_TOPIC.to_string(),
            event_name: MODIFIED_EVENT_NAME.to_string(),
            payload,
        }
    }

    /// Generic marker sent once per bulk delete, regardless of how many
    /// identities were removed.
    pub fn deleted_marker() -> Self {
        Self::modified(serde_json::json!({
            "id": "deleted",
            "name": "",
            "active": false,
            "description": ""
        }))
    }
}

#[async_trait]
pub trait ViewNotifier: Send + Sync {
    async fn notify(&self, notification: ViewNotification) -> Result<(), NotifyError>;
}

/// Notifier that fans out over the in-process websocket broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    channel: BroadcastChannel,
}

impl BroadcastNotifier {
    pub fn new(channel: BroadcastChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ViewNotifier for BroadcastNotifier {
    async fn notify(&self, notification: ViewNotification) -> Result<(), NotifyError> {
        // A send error only means nobody is subscribed right now, which
        // is a normal state for a fire-and-forget channel.
        websocket::broadcast_view_update(&self.channel, &notification);
        Ok(())
    }
}
