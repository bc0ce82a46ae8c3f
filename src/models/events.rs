//! Domain event shapes and the wire literals downstream consumers match on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

pub const AGGREGATE_TYPE: &str = "SharkAttack";

/// Aggregate type carried by Reported events. The misspelling is a
/// historical wire constant; consumers match on the exact literal, so
/// it must not be corrected.
pub const REPORTED_AGGREGATE_TYPE: &str = "SharkAttact";

pub const REPORTED_EVENT_TYPE: &str = "Reported";
pub const EVENT_TYPE_VERSION: i32 = 1;

/// Actor recorded on Reported events emitted by the import pipeline.
pub const IMPORT_ACTOR: &str = "system-import";

/// Modification kind carried in the data payload of a Modified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModType {
    Create,
    UpdateMerge,
    UpdateReplace,
    Delete,
}

impl ModType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModType::Create => "CREATE",
            ModType::UpdateMerge => "UPDATE_MERGE",
            ModType::UpdateReplace => "UPDATE_REPLACE",
            ModType::Delete => "DELETE",
        }
    }
}

/// An event as handed to the event log, before it is assigned a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_type: String,
    pub event_type_version: i32,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub data: serde_json::Value,
    pub user: String,
}

impl DomainEvent {
    /// Build a `SharkAttackModified` event. The data payload leads with
    /// the modification kind, followed by the aggregate snapshot.
    pub fn modified(
        kind: ModType,
        aggregate_id: &str,
        snapshot: serde_json::Value,
        user: &str,
    ) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(
            "modType".to_string(),
            serde_json::Value::String(kind.as_str().to_string()),
        );
        if let serde_json::Value::Object(snapshot) = snapshot {
            for (key, value) in snapshot {
                data.entry(key).or_insert(value);
            }
        }
        Self {
            event_type: format!("{}Modified", AGGREGATE_TYPE),
            event_type_version: EVENT_TYPE_VERSION,
            aggregate_type: AGGREGATE_TYPE.to_string(),
            aggregate_id: aggregate_id.to_string(),
            data: serde_json::Value::Object(data),
            user: user.to_string(),
        }
    }

    /// Build a `Reported` event for one imported record. Always attributed
    /// to the import actor, and always tagged with the legacy aggregate
    /// type literal.
    pub fn reported(aggregate_id: &str, record: serde_json::Value) -> Self {
        Self {
            event_type: REPORTED_EVENT_TYPE.to_string(),
            event_type_version: EVENT_TYPE_VERSION,
            aggregate_type: REPORTED_AGGREGATE_TYPE.to_string(),
            aggregate_id: aggregate_id.to_string(),
            data: record,
            user: IMPORT_ACTOR.to_string(),
        }
    }
}

/// An event as read back from the log.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub position: i64,
    pub event_type: String,
    pub event_type_version: i32,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_data: serde_json::Value,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StoredEvent {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            position: row.try_get("position")?,
            event_type: row.try_get("event_type")?,
            event_type_version: row.try_get("event_type_version")?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            event_data: row.try_get("event_data")?,
            actor: row.try_get("actor")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Filters for reading the event log back, newest first.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub aggregate_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
