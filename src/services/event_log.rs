//! Append-only domain event log backed by Postgres.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;

use crate::database::DatabasePool;
use crate::models::{DomainEvent, EventFilter, StoredEvent};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("event log append failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Receives domain events after the state change they describe has been
/// persisted. Appends must be durable before they are acknowledged; the
/// read side exists for the operational events endpoint only.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &DomainEvent) -> Result<(), EmitError>;

    async fn recent(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EmitError>;
}

#[derive(Clone)]
pub struct PgEventLog {
    pool: DatabasePool,
}

impl PgEventLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn append(&self, event: &DomainEvent) -> Result<(), EmitError> {
        sqlx::query(
            r#"
            INSERT INTO domain_events
                (event_type, event_type_version, aggregate_type, aggregate_id, event_data, actor)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&event.event_type)
        .bind(event.event_type_version)
        .bind(&event.aggregate_type)
        .bind(&event.aggregate_id)
        .bind(&event.data)
        .bind(&event.user)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EmitError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT position, event_type, event_type_version, aggregate_type, \
             aggregate_id, event_data, actor, created_at FROM domain_events WHERE 1=1",
        );

        if let Some(aggregate_type) = &filter.aggregate_type {
            if !aggregate_type.is_empty() {
                builder.push(" AND aggregate_type = ");
                builder.push_bind(aggregate_type);
            }
        }
        if let Some(event_type) = &filter.event_type {
            if !event_type.is_empty() {
                builder.push(" AND event_type = ");
                builder.push_bind(event_type);
            }
        }
        if let Some(aggregate_id) = &filter.aggregate_id {
            if !aggregate_id.is_empty() {
                builder.push(" AND aggregate_id = ");
                builder.push_bind(aggregate_id);
            }
        }

        builder.push(" ORDER BY position DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);

        let events = builder
            .build_query_as::<StoredEvent>()
            .fetch_all(&*self.pool)
            .await?;

        Ok(events)
    }
}
