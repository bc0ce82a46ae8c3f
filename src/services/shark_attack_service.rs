//! Command orchestration: persist, then emit events, then notify.
//!
//! Every mutation follows the same discipline. The store write must be
//! confirmed before any event is appended for it, and the view-refresh
//! notification never fails a mutation that already persisted.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    DomainEvent, ListQuery, ModType, NewSharkAttack, SharkAttackFields, SharkAttackPatch,
    SharkAttackRecord,
};
use crate::services::dataset::{DatasetError, DatasetSource};
use crate::services::event_log::{EmitError, EventLog};
use crate::services::normalizer;
use crate::services::notifier::{ViewNotification, ViewNotifier};
use crate::services::store::{SharkAttackStore, StoreError};

/// How many records of one import page are processed at a time.
const IMPORT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("dataset fetch failed: {0}")]
    Fetch(#[from] DatasetError),
    /// Only store timeouts abort a whole batch; any other store failure
    /// is confined to its record.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct CreateSharkAttack {
    pub id: Option<String>,
    pub organization_id: Option<String>,
    pub active: Option<bool>,
    pub fields: SharkAttackFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub requested: usize,
    pub removed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub ids: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

enum RecordOutcome {
    Imported(String),
    Failed(ImportFailure),
}

pub struct SharkAttackService {
    store: Arc<dyn SharkAttackStore>,
    event_log: Arc<dyn EventLog>,
    notifier: Arc<dyn ViewNotifier>,
    dataset: Arc<dyn DatasetSource>,
    default_organization: String,
}

impl SharkAttackService {
    pub fn new(
        store: Arc<dyn SharkAttackStore>,
        event_log: Arc<dyn EventLog>,
        notifier: Arc<dyn ViewNotifier>,
        dataset: Arc<dyn DatasetSource>,
        default_organization: String,
    ) -> Self {
        Self {
            store,
            event_log,
            notifier,
            dataset,
            default_organization,
        }
    }

    fn organization<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|org| !org.trim().is_empty())
            .unwrap_or(&self.default_organization)
    }

    pub async fn get(
        &self,
        organization_id: Option<&str>,
        id: &str,
    ) -> Result<Option<SharkAttackRecord>, CommandError> {
        let org = self.organization(organization_id);
        Ok(self.store.get(org, id).await?)
    }

    /// Listing reads have no event side effects. The total count is only
    /// computed when asked for, concurrently with the page itself.
    pub async fn list(
        &self,
        query: &ListQuery,
        with_total: bool,
    ) -> Result<(Vec<SharkAttackRecord>, Option<i64>), CommandError> {
        if with_total {
            let (listing, total) = tokio::join!(self.store.list(query), self.store.count(query));
            Ok((listing?, Some(total?)))
        } else {
            Ok((self.store.list(query).await?, None))
        }
    }

    pub async fn create(
        &self,
        input: CreateSharkAttack,
        actor: &str,
    ) -> Result<SharkAttackRecord, CommandError> {
        let id = input
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = NewSharkAttack {
            id,
            organization_id: self.organization(input.organization_id.as_deref()).to_string(),
            active: input.active.unwrap_or(true),
            fields: input.fields,
        };

        let outcome = match self.store.upsert(&record).await {
            Ok(outcome) => outcome,
            // Lost an insert race. The row exists, which is what the
            // caller asked for; no events for a write we did not make.
            Err(StoreError::Duplicate { .. }) => {
                let existing = self.store.get(&record.organization_id, &record.id).await?;
                return existing.ok_or(CommandError::Store(StoreError::NotFound {
                    identity: record.id,
                }));
            }
            Err(err) => return Err(err.into()),
        };

        let kind = if outcome.inserted {
            ModType::Create
        } else {
            ModType::UpdateMerge
        };
        let snapshot = serde_json::to_value(&outcome.record).unwrap_or_default();
        let event = DomainEvent::modified(kind, &outcome.record.id, snapshot.clone(), actor);
        self.emit_and_notify(event, ViewNotification::modified(snapshot))
            .await?;

        Ok(outcome.record)
    }

    pub async fn update(
        &self,
        organization_id: Option<&str>,
        id: &str,
        patch: SharkAttackPatch,
        merge: bool,
        actor: &str,
    ) -> Result<SharkAttackRecord, CommandError> {
        let org = self.organization(organization_id);
        let (record, kind) = if merge {
            (
                self.store.update_merge(org, id, &patch).await?,
                ModType::UpdateMerge,
            )
        } else {
            (
                self.store.replace(org, id, &patch).await?,
                ModType::UpdateReplace,
            )
        };

        let snapshot = serde_json::to_value(&record).unwrap_or_default();
        let event = DomainEvent::modified(kind, id, snapshot.clone(), actor);
        self.emit_and_notify(event, ViewNotification::modified(snapshot))
            .await?;

        Ok(record)
    }

    /// Bulk delete. Emits one DELETE event per requested identity whether
    /// or not the row existed, then a single generic deletion marker on
    /// the refresh channel.
    pub async fn delete(
        &self,
        organization_id: Option<&str>,
        ids: &[String],
        actor: &str,
    ) -> Result<DeleteOutcome, CommandError> {
        let org = self.organization(organization_id);
        let removed = self.store.delete_many(org, ids).await?;

        for id in ids {
            let event = DomainEvent::modified(ModType::Delete, id, serde_json::json!({}), actor);
            self.event_log.append(&event).await?;
        }

        if let Err(err) = self.notifier.notify(ViewNotification::deleted_marker()).await {
            tracing::warn!("View notification failed (non-fatal): {}", err);
        }

        Ok(DeleteOutcome {
            requested: ids.len(),
            removed,
        })
    }

    /// Synchronize one page of the public dataset into the store.
    ///
    /// Records are processed independently: a record that fails to
    /// normalize or persist is reported in the summary without stopping
    /// its siblings. Two failures abort the whole batch instead: the page
    /// fetch itself, and a store timeout, which is surfaced unchanged so
    /// the caller's retry policy can see it.
    pub async fn import(&self, actor: &str) -> Result<ImportSummary, ImportError> {
        let page = self.dataset.fetch_page().await?;
        let total = page.len();
        tracing::info!("Importing {} dataset records", total);

        // Futures are materialized eagerly (they are inert until polled) so
        // the buffered stream holds no closure; this sidesteps a rustc
        // higher-ranked lifetime limitation in the Send check.
        let record_futures: Vec<_> = page
            .iter()
            .enumerate()
            .map(|(position, raw)| self.import_record(position, raw, actor))
            .collect();
        let outcomes: Vec<RecordOutcome> = stream::iter(record_futures)
            .buffered(IMPORT_CONCURRENCY)
            .try_collect()
            .await?;

        let mut summary = ImportSummary::default();
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Imported(id) => summary.ids.push(id),
                RecordOutcome::Failed(failure) => summary.failures.push(failure),
            }
        }

        if summary.failures.is_empty() {
            tracing::info!("Import finished: {} records processed", summary.ids.len());
        } else {
            tracing::warn!(
                "Import finished: {} of {} records failed",
                summary.failures.len(),
                total
            );
        }
        Ok(summary)
    }

    async fn import_record(
        &self,
        position: usize,
        raw: &serde_json::Value,
        actor: &str,
    ) -> Result<RecordOutcome, ImportError> {
        let record = match normalizer::normalize(raw, &self.default_organization) {
            Ok(record) => record,
            Err(err) => {
                return Ok(RecordOutcome::Failed(ImportFailure {
                    position,
                    id: None,
                    reason: err.to_string(),
                }))
            }
        };

        let outcome = match self.store.upsert(&record).await {
            Ok(outcome) => outcome,
            // Benign insert race: the identity is already stored, so it
            // counts as processed. No events for a write we did not make.
            Err(StoreError::Duplicate { identity }) => {
                return Ok(RecordOutcome::Imported(identity))
            }
            Err(err @ StoreError::Timeout(_)) => return Err(err.into()),
            Err(err) => {
                return Ok(RecordOutcome::Failed(ImportFailure {
                    position,
                    id: Some(record.id),
                    reason: err.to_string(),
                }))
            }
        };

        let kind = if outcome.inserted {
            ModType::Create
        } else {
            ModType::UpdateMerge
        };
        let snapshot = serde_json::to_value(&outcome.record).unwrap_or_default();
        let reported_doc = serde_json::to_value(&record).unwrap_or_default();

        let modified = DomainEvent::modified(kind, &outcome.record.id, snapshot.clone(), actor);
        let reported = DomainEvent::reported(&record.id, reported_doc);

        let (modified_result, reported_result, notify_result) = tokio::join!(
            self.event_log.append(&modified),
            self.event_log.append(&reported),
            self.notifier.notify(ViewNotification::modified(snapshot)),
        );
        if let Err(err) = notify_result {
            tracing::warn!("View notification failed (non-fatal): {}", err);
        }
        if let Err(err) = modified_result.and(reported_result) {
            // The row is persisted; the next import run emits for it again.
            return Ok(RecordOutcome::Failed(ImportFailure {
                position,
                id: Some(record.id),
                reason: err.to_string(),
            }));
        }

        Ok(RecordOutcome::Imported(record.id))
    }

    async fn emit_and_notify(
        &self,
        event: DomainEvent,
        notification: ViewNotification,
    ) -> Result<(), CommandError> {
        let (emit_result, notify_result) = tokio::join!(
            self.event_log.append(&event),
            self.notifier.notify(notification),
        );
        if let Err(err) = notify_result {
            tracing::warn!("View notification failed (non-fatal): {}", err);
        }
        emit_result?;
        Ok(())
    }
}
