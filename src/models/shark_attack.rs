//! Core aggregate: the shark attack record and the shapes used to write it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

/// Descriptive fields of a shark attack record. The upstream dataset is
/// sparse, so every field is optional; updates may patch any subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharkAttackFields {
    pub date: Option<String>,
    pub year: Option<String>,
    pub r#type: Option<String>,
    pub country: Option<String>,
    pub area: Option<String>,
    pub location: Option<String>,
    pub activity: Option<String>,
    pub name: Option<String>,
    pub sex: Option<String>,
    pub age: Option<String>,
    pub injury: Option<String>,
    pub fatal_y_n: Option<String>,
    pub time: Option<String>,
    pub species: Option<String>,
    pub investigator_or_source: Option<String>,
    pub pdf: Option<String>,
    pub href_formula: Option<String>,
    pub href: Option<String>,
    pub case_number: Option<String>,
    pub case_number0: Option<String>,
    pub description: Option<String>,
}

/// A persisted record. Identity is the dataset's `original_order` for
/// imported rows or a generated uuid for manual creates; unique within
/// an organization and immutable once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharkAttackRecord {
    pub id: String,
    pub organization_id: String,
    pub active: bool,
    #[serde(flatten)]
    pub fields: SharkAttackFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SharkAttackRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            active: row.try_get("active")?,
            fields: SharkAttackFields {
                date: row.try_get("date")?,
                year: row.try_get("year")?,
                r#type: row.try_get("type")?,
                country: row.try_get("country")?,
                area: row.try_get("area")?,
                location: row.try_get("location")?,
                activity: row.try_get("activity")?,
                name: row.try_get("name")?,
                sex: row.try_get("sex")?,
                age: row.try_get("age")?,
                injury: row.try_get("injury")?,
                fatal_y_n: row.try_get("fatal_y_n")?,
                time: row.try_get("time")?,
                species: row.try_get("species")?,
                investigator_or_source: row.try_get("investigator_or_source")?,
                pdf: row.try_get("pdf")?,
                href_formula: row.try_get("href_formula")?,
                href: row.try_get("href")?,
                case_number: row.try_get("case_number")?,
                case_number0: row.try_get("case_number0")?,
                description: row.try_get("description")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input shape for an upsert (import or manual create).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSharkAttack {
    pub id: String,
    pub organization_id: String,
    pub active: bool,
    #[serde(flatten)]
    pub fields: SharkAttackFields,
}

/// Input shape for an update. `active: None` keeps the stored value on
/// merge and defaults to `true` on replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharkAttackPatch {
    pub active: Option<bool>,
    #[serde(flatten)]
    pub fields: SharkAttackFields,
}

/// Result of an upsert: the stored row plus whether this call created it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub record: SharkAttackRecord,
    pub inserted: bool,
}

/// Listing parameters: organization scope, optional filters, page window
/// and sort. `count` is the page size.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub organization_id: String,
    pub name: Option<String>,
    pub active: Option<bool>,
    pub page: i64,
    pub count: i64,
    pub sort_field: Option<String>,
    pub sort_asc: bool,
}
