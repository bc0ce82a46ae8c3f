//! Authoritative record store, keyed by identity within an organization.

use async_trait::async_trait;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use thiserror::Error;

use crate::database::DatabasePool;
use crate::models::{ListQuery, NewSharkAttack, SharkAttackPatch, SharkAttackRecord, UpsertOutcome};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store did not answer in time. Deliberately not wrapped further:
    /// callers with a retry policy need to see this kind as-is.
    #[error("store operation timed out: {0}")]
    Timeout(#[source] sqlx::Error),
    /// An insert raced another writer for the same identity. Benign for
    /// idempotent callers.
    #[error("duplicate identity {identity}")]
    Duplicate { identity: String },
    #[error("shark attack {identity} not found")]
    NotFound { identity: String },
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

#[async_trait]
pub trait SharkAttackStore: Send + Sync {
    async fn get(
        &self,
        organization_id: &str,
        id: &str,
    ) -> Result<Option<SharkAttackRecord>, StoreError>;

    async fn list(&self, query: &ListQuery) -> Result<Vec<SharkAttackRecord>, StoreError>;

    async fn count(&self, query: &ListQuery) -> Result<i64, StoreError>;

    /// Insert the record, or merge its supplied fields into the existing
    /// row when the identity is already present. Reports whether this
    /// call created the row.
    async fn upsert(&self, record: &NewSharkAttack) -> Result<UpsertOutcome, StoreError>;

    /// Patch the given record, keeping stored values for fields the patch
    /// leaves unset. `NotFound` when the identity does not exist.
    async fn update_merge(
        &self,
        organization_id: &str,
        id: &str,
        patch: &SharkAttackPatch,
    ) -> Result<SharkAttackRecord, StoreError>;

    /// Overwrite every descriptive field with the patch values, clearing
    /// fields the patch leaves unset. `NotFound` when the identity does
    /// not exist.
    async fn replace(
        &self,
        organization_id: &str,
        id: &str,
        patch: &SharkAttackPatch,
    ) -> Result<SharkAttackRecord, StoreError>;

    /// Remove all given identities in one statement; returns how many
    /// rows actually existed.
    async fn delete_many(&self, organization_id: &str, ids: &[String])
        -> Result<u64, StoreError>;
}

const COLUMNS: &str = "organization_id, id, active, date, year, type, country, area, \
    location, activity, name, sex, age, injury, fatal_y_n, time, species, \
    investigator_or_source, pdf, href_formula, href, case_number, case_number0, \
    description, created_at, updated_at";

const SORT_COLUMNS: &[&str] = &[
    "id",
    "active",
    "date",
    "year",
    "type",
    "country",
    "area",
    "location",
    "activity",
    "name",
    "sex",
    "age",
    "injury",
    "fatal_y_n",
    "time",
    "species",
    "investigator_or_source",
    "pdf",
    "href_formula",
    "href",
    "case_number",
    "case_number0",
    "description",
    "created_at",
    "updated_at",
];

/// Sort columns are interpolated into SQL, so they must come from the
/// fixed whitelist; anything else falls back to created_at.
fn sort_column(field: Option<&str>) -> &'static str {
    field
        .and_then(|f| SORT_COLUMNS.iter().find(|c| **c == f))
        .copied()
        .unwrap_or("created_at")
}

fn map_store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(err),
        other => StoreError::Database(other),
    }
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a ListQuery) {
    builder.push_bind(&query.organization_id);
    if let Some(name) = &query.name {
        if !name.is_empty() {
            builder.push(" AND name ILIKE ");
            builder.push_bind(format!("%{}%", name));
        }
    }
    if let Some(active) = query.active {
        builder.push(" AND active = ");
        builder.push_bind(active);
    }
}

#[derive(Clone)]
pub struct PgSharkAttackStore {
    pool: DatabasePool,
}

impl PgSharkAttackStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SharkAttackStore for PgSharkAttackStore {
    async fn get(
        &self,
        organization_id: &str,
        id: &str,
    ) -> Result<Option<SharkAttackRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM shark_attacks WHERE organization_id = $1 AND id = $2"
        );
        sqlx::query_as::<_, SharkAttackRecord>(&sql)
            .bind(organization_id)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_store_err)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<SharkAttackRecord>, StoreError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM shark_attacks WHERE organization_id = "
        ));
        push_filters(&mut builder, query);

        builder.push(" ORDER BY ");
        builder.push(sort_column(query.sort_field.as_deref()));
        builder.push(if query.sort_asc { " ASC" } else { " DESC" });
        builder.push(" LIMIT ");
        builder.push_bind(query.count);
        builder.push(" OFFSET ");
        builder.push_bind(query.page.max(0) * query.count);

        builder
            .build_query_as::<SharkAttackRecord>()
            .fetch_all(&*self.pool)
            .await
            .map_err(map_store_err)
    }

    async fn count(&self, query: &ListQuery) -> Result<i64, StoreError> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM shark_attacks WHERE organization_id = ");
        push_filters(&mut builder, query);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(map_store_err)
    }

    async fn upsert(&self, record: &NewSharkAttack) -> Result<UpsertOutcome, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO shark_attacks (
                organization_id, id, active, date, year, type, country, area,
                location, activity, name, sex, age, injury, fatal_y_n, time,
                species, investigator_or_source, pdf, href_formula, href,
                case_number, case_number0, description
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT (organization_id, id) DO UPDATE SET
                active = EXCLUDED.active,
                date = COALESCE(EXCLUDED.date, shark_attacks.date),
                year = COALESCE(EXCLUDED.year, shark_attacks.year),
                type = COALESCE(EXCLUDED.type, shark_attacks.type),
                country = COALESCE(EXCLUDED.country, shark_attacks.country),
                area = COALESCE(EXCLUDED.area, shark_attacks.area),
                location = COALESCE(EXCLUDED.location, shark_attacks.location),
                activity = COALESCE(EXCLUDED.activity, shark_attacks.activity),
                name = COALESCE(EXCLUDED.name, shark_attacks.name),
                sex = COALESCE(EXCLUDED.sex, shark_attacks.sex),
                age = COALESCE(EXCLUDED.age, shark_attacks.age),
                injury = COALESCE(EXCLUDED.injury, shark_attacks.injury),
                fatal_y_n = COALESCE(EXCLUDED.fatal_y_n, shark_attacks.fatal_y_n),
                time = COALESCE(EXCLUDED.time, shark_attacks.time),
                species = COALESCE(EXCLUDED.species, shark_attacks.species),
                investigator_or_source = COALESCE(EXCLUDED.investigator_or_source, shark_attacks.investigator_or_source),
                pdf = COALESCE(EXCLUDED.pdf, shark_attacks.pdf),
                href_formula = COALESCE(EXCLUDED.href_formula, shark_attacks.href_formula),
                href = COALESCE(EXCLUDED.href, shark_attacks.href),
                case_number = COALESCE(EXCLUDED.case_number, shark_attacks.case_number),
                case_number0 = COALESCE(EXCLUDED.case_number0, shark_attacks.case_number0),
                description = COALESCE(EXCLUDED.description, shark_attacks.description),
                updated_at = NOW()
            RETURNING {COLUMNS}, (xmax = 0) AS inserted
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&record.organization_id)
            .bind(&record.id)
            .bind(record.active)
            .bind(&record.fields.date)
            .bind(&record.fields.year)
            .bind(&record.fields.r#type)
            .bind(&record.fields.country)
            .bind(&record.fields.area)
            .bind(&record.fields.location)
            .bind(&record.fields.activity)
            .bind(&record.fields.name)
            .bind(&record.fields.sex)
            .bind(&record.fields.age)
            .bind(&record.fields.injury)
            .bind(&record.fields.fatal_y_n)
            .bind(&record.fields.time)
            .bind(&record.fields.species)
            .bind(&record.fields.investigator_or_source)
            .bind(&record.fields.pdf)
            .bind(&record.fields.href_formula)
            .bind(&record.fields.href)
            .bind(&record.fields.case_number)
            .bind(&record.fields.case_number0)
            .bind(&record.fields.description)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
                    identity: record.id.clone(),
                },
                _ => map_store_err(e),
            })?;

        let inserted: bool = row.try_get("inserted").map_err(map_store_err)?;
        let record = SharkAttackRecord::from_row(&row).map_err(map_store_err)?;
        Ok(UpsertOutcome { record, inserted })
    }

    async fn update_merge(
        &self,
        organization_id: &str,
        id: &str,
        patch: &SharkAttackPatch,
    ) -> Result<SharkAttackRecord, StoreError> {
        let sql = format!(
            r#"
            UPDATE shark_attacks SET
                active = COALESCE($3, active),
                date = COALESCE($4, date),
                year = COALESCE($5, year),
                type = COALESCE($6, type),
                country = COALESCE($7, country),
                area = COALESCE($8, area),
                location = COALESCE($9, location),
                activity = COALESCE($10, activity),
                name = COALESCE($11, name),
                sex = COALESCE($12, sex),
                age = COALESCE($13, age),
                injury = COALESCE($14, injury),
                fatal_y_n = COALESCE($15, fatal_y_n),
                time = COALESCE($16, time),
                species = COALESCE($17, species),
                investigator_or_source = COALESCE($18, investigator_or_source),
                pdf = COALESCE($19, pdf),
                href_formula = COALESCE($20, href_formula),
                href = COALESCE($21, href),
                case_number = COALESCE($22, case_number),
                case_number0 = COALESCE($23, case_number0),
                description = COALESCE($24, description),
                updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, SharkAttackRecord>(&sql)
            .bind(organization_id)
            .bind(id)
            .bind(patch.active)
            .bind(&patch.fields.date)
            .bind(&patch.fields.year)
            .bind(&patch.fields.r#type)
            .bind(&patch.fields.country)
            .bind(&patch.fields.area)
            .bind(&patch.fields.location)
            .bind(&patch.fields.activity)
            .bind(&patch.fields.name)
            .bind(&patch.fields.sex)
            .bind(&patch.fields.age)
            .bind(&patch.fields.injury)
            .bind(&patch.fields.fatal_y_n)
            .bind(&patch.fields.time)
            .bind(&patch.fields.species)
            .bind(&patch.fields.investigator_or_source)
            .bind(&patch.fields.pdf)
            .bind(&patch.fields.href_formula)
            .bind(&patch.fields.href)
            .bind(&patch.fields.case_number)
            .bind(&patch.fields.case_number0)
            .bind(&patch.fields.description)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_store_err)?;

        updated.ok_or_else(|| StoreError::NotFound {
            identity: id.to_string(),
        })
    }

    async fn replace(
        &self,
        organization_id: &str,
        id: &str,
        patch: &SharkAttackPatch,
    ) -> Result<SharkAttackRecord, StoreError> {
        let sql = format!(
            r#"
            UPDATE shark_attacks SET
                active = $3,
                date = $4,
                year = $5,
                type = $6,
                country = $7,
                area = $8,
                location = $9,
                activity = $10,
                name = $11,
                sex = $12,
                age = $13,
                injury = $14,
                fatal_y_n = $15,
                time = $16,
                species = $17,
                investigator_or_source = $18,
                pdf = $19,
                href_formula = $20,
                href = $21,
                case_number = $22,
                case_number0 = $23,
                description = $24,
                updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {COLUMNS}
            "#
        );

        let replaced = sqlx::query_as::<_, SharkAttackRecord>(&sql)
            .bind(organization_id)
            .bind(id)
            .bind(patch.active.unwrap_or(true))
            .bind(&patch.fields.date)
            .bind(&patch.fields.year)
            .bind(&patch.fields.r#type)
            .bind(&patch.fields.country)
            .bind(&patch.fields.area)
            .bind(&patch.fields.location)
            .bind(&patch.fields.activity)
            .bind(&patch.fields.name)
            .bind(&patch.fields.sex)
            .bind(&patch.fields.age)
            .bind(&patch.fields.injury)
            .bind(&patch.fields.fatal_y_n)
            .bind(&patch.fields.time)
            .bind(&patch.fields.species)
            .bind(&patch.fields.investigator_or_source)
            .bind(&patch.fields.pdf)
            .bind(&patch.fields.href_formula)
            .bind(&patch.fields.href)
            .bind(&patch.fields.case_number)
            .bind(&patch.fields.case_number0)
            .bind(&patch.fields.description)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_store_err)?;

        replaced.ok_or_else(|| StoreError::NotFound {
            identity: id.to_string(),
        })
    }

    async fn delete_many(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM shark_attacks WHERE organization_id = $1 AND id = ANY($2)",
        )
        .bind(organization_id)
        .bind(ids)
        .execute(&*self.pool)
        .await
        .map_err(map_store_err)?;

        Ok(result.rows_affected())
    }
}
