//! Database operations for `processing_batches` and `batch_members`.
//!
//! A batch freezes an ordered set of `new` raw deals; member positions are
//! 1-based and double as the `temp_id` of exported records.

use chrono::{DateTime, Utc};
use offerdb_core::{BatchMember, BatchStatus, CandidateStatus, ProcessingBatch};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    raw_deals::{RawDealRow, RAW_DEAL_COLUMNS},
    DbError,
};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `processing_batches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub status: String,
    /// The schema defines this as `INTEGER NOT NULL DEFAULT 0`.
    pub deals_count: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub exported_at: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchRow {
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] for an unknown batch status.
    pub fn into_batch(self) -> Result<ProcessingBatch, DbError> {
        let status: BatchStatus = self.status.parse()?;
        Ok(ProcessingBatch {
            id: self.id,
            public_id: self.public_id,
            name: self.name,
            status,
            deals_count: self.deals_count,
            notes: self.notes,
            created_at: self.created_at,
            exported_at: self.exported_at,
            imported_at: self.imported_at,
            completed_at: self.completed_at,
        })
    }
}

/// A batch member joined with its raw deal and, once structured, the
/// structured deal id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchMemberRow {
    pub position: i32,
    pub structured_deal_id: Option<i64>,
    #[sqlx(flatten)]
    pub raw: RawDealRow,
}

impl BatchMemberRow {
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the raw deal fails to convert.
    pub fn into_member(self) -> Result<BatchMember, DbError> {
        Ok(BatchMember {
            position: self.position,
            structured_deal_id: self.structured_deal_id,
            candidate: self.raw.into_candidate()?,
        })
    }
}

const BATCH_COLUMNS: &str = "id, public_id, name, status, deals_count, notes, created_at, \
                             exported_at, imported_at, completed_at";

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Claims up to `limit` of the oldest `new` raw deals into a fresh batch and
/// moves them `new -> processing`.
///
/// Returns `None` without writing anything when no raw deal is `new`.
/// Rows claimed by a concurrent call are skipped, so a raw deal belongs to
/// at most one open batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn create_batch(
    pool: &PgPool,
    name: &str,
    limit: i64,
    notes: Option<&str>,
) -> Result<Option<BatchRow>, DbError> {
    let mut tx = pool.begin().await?;

    let raw_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM raw_deals \
         WHERE status = 'new' \
         ORDER BY id \
         LIMIT $1 \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if raw_ids.is_empty() {
        return Ok(None);
    }

    let deals_count = i32::try_from(raw_ids.len()).unwrap_or(i32::MAX);

    let batch = sqlx::query_as::<_, BatchRow>(&format!(
        "INSERT INTO processing_batches (public_id, name, status, deals_count, notes) \
         VALUES ($1, $2, 'created', $3, $4) \
         RETURNING {BATCH_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(deals_count)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO batch_members (batch_id, raw_deal_id, position) \
         SELECT $1, member.raw_deal_id, member.position::int \
         FROM UNNEST($2::bigint[]) WITH ORDINALITY AS member(raw_deal_id, position)",
    )
    .bind(batch.id)
    .bind(&raw_ids)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE raw_deals SET status = 'processing', updated_at = NOW() \
         WHERE id = ANY($1) AND status = 'new'",
    )
    .bind(&raw_ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(batch))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_batch(pool: &PgPool, id: i64) -> Result<Option<BatchRow>, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM processing_batches WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent batches first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_batches(pool: &PgPool, limit: i64) -> Result<Vec<BatchRow>, DbError> {
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM processing_batches ORDER BY id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a batch's members in position order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_batch_members(
    pool: &PgPool,
    batch_id: i64,
) -> Result<Vec<BatchMemberRow>, DbError> {
    let rows = sqlx::query_as::<_, BatchMemberRow>(&format!(
        "SELECT m.position, sd.id AS structured_deal_id, {RAW_DEAL_COLUMNS} \
         FROM batch_members m \
         JOIN raw_deals r ON r.id = m.raw_deal_id \
         JOIN sources s ON s.id = r.source_id \
         LEFT JOIN structured_deals sd ON sd.raw_deal_id = r.id \
         WHERE m.batch_id = $1 \
         ORDER BY m.position"
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Moves a `created` batch to `processing`; other statuses are kept.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no batch has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_batch_processing(pool: &PgPool, id: i64) -> Result<BatchRow, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "UPDATE processing_batches SET \
             status = CASE WHEN status = 'created' THEN 'processing' ELSE status END \
         WHERE id = $1 \
         RETURNING {BATCH_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Stamps `exported_at` and moves a `created` batch to `processing`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no batch has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_batch_exported(pool: &PgPool, id: i64) -> Result<BatchRow, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "UPDATE processing_batches SET \
             exported_at = NOW(), \
             status = CASE WHEN status = 'created' THEN 'processing' ELSE status END \
         WHERE id = $1 \
         RETURNING {BATCH_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Stamps `imported_at` and moves a `created` batch to `processing`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no batch has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_batch_imported(pool: &PgPool, id: i64) -> Result<BatchRow, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "UPDATE processing_batches SET \
             imported_at = NOW(), \
             status = CASE WHEN status = 'created' THEN 'processing' ELSE status END \
         WHERE id = $1 \
         RETURNING {BATCH_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Recomputes a batch's status from its members' raw-deal statuses.
///
/// The batch completes only when every member is terminal; `completed_at`
/// is stamped on that transition. Completed batches never reopen.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no batch has this id,
/// [`DbError::Decode`] for an unknown stored status, or [`DbError::Sqlx`]
/// if a query fails.
pub async fn refresh_batch_status(pool: &PgPool, id: i64) -> Result<BatchStatus, DbError> {
    let mut tx = pool.begin().await?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM processing_batches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let current: BatchStatus = current.ok_or(DbError::NotFound)?.parse()?;

    let member_statuses: Vec<String> = sqlx::query_scalar(
        "SELECT r.status FROM batch_members m \
         JOIN raw_deals r ON r.id = m.raw_deal_id \
         WHERE m.batch_id = $1",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let members = member_statuses
        .iter()
        .map(|s| s.parse::<CandidateStatus>())
        .collect::<Result<Vec<_>, _>>()?;

    let next = BatchStatus::from_members(current, &members);
    if next != current {
        sqlx::query(
            "UPDATE processing_batches SET \
                 status = $1, \
                 completed_at = CASE WHEN $1 = 'completed' THEN NOW() ELSE completed_at END \
             WHERE id = $2",
        )
        .bind(next.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(next)
}
