//! Database operations for the `raw_deals` table.
//!
//! A raw deal is immutable after insert apart from `status` and
//! `error_message`. Status moves are conditional updates so an illegal
//! transition affects zero rows and surfaces as
//! [`DbError::InvalidStatusTransition`].

use chrono::{DateTime, Utc};
use offerdb_core::{CandidateDraft, CandidateStatus, Category, NewRawCandidate, RawCandidate};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `raw_deals` joined with its source's display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawDealRow {
    pub id: i64,
    pub source_id: i64,
    pub source_name: String,
    pub raw_title: String,
    pub raw_description: Option<String>,
    pub raw_merchant: Option<String>,
    pub raw_discount: Option<String>,
    pub raw_validity: Option<String>,
    pub raw_terms: Option<String>,
    pub raw_category: Option<String>,
    pub raw_applicable_cards: Option<String>,
    pub origin_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub fingerprint: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RawDealRow {
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if `status` or `raw_category` holds a
    /// value outside its enum.
    pub fn into_candidate(self) -> Result<RawCandidate, DbError> {
        let status: CandidateStatus = self.status.parse()?;
        let category = self
            .raw_category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?;

        Ok(RawCandidate {
            id: self.id,
            source_id: self.source_id,
            source_name: self.source_name,
            draft: CandidateDraft {
                title: self.raw_title,
                description: self.raw_description,
                merchant: self.raw_merchant,
                discount: self.raw_discount,
                validity: self.raw_validity,
                terms: self.raw_terms,
                origin_url: self.origin_url,
                category,
                applicable_cards: self.raw_applicable_cards,
            },
            fetched_at: self.fetched_at,
            fingerprint: self.fingerprint,
            status,
            error_message: self.error_message,
        })
    }
}

/// Columns of [`RawDealRow`], qualified for `raw_deals r JOIN sources s`.
pub(crate) const RAW_DEAL_COLUMNS: &str = "r.id, r.source_id, s.name AS source_name, \
     r.raw_title, r.raw_description, r.raw_merchant, r.raw_discount, r.raw_validity, \
     r.raw_terms, r.raw_category, r.raw_applicable_cards, r.origin_url, r.fetched_at, \
     r.fingerprint, r.status, r.error_message, r.created_at, r.updated_at";

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Returns the id of the raw deal already holding `fingerprint`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_fingerprint(pool: &PgPool, fingerprint: &str) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM raw_deals WHERE fingerprint = $1")
        .bind(fingerprint)
        .fetch_optional(pool)
        .await?;

    Ok(id)
}

/// Inserts a candidate unless its fingerprint is already stored.
///
/// Returns `Some(id)` for a new row and `None` when the fingerprint
/// collided. The check and insert are one statement, so two concurrent
/// runs can never both insert the same fingerprint.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any reason other
/// than the fingerprint conflict.
pub async fn insert_raw_deal_if_new(
    pool: &PgPool,
    candidate: &NewRawCandidate,
) -> Result<Option<i64>, DbError> {
    let draft = &candidate.draft;
    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO raw_deals (source_id, raw_title, raw_description, raw_merchant, \
                                raw_discount, raw_validity, raw_terms, raw_category, \
                                raw_applicable_cards, origin_url, fetched_at, fingerprint, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'new') \
         ON CONFLICT (fingerprint) DO NOTHING \
         RETURNING id",
    )
    .bind(candidate.source_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.merchant)
    .bind(&draft.discount)
    .bind(&draft.validity)
    .bind(&draft.terms)
    .bind(draft.category.map(|c| c.as_str()))
    .bind(&draft.applicable_cards)
    .bind(&draft.origin_url)
    .bind(candidate.fetched_at)
    .bind(&candidate.fingerprint)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_raw_deal(pool: &PgPool, id: i64) -> Result<Option<RawDealRow>, DbError> {
    let row = sqlx::query_as::<_, RawDealRow>(&format!(
        "SELECT {RAW_DEAL_COLUMNS} FROM raw_deals r JOIN sources s ON s.id = r.source_id \
         WHERE r.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns up to `limit` raw deals in `status`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_raw_deals_by_status(
    pool: &PgPool,
    status: CandidateStatus,
    limit: i64,
) -> Result<Vec<RawDealRow>, DbError> {
    let rows = sqlx::query_as::<_, RawDealRow>(&format!(
        "SELECT {RAW_DEAL_COLUMNS} FROM raw_deals r JOIN sources s ON s.id = r.source_id \
         WHERE r.status = $1 ORDER BY r.id LIMIT $2"
    ))
    .bind(status.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Row counts per status, ordered by status name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_raw_deals_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM raw_deals GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Moves a `processing` raw deal to `error` with a message.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the row is not
/// `processing`, or [`DbError::Sqlx`] if the update fails.
pub async fn mark_raw_deal_error(pool: &PgPool, id: i64, message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE raw_deals \
         SET status = 'error', error_message = $1, updated_at = NOW() \
         WHERE id = $2 AND status = 'processing'",
    )
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            table: "raw_deals",
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}
