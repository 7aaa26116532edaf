//! Database operations for the `sources` table.

use chrono::{DateTime, Utc};
use offerdb_core::{RenderMode, SourceRecord};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub url: String,
    pub extractor: String,
    pub render_mode: String,
    pub default_cards: Option<String>,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRow {
    /// Converts the row into the domain record the fetchers consume.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if `render_mode` holds an unknown value.
    pub fn into_record(self) -> Result<SourceRecord, DbError> {
        let render: RenderMode = self.render_mode.parse()?;
        Ok(SourceRecord {
            id: self.id,
            slug: self.slug,
            name: self.name,
            url: self.url,
            extractor: self.extractor,
            render,
            default_cards: self.default_cards,
            is_active: self.is_active,
            last_fetched_at: self.last_fetched_at,
        })
    }
}

const SOURCE_COLUMNS: &str = "id, slug, name, url, extractor, render_mode, default_cards, \
                              is_active, last_fetched_at, created_at, updated_at";

/// Returns every source, active or not, ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sources(pool: &PgPool) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all active sources ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_sources(pool: &PgPool) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE is_active = true ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the source with the given slug, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_source_by_slug(pool: &PgPool, slug: &str) -> Result<Option<SourceRow>, DbError> {
    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Stamps `last_fetched_at = NOW()` after a successful run.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no source has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn touch_source_fetched(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sources SET last_fetched_at = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
