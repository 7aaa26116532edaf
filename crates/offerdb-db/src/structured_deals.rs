//! Database operations for `structured_deals`.

use chrono::{DateTime, NaiveDate, Utc};
use offerdb_core::{Category, DealDetails, DiscountType, Rating, StructuredDeal};
use sqlx::PgPool;

use crate::{ratings::write_rating, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `structured_deals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StructuredDealRow {
    pub id: i64,
    pub raw_deal_id: i64,
    pub merchant_name: String,
    pub offer_title: String,
    pub description: Option<String>,
    pub discount_value: Option<String>,
    pub discount_type: String,
    pub category: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub location: Option<String>,
    pub applicable_cards: Option<String>,
    pub terms_conditions: Option<String>,
    pub promo_code: Option<String>,
    pub source_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StructuredDealRow {
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if `discount_type` or `category` holds a
    /// value outside its enum.
    pub fn into_deal(self) -> Result<StructuredDeal, DbError> {
        let discount_type: DiscountType = self.discount_type.parse()?;
        let category: Category = self.category.parse()?;

        Ok(StructuredDeal {
            id: self.id,
            raw_candidate_id: self.raw_deal_id,
            details: DealDetails {
                merchant_name: self.merchant_name,
                offer_title: self.offer_title,
                description: self.description,
                discount_value: self.discount_value,
                discount_type,
                category,
                valid_from: self.valid_from,
                valid_until: self.valid_until,
                location: self.location,
                applicable_cards: self.applicable_cards,
                terms_conditions: self.terms_conditions,
                promo_code: self.promo_code,
                source_url: self.source_url,
                is_active: self.is_active,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DEAL_COLUMNS: &str = "id, raw_deal_id, merchant_name, offer_title, description, \
                            discount_value, discount_type, category, valid_from, valid_until, \
                            location, applicable_cards, terms_conditions, promo_code, \
                            source_url, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Structures a raw deal: inserts the deal, its optional rating, and moves
/// the raw deal `processing -> processed`, all in one transaction.
///
/// Returns the new structured deal id.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the raw deal is not
/// `processing` (nothing is written), [`DbError::ScoreOutOfRange`] for a bad
/// rating, or [`DbError::Sqlx`] if any statement fails.
pub async fn insert_structured_deal(
    pool: &PgPool,
    raw_deal_id: i64,
    details: &DealDetails,
    rating: Option<&Rating>,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let moved = sqlx::query(
        "UPDATE raw_deals \
         SET status = 'processed', error_message = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(raw_deal_id)
    .execute(&mut *tx)
    .await?;

    if moved.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            table: "raw_deals",
            id: raw_deal_id,
            expected_status: "processing",
        });
    }

    let deal_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO structured_deals (raw_deal_id, merchant_name, offer_title, description, \
                                       discount_value, discount_type, category, valid_from, \
                                       valid_until, location, applicable_cards, \
                                       terms_conditions, promo_code, source_url, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING id",
    )
    .bind(raw_deal_id)
    .bind(&details.merchant_name)
    .bind(&details.offer_title)
    .bind(&details.description)
    .bind(&details.discount_value)
    .bind(details.discount_type.as_str())
    .bind(details.category.as_str())
    .bind(details.valid_from)
    .bind(details.valid_until)
    .bind(&details.location)
    .bind(&details.applicable_cards)
    .bind(&details.terms_conditions)
    .bind(&details.promo_code)
    .bind(&details.source_url)
    .bind(details.is_active)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(rating) = rating {
        write_rating(&mut *tx, deal_id, rating).await?;
    }

    tx.commit().await?;
    Ok(deal_id)
}

/// Replaces the editable fields of a structured deal.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no deal has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_structured_deal(
    pool: &PgPool,
    id: i64,
    details: &DealDetails,
) -> Result<StructuredDealRow, DbError> {
    let row = sqlx::query_as::<_, StructuredDealRow>(&format!(
        "UPDATE structured_deals SET \
             merchant_name = $2, offer_title = $3, description = $4, discount_value = $5, \
             discount_type = $6, category = $7, valid_from = $8, valid_until = $9, \
             location = $10, applicable_cards = $11, terms_conditions = $12, \
             promo_code = $13, source_url = $14, is_active = $15, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {DEAL_COLUMNS}"
    ))
    .bind(id)
    .bind(&details.merchant_name)
    .bind(&details.offer_title)
    .bind(&details.description)
    .bind(&details.discount_value)
    .bind(details.discount_type.as_str())
    .bind(details.category.as_str())
    .bind(details.valid_from)
    .bind(details.valid_until)
    .bind(&details.location)
    .bind(&details.applicable_cards)
    .bind(&details.terms_conditions)
    .bind(&details.promo_code)
    .bind(&details.source_url)
    .bind(details.is_active)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_structured_deal(
    pool: &PgPool,
    id: i64,
) -> Result<Option<StructuredDealRow>, DbError> {
    let row = sqlx::query_as::<_, StructuredDealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM structured_deals WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every structured deal ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_structured_deals(pool: &PgPool) -> Result<Vec<StructuredDealRow>, DbError> {
    let rows = sqlx::query_as::<_, StructuredDealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM structured_deals ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
