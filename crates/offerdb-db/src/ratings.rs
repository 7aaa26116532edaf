//! Database operations for the `ratings` table. One rating per structured
//! deal; writes are upserts keyed by `deal_id`.

use chrono::{DateTime, Utc};
use offerdb_core::{QualityTier, RatedBy, Rating, StoredRating};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `ratings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RatingRow {
    pub id: i64,
    pub deal_id: i64,
    pub quality_tier: String,
    pub score: i16,
    pub reason: Option<String>,
    pub model_score: Option<i16>,
    pub model_reasoning: Option<String>,
    pub rated_by: String,
    pub rated_at: DateTime<Utc>,
}

impl RatingRow {
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] for an unknown tier or origin, or
    /// [`DbError::ScoreOutOfRange`] if a score escaped the table CHECK.
    pub fn into_stored(self) -> Result<StoredRating, DbError> {
        let tier: QualityTier = self.quality_tier.parse()?;
        let rated_by: RatedBy = self.rated_by.parse()?;
        let model_score = self.model_score.map(score_from_db).transpose()?;

        Ok(StoredRating {
            deal_id: self.deal_id,
            rating: Rating {
                tier,
                score: score_from_db(self.score)?,
                reason: self.reason,
                model_score,
                model_reasoning: self.model_reasoning,
                rated_by,
            },
            rated_at: self.rated_at,
        })
    }
}

fn score_from_db(score: i16) -> Result<u8, DbError> {
    u8::try_from(score)
        .ok()
        .filter(|s| (1..=10).contains(s))
        .ok_or(DbError::ScoreOutOfRange(score))
}

fn check_score(score: u8) -> Result<i16, DbError> {
    if (1..=10).contains(&score) {
        Ok(i16::from(score))
    } else {
        Err(DbError::ScoreOutOfRange(i16::from(score)))
    }
}

/// Inserts or replaces the rating for `deal_id` through any executor, so
/// it can share a transaction with the structured-deal insert.
pub(crate) async fn write_rating<'e, E>(
    executor: E,
    deal_id: i64,
    rating: &Rating,
) -> Result<RatingRow, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let score = check_score(rating.score)?;
    let model_score = rating.model_score.map(check_score).transpose()?;

    let row = sqlx::query_as::<_, RatingRow>(
        "INSERT INTO ratings (deal_id, quality_tier, score, reason, model_score, \
                              model_reasoning, rated_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (deal_id) DO UPDATE SET \
             quality_tier = EXCLUDED.quality_tier, \
             score = EXCLUDED.score, \
             reason = EXCLUDED.reason, \
             model_score = EXCLUDED.model_score, \
             model_reasoning = EXCLUDED.model_reasoning, \
             rated_by = EXCLUDED.rated_by, \
             rated_at = NOW() \
         RETURNING id, deal_id, quality_tier, score, reason, model_score, model_reasoning, \
                   rated_by, rated_at",
    )
    .bind(deal_id)
    .bind(rating.tier.as_str())
    .bind(score)
    .bind(&rating.reason)
    .bind(model_score)
    .bind(&rating.model_reasoning)
    .bind(rating.rated_by.as_str())
    .fetch_one(executor)
    .await?;

    Ok(row)
}

/// Upserts the rating for a structured deal.
///
/// # Errors
///
/// Returns [`DbError::ScoreOutOfRange`] if a score is outside `1..=10`,
/// or [`DbError::Sqlx`] if the write fails (including an unknown deal id).
pub async fn upsert_rating(
    pool: &PgPool,
    deal_id: i64,
    rating: &Rating,
) -> Result<RatingRow, DbError> {
    write_rating(pool, deal_id, rating).await
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_rating(pool: &PgPool, deal_id: i64) -> Result<Option<RatingRow>, DbError> {
    let row = sqlx::query_as::<_, RatingRow>(
        "SELECT id, deal_id, quality_tier, score, reason, model_score, model_reasoning, \
                rated_by, rated_at \
         FROM ratings WHERE deal_id = $1",
    )
    .bind(deal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_outside_range_are_rejected_before_writing() {
        assert!(matches!(check_score(0), Err(DbError::ScoreOutOfRange(0))));
        assert!(matches!(check_score(11), Err(DbError::ScoreOutOfRange(11))));
        assert_eq!(check_score(10).ok(), Some(10));
    }

    #[test]
    fn row_converts_into_stored_rating() {
        let row = RatingRow {
            id: 1,
            deal_id: 42,
            quality_tier: "good".to_string(),
            score: 8,
            reason: Some("Popular brand".to_string()),
            model_score: None,
            model_reasoning: None,
            rated_by: "human".to_string(),
            rated_at: Utc::now(),
        };

        let stored = row.into_stored().expect("valid row");
        assert_eq!(stored.deal_id, 42);
        assert_eq!(stored.rating.tier, QualityTier::Good);
        assert_eq!(stored.rating.score, 8);
        assert_eq!(stored.rating.rated_by, RatedBy::Human);
    }

    #[test]
    fn row_with_negative_score_fails_to_convert() {
        let row = RatingRow {
            id: 1,
            deal_id: 1,
            quality_tier: "bad".to_string(),
            score: -3,
            reason: None,
            model_score: None,
            model_reasoning: None,
            rated_by: "rules".to_string(),
            rated_at: Utc::now(),
        };

        assert!(matches!(
            row.into_stored(),
            Err(DbError::ScoreOutOfRange(-3))
        ));
    }
}
