//! Human ratings and bulk rescoring with the rule table.

use offerdb_core::{QualityTier, RatedBy, Rating, ScoringRules, StoredRating};
use offerdb_scoring::score_deal;
use serde::Serialize;

use crate::error::PipelineError;
use crate::store::DealStore;

/// Records a human rating for a structured deal, replacing any previous one.
///
/// Without an explicit `score` the previous rating's score is kept, or the
/// rule score is used for a deal that was never rated. Model-derived fields
/// of a previous rating are preserved.
///
/// # Errors
///
/// - [`PipelineError::InvalidScore`] if `score` is outside `1..=10`.
/// - [`PipelineError::DealNotFound`] if no deal has `deal_id`.
/// - [`PipelineError::Store`] if the store fails.
pub async fn rate_deal(
    store: &dyn DealStore,
    rules: &ScoringRules,
    deal_id: i64,
    tier: QualityTier,
    score: Option<u8>,
    reason: Option<String>,
) -> Result<StoredRating, PipelineError> {
    if let Some(score) = score.filter(|s| !(1..=10).contains(s)) {
        return Err(PipelineError::InvalidScore(score));
    }

    let deal = store
        .get_structured_deal(deal_id)
        .await?
        .ok_or(PipelineError::DealNotFound(deal_id))?;
    let previous = store.get_rating(deal_id).await?.map(|stored| stored.rating);

    let score = match (score, previous.as_ref()) {
        (Some(score), _) => score,
        (None, Some(previous)) => previous.score,
        (None, None) => {
            let details = &deal.details;
            score_deal(
                rules,
                &details.merchant_name,
                details.discount_value.as_deref().unwrap_or_default(),
                details.category,
            )
            .score
        }
    };

    let rating = Rating {
        tier,
        score,
        reason,
        model_score: previous.as_ref().and_then(|p| p.model_score),
        model_reasoning: previous.and_then(|p| p.model_reasoning),
        rated_by: RatedBy::Human,
    };

    let stored = store.upsert_rating(deal_id, &rating).await?;
    tracing::info!(deal_id, tier = %tier, score, "deal rated");
    Ok(stored)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescoreReport {
    pub rescored: usize,
    pub good: usize,
    pub mediocre: usize,
    pub bad: usize,
    /// Deals left alone because a human rated them.
    pub skipped_human: usize,
}

/// Recomputes the rules rating of every structured deal.
///
/// Deals carrying a human rating are skipped so editorial decisions survive
/// a change to the rule table.
///
/// # Errors
///
/// Returns [`PipelineError::Store`] if listing or writing fails.
pub async fn rescore_all(
    store: &dyn DealStore,
    rules: &ScoringRules,
) -> Result<RescoreReport, PipelineError> {
    let mut report = RescoreReport::default();

    for deal in store.list_structured_deals().await? {
        let previous = store.get_rating(deal.id).await?;
        if previous.is_some_and(|p| p.rating.rated_by == RatedBy::Human) {
            report.skipped_human += 1;
            continue;
        }

        let details = &deal.details;
        let score = score_deal(
            rules,
            &details.merchant_name,
            details.discount_value.as_deref().unwrap_or_default(),
            details.category,
        );
        match score.tier {
            QualityTier::Good => report.good += 1,
            QualityTier::Mediocre => report.mediocre += 1,
            QualityTier::Bad => report.bad += 1,
        }
        tracing::debug!(
            deal_id = deal.id,
            merchant = %details.merchant_name,
            score = score.score,
            tier = %score.tier,
            "rescored"
        );
        store.upsert_rating(deal.id, &score.into_rating()).await?;
        report.rescored += 1;
    }

    tracing::info!(
        rescored = report.rescored,
        good = report.good,
        mediocre = report.mediocre,
        bad = report.bad,
        skipped_human = report.skipped_human,
        "rescore finished"
    );
    Ok(report)
}
