//! Editorial corrections to structured deals.

use chrono::NaiveDate;
use offerdb_core::{Category, DealDetails, DiscountType, RatedBy, ScoringRules, StructuredDeal};
use offerdb_scoring::score_deal;
use serde::Deserialize;

use crate::error::{PipelineError, StructuringError};
use crate::store::DealStore;

/// Fields to overwrite on a structured deal. Absent fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DealPatch {
    pub merchant_name: Option<String>,
    pub offer_title: Option<String>,
    pub description: Option<String>,
    pub discount_value: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub category: Option<Category>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub location: Option<String>,
    pub applicable_cards: Option<String>,
    pub terms_conditions: Option<String>,
    pub promo_code: Option<String>,
    pub source_url: Option<String>,
    pub is_active: Option<bool>,
}

impl DealPatch {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidJson`] for malformed JSON or an
    /// unknown field or enum value.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `details` with this patch applied.
    ///
    /// # Errors
    ///
    /// Returns [`StructuringError`] if the result has a blank merchant or
    /// title.
    pub fn apply(&self, details: &DealDetails) -> Result<DealDetails, StructuringError> {
        fn pick<T: Clone>(patch: Option<&T>, current: &T) -> T {
            patch.cloned().unwrap_or_else(|| current.clone())
        }
        fn pick_opt<T: Clone>(patch: Option<&T>, current: Option<&T>) -> Option<T> {
            patch.or(current).cloned()
        }

        let merchant_name = pick(self.merchant_name.as_ref(), &details.merchant_name)
            .trim()
            .to_string();
        if merchant_name.is_empty() {
            return Err(StructuringError::MissingMerchant);
        }
        let offer_title = pick(self.offer_title.as_ref(), &details.offer_title)
            .trim()
            .to_string();
        if offer_title.is_empty() {
            return Err(StructuringError::MissingTitle);
        }

        Ok(DealDetails {
            merchant_name,
            offer_title,
            description: pick_opt(self.description.as_ref(), details.description.as_ref()),
            discount_value: pick_opt(self.discount_value.as_ref(), details.discount_value.as_ref()),
            discount_type: self.discount_type.unwrap_or(details.discount_type),
            category: self.category.unwrap_or(details.category),
            valid_from: self.valid_from.or(details.valid_from),
            valid_until: self.valid_until.or(details.valid_until),
            location: pick_opt(self.location.as_ref(), details.location.as_ref()),
            applicable_cards: pick_opt(
                self.applicable_cards.as_ref(),
                details.applicable_cards.as_ref(),
            ),
            terms_conditions: pick_opt(
                self.terms_conditions.as_ref(),
                details.terms_conditions.as_ref(),
            ),
            promo_code: pick_opt(self.promo_code.as_ref(), details.promo_code.as_ref()),
            source_url: pick_opt(self.source_url.as_ref(), details.source_url.as_ref()),
            is_active: self.is_active.unwrap_or(details.is_active),
        })
    }
}

/// Applies `patch` to a structured deal.
///
/// A rules rating is recomputed from the corrected fields; a human rating
/// is left as it is.
///
/// # Errors
///
/// - [`PipelineError::DealNotFound`] if no deal has `deal_id`.
/// - [`PipelineError::InvalidDeal`] if the patch blanks the merchant or title.
/// - [`PipelineError::Store`] if the store fails.
pub async fn correct_deal(
    store: &dyn DealStore,
    rules: &ScoringRules,
    deal_id: i64,
    patch: &DealPatch,
) -> Result<StructuredDeal, PipelineError> {
    let current = store
        .get_structured_deal(deal_id)
        .await?
        .ok_or(PipelineError::DealNotFound(deal_id))?;

    let details = patch.apply(&current.details)?;
    let deal = store.update_structured_deal(deal_id, &details).await?;

    let rating = store.get_rating(deal_id).await?;
    if rating.is_none_or(|r| r.rating.rated_by == RatedBy::Rules) {
        let score = score_deal(
            rules,
            &details.merchant_name,
            details.discount_value.as_deref().unwrap_or_default(),
            details.category,
        );
        store.upsert_rating(deal_id, &score.into_rating()).await?;
    }

    tracing::info!(deal_id, merchant = %deal.details.merchant_name, "deal corrected");
    Ok(deal)
}
