//! Rules-based structuring of raw candidates into deals.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Utc;
use offerdb_core::{
    BatchStatus, CandidateStatus, CategoryKeywords, DealDetails, DiscountType, RawCandidate,
    RulesFile, ScoringRules,
};
use offerdb_scoring::score_deal;
use offerdb_scraper::{infer_category, parse_validity_window};
use regex::Regex;
use serde::Serialize;

use crate::error::{PipelineError, StructuringError};
use crate::store::DealStore;

const MAX_TITLE_CHARS: usize = 200;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*%").expect("valid percent regex"));

static BUY_X_GET_Y_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bbuy\s+(?:\d+|one|two|three)\s+get\s+(?:\d+|one|two|three)\b|\b\d+\s*\+\s*\d+\b|\bbogo\b",
    )
    .expect("valid buy-x-get-y regex")
});

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sar|sr)\s*\d+(?:[.,]\d+)?|\d+(?:[.,]\d+)?\s*(?:sar|sr|riyals?)\b")
        .expect("valid currency regex")
});

static PROMO_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:promo|coupon|discount|voucher)?\s*code\s*[:\-]?\s*["'“]?([a-z0-9][a-z0-9_-]{2,19})"#,
    )
    .expect("valid promo code regex")
});

/// Configuration consumed by structuring: scoring and category rules plus
/// the year assumed for dates written without one.
#[derive(Debug, Clone)]
pub struct StructuringRules {
    pub scoring: ScoringRules,
    pub keywords: CategoryKeywords,
    pub fallback_year: i32,
}

impl StructuringRules {
    #[must_use]
    pub fn new(rules: RulesFile, fallback_year: i32) -> Self {
        Self {
            scoring: rules.scoring,
            keywords: rules.categories,
            fallback_year,
        }
    }
}

/// Discount type implied by free text: a percentage wins, then
/// buy-N-get-M offers, then a currency amount.
#[must_use]
pub fn infer_discount_type(text: &str) -> DiscountType {
    if text.contains('%') {
        DiscountType::Percentage
    } else if BUY_X_GET_Y_RE.is_match(text) {
        DiscountType::BuyXGetY
    } else if CURRENCY_RE.is_match(text) {
        DiscountType::FixedAmount
    } else {
        DiscountType::Other
    }
}

/// First code-like token after "code" that is written in capitals or
/// digits, e.g. `SAVE20` in "use promo code: SAVE20".
#[must_use]
pub fn extract_promo_code(text: &str) -> Option<String> {
    PROMO_CODE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|code| {
            !code.chars().any(|c| c.is_ascii_lowercase())
                && code.chars().any(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn discount_value(candidate: &RawCandidate) -> Option<String> {
    let draft = &candidate.draft;
    non_empty(draft.discount.as_deref()).or_else(|| {
        [Some(draft.title.as_str()), draft.description.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| {
                PERCENT_RE
                    .find(text)
                    .or_else(|| CURRENCY_RE.find(text))
                    .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
            })
    })
}

/// Builds the structured form of a raw candidate without touching the
/// store. `default_cards` is the source's applicable-cards text, used when
/// the page named none.
///
/// # Errors
///
/// - [`StructuringError::MissingTitle`] if the title is blank.
/// - [`StructuringError::MissingMerchant`] if no merchant was extracted.
pub fn auto_structure(
    candidate: &RawCandidate,
    default_cards: Option<&str>,
    rules: &StructuringRules,
) -> Result<DealDetails, StructuringError> {
    let draft = &candidate.draft;

    let title = draft.title.trim();
    if title.is_empty() {
        return Err(StructuringError::MissingTitle);
    }
    let merchant_name =
        non_empty(draft.merchant.as_deref()).ok_or(StructuringError::MissingMerchant)?;

    let discount_value = discount_value(candidate);
    let type_text = format!(
        "{} {}",
        discount_value.as_deref().unwrap_or_default(),
        title
    );

    let category = draft.category.unwrap_or_else(|| {
        let text = [Some(title), Some(merchant_name.as_str()), draft.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        infer_category(&text, &rules.keywords)
    });

    let window = [draft.validity.as_deref(), draft.description.as_deref()]
        .into_iter()
        .flatten()
        .map(|text| parse_validity_window(text, rules.fallback_year))
        .find(|w| !w.is_empty())
        .unwrap_or_default();

    let promo_code = [Some(title), draft.description.as_deref(), draft.terms.as_deref()]
        .into_iter()
        .flatten()
        .find_map(extract_promo_code);

    Ok(DealDetails {
        merchant_name,
        offer_title: title.chars().take(MAX_TITLE_CHARS).collect(),
        description: non_empty(draft.description.as_deref()),
        discount_type: infer_discount_type(&type_text),
        discount_value,
        category,
        valid_from: window.from,
        valid_until: window.until,
        location: None,
        applicable_cards: non_empty(draft.applicable_cards.as_deref())
            .or_else(|| non_empty(default_cards)),
        terms_conditions: non_empty(draft.terms.as_deref()),
        promo_code,
        source_url: non_empty(draft.origin_url.as_deref()),
        is_active: true,
    })
}

/// Outcome of structuring one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_id: i64,
    pub structured: usize,
    pub errors: usize,
    /// Members that were no longer `processing`.
    pub skipped: usize,
    pub status: BatchStatus,
}

/// Structures every `processing` member of a batch with the rule table.
///
/// Each success writes the deal, a rules rating, and the `processed`
/// status together. A member that can't be structured moves to `error`
/// and the batch carries on. A `created` batch moves to `processing` before
/// the first member, and the status is refreshed at the end.
///
/// # Errors
///
/// Returns [`PipelineError::BatchNotFound`] for an unknown batch, or
/// [`PipelineError::Store`] if the store fails outside a single member.
pub async fn process_batch(
    store: &dyn DealStore,
    batch_id: i64,
    rules: &StructuringRules,
) -> Result<BatchReport, PipelineError> {
    store
        .get_batch(batch_id)
        .await?
        .ok_or(PipelineError::BatchNotFound(batch_id))?;
    store.mark_batch_processing(batch_id).await?;

    let default_cards: HashMap<i64, Option<String>> = store
        .sources()
        .await?
        .into_iter()
        .map(|s| (s.id, s.default_cards))
        .collect();

    let mut report = BatchReport {
        batch_id,
        structured: 0,
        errors: 0,
        skipped: 0,
        status: BatchStatus::Created,
    };

    for member in store.batch_members(batch_id).await? {
        let candidate = &member.candidate;
        if candidate.status != CandidateStatus::Processing {
            report.skipped += 1;
            continue;
        }

        let cards = default_cards
            .get(&candidate.source_id)
            .and_then(Option::as_deref);

        let failure = match auto_structure(candidate, cards, rules) {
            Ok(details) => {
                let rating = score_deal(
                    &rules.scoring,
                    &details.merchant_name,
                    details.discount_value.as_deref().unwrap_or_default(),
                    details.category,
                )
                .into_rating();
                match store
                    .insert_structured_deal(candidate.id, &details, Some(&rating))
                    .await
                {
                    Ok(_) => None,
                    Err(e) => Some(e.to_string()),
                }
            }
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => report.structured += 1,
            Some(message) => {
                tracing::debug!(raw_id = candidate.id, error = %message, "structuring failed");
                store.mark_candidate_error(candidate.id, &message).await?;
                report.errors += 1;
            }
        }
    }

    report.status = store.refresh_batch_status(batch_id).await?;
    tracing::info!(
        batch_id,
        structured = report.structured,
        errors = report.errors,
        skipped = report.skipped,
        status = %report.status,
        "batch structured"
    );
    Ok(report)
}

/// Claims up to `limit` new candidates into a fresh batch and structures
/// it. `None` when nothing was waiting.
///
/// # Errors
///
/// Returns [`PipelineError`] if batch creation or processing fails.
pub async fn structure_pending(
    store: &dyn DealStore,
    rules: &StructuringRules,
    limit: usize,
) -> Result<Option<BatchReport>, PipelineError> {
    let name = format!("auto {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let Some(batch) = store.create_batch(&name, limit).await? else {
        tracing::info!("no new candidates to structure");
        return Ok(None);
    };
    process_batch(store, batch.id, rules).await.map(Some)
}

#[cfg(test)]
#[path = "structuring_test.rs"]
mod tests;
