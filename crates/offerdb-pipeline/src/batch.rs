//! JSON export of a batch for offline curation and import of the curated
//! records back into structured deals.
//!
//! Records are matched by `temp_id`, the member's 1-based position in the
//! batch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use offerdb_core::{
    BatchMember, BatchStatus, CandidateStatus, Category, DealDetails, DiscountType,
};
use offerdb_scoring::score_deal;
use offerdb_scraper::parse_validity_date;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, StructuringError};
use crate::store::DealStore;
use crate::structuring::{infer_discount_type, StructuringRules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExport {
    pub batch_id: i64,
    pub exported_at: DateTime<Utc>,
    pub deals: Vec<ExportedDeal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDeal {
    pub temp_id: i32,
    pub raw_title: String,
    pub raw_description: Option<String>,
    pub raw_merchant: Option<String>,
    pub raw_discount: Option<String>,
    pub raw_validity: Option<String>,
    pub raw_terms: Option<String>,
    /// Display name of the source, e.g. `"Alrajhi Bank"`.
    pub source: String,
}

impl From<&BatchMember> for ExportedDeal {
    fn from(member: &BatchMember) -> Self {
        let draft = &member.candidate.draft;
        Self {
            temp_id: member.position,
            raw_title: draft.title.clone(),
            raw_description: draft.description.clone(),
            raw_merchant: draft.merchant.clone(),
            raw_discount: draft.discount.clone(),
            raw_validity: draft.validity.clone(),
            raw_terms: draft.terms.clone(),
            source: member.candidate.source_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchImport {
    pub deals: Vec<ImportedDeal>,
}

/// One curated record. Only `temp_id` is required to parse; a record
/// without merchant or title fails its member, not the whole import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportedDeal {
    pub temp_id: i32,
    pub merchant_name: Option<String>,
    pub offer_title: Option<String>,
    pub description: Option<String>,
    pub discount_value: Option<String>,
    pub discount_type: Option<String>,
    pub category: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub location: Option<String>,
    pub applicable_cards: Option<String>,
    pub terms_conditions: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub batch_id: i64,
    pub imported: usize,
    pub errors: usize,
    /// Records whose member was no longer `processing`.
    pub skipped: usize,
    pub unknown_temp_ids: Vec<i32>,
    pub status: BatchStatus,
}

/// Parses an import document.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidJson`] for malformed JSON or a non-numeric
/// `temp_id`. A missing `temp_id` reads as 0 and matches no member.
pub fn parse_import(json: &str) -> Result<BatchImport, PipelineError> {
    Ok(serde_json::from_str(json)?)
}

/// Accepts `YYYY-MM-DD`, then anything the validity parser understands.
#[must_use]
pub fn parse_import_date(text: &str, fallback_year: i32) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_validity_date(text, fallback_year))
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ImportedDeal {
    /// Builds deal fields from the record. Unknown enum strings become
    /// `other`; a missing discount type is inferred from the discount value.
    ///
    /// # Errors
    ///
    /// Returns [`StructuringError`] when merchant or title is missing.
    pub fn to_details(
        &self,
        member: &BatchMember,
        fallback_year: i32,
    ) -> Result<DealDetails, StructuringError> {
        let merchant_name =
            present(self.merchant_name.as_deref()).ok_or(StructuringError::MissingMerchant)?;
        let offer_title =
            present(self.offer_title.as_deref()).ok_or(StructuringError::MissingTitle)?;
        let discount_value = present(self.discount_value.as_deref());

        let discount_type = match present(self.discount_type.as_deref()) {
            Some(value) => value.parse().unwrap_or(DiscountType::Other),
            None => infer_discount_type(discount_value.as_deref().unwrap_or_default()),
        };
        let category = self
            .category
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(Category::Other);
        let date = |value: Option<&str>| value.and_then(|v| parse_import_date(v, fallback_year));

        Ok(DealDetails {
            merchant_name,
            offer_title,
            description: present(self.description.as_deref()),
            discount_value,
            discount_type,
            category,
            valid_from: date(self.valid_from.as_deref()),
            valid_until: date(self.valid_until.as_deref()),
            location: present(self.location.as_deref()),
            applicable_cards: present(self.applicable_cards.as_deref()),
            terms_conditions: present(self.terms_conditions.as_deref()),
            promo_code: present(self.promo_code.as_deref()),
            source_url: member.candidate.draft.origin_url.clone(),
            is_active: true,
        })
    }
}

/// Exports every member of a batch and stamps the batch as exported.
///
/// # Errors
///
/// Returns [`PipelineError::BatchNotFound`] for an unknown batch, or
/// [`PipelineError::Store`] if the store fails.
pub async fn export_batch(
    store: &dyn DealStore,
    batch_id: i64,
) -> Result<BatchExport, PipelineError> {
    store
        .get_batch(batch_id)
        .await?
        .ok_or(PipelineError::BatchNotFound(batch_id))?;

    let members = store.batch_members(batch_id).await?;
    let batch = store.mark_batch_exported(batch_id).await?;

    Ok(BatchExport {
        batch_id,
        exported_at: batch.exported_at.unwrap_or_else(Utc::now),
        deals: members.iter().map(ExportedDeal::from).collect(),
    })
}

/// Applies curated records to a batch.
///
/// Each record matched to a `processing` member becomes a structured deal
/// with a rules rating, or moves the member to `error` when it lacks a
/// merchant or title. Members without a record stay `processing`, so the
/// batch only completes once all of them are resolved.
///
/// # Errors
///
/// Returns [`PipelineError::BatchNotFound`] for an unknown batch, or
/// [`PipelineError::Store`] if the store fails outside a single member.
pub async fn import_batch(
    store: &dyn DealStore,
    batch_id: i64,
    import: &BatchImport,
    rules: &StructuringRules,
) -> Result<ImportReport, PipelineError> {
    store
        .get_batch(batch_id)
        .await?
        .ok_or(PipelineError::BatchNotFound(batch_id))?;

    let members: HashMap<i32, BatchMember> = store
        .batch_members(batch_id)
        .await?
        .into_iter()
        .map(|m| (m.position, m))
        .collect();

    let mut report = ImportReport {
        batch_id,
        imported: 0,
        errors: 0,
        skipped: 0,
        unknown_temp_ids: Vec::new(),
        status: BatchStatus::Created,
    };
    let mut resolved = HashSet::new();

    for record in &import.deals {
        let Some(member) = members.get(&record.temp_id) else {
            report.unknown_temp_ids.push(record.temp_id);
            continue;
        };
        let raw_id = member.candidate.id;
        if member.candidate.status != CandidateStatus::Processing
            || resolved.contains(&raw_id)
        {
            report.skipped += 1;
            continue;
        }

        let failure = match record.to_details(member, rules.fallback_year) {
            Ok(details) => {
                let rating = score_deal(
                    &rules.scoring,
                    &details.merchant_name,
                    details.discount_value.as_deref().unwrap_or_default(),
                    details.category,
                )
                .into_rating();
                store
                    .insert_structured_deal(raw_id, &details, Some(&rating))
                    .await
                    .err()
                    .map(|e| e.to_string())
            }
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                report.imported += 1;
                resolved.insert(raw_id);
            }
            Some(message) => {
                tracing::debug!(
                    temp_id = record.temp_id,
                    error = %message,
                    "import record failed"
                );
                store.mark_candidate_error(raw_id, &message).await?;
                report.errors += 1;
                resolved.insert(raw_id);
            }
        }
    }

    store.mark_batch_imported(batch_id).await?;
    report.status = store.refresh_batch_status(batch_id).await?;

    if !report.unknown_temp_ids.is_empty() {
        tracing::warn!(
            batch_id,
            unknown = ?report.unknown_temp_ids,
            "import records without a matching batch member"
        );
    }
    tracing::info!(
        batch_id,
        imported = report.imported,
        errors = report.errors,
        skipped = report.skipped,
        status = %report.status,
        "batch imported"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
