//! Deal records as they move through the pipeline: extractor drafts, raw
//! candidates, structured deals, ratings, and processing batches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::fingerprint;
use crate::CoreError;

/// Generates `as_str`, `Display`, `FromStr`, and an `ALL` slice for a
/// fieldless enum whose wire form is a fixed lowercase string.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(CoreError::InvalidEnumValue {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dining,
    Shopping,
    Travel,
    Lifestyle,
    Entertainment,
    Health,
    Automotive,
    Education,
    Other,
}

string_enum!(Category, "category", {
    Dining => "dining",
    Shopping => "shopping",
    Travel => "travel",
    Lifestyle => "lifestyle",
    Entertainment => "entertainment",
    Health => "health",
    Automotive => "automotive",
    Education => "education",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
    BuyXGetY,
    Other,
}

string_enum!(DiscountType, "discount type", {
    Percentage => "percentage",
    FixedAmount => "fixed_amount",
    BuyXGetY => "buy_x_get_y",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Good,
    Mediocre,
    Bad,
}

string_enum!(QualityTier, "quality tier", {
    Good => "good",
    Mediocre => "mediocre",
    Bad => "bad",
});

impl QualityTier {
    /// Maps a 1..=10 score onto its tier: `>= 7` good, `>= 5` mediocre,
    /// anything lower bad.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        if score >= 7 {
            QualityTier::Good
        } else if score >= 5 {
            QualityTier::Mediocre
        } else {
            QualityTier::Bad
        }
    }
}

/// Lifecycle of a raw candidate.
///
/// `new -> processing -> processed | error`, and `new -> duplicate` at
/// ingest time. `processed`, `duplicate`, and `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Processing,
    Processed,
    Duplicate,
    Error,
}

string_enum!(CandidateStatus, "candidate status", {
    New => "new",
    Processing => "processing",
    Processed => "processed",
    Duplicate => "duplicate",
    Error => "error",
});

impl CandidateStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CandidateStatus::Processed | CandidateStatus::Duplicate | CandidateStatus::Error
        )
    }

    #[must_use]
    pub fn can_transition_to(self, next: CandidateStatus) -> bool {
        matches!(
            (self, next),
            (CandidateStatus::New, CandidateStatus::Processing | CandidateStatus::Duplicate)
                | (
                    CandidateStatus::Processing,
                    CandidateStatus::Processed | CandidateStatus::Error
                )
        )
    }

    /// Returns `next` if the transition is legal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for any transition outside
    /// the candidate lifecycle.
    pub fn transition(self, next: CandidateStatus) -> Result<CandidateStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Created,
    Processing,
    Completed,
}

string_enum!(BatchStatus, "batch status", {
    Created => "created",
    Processing => "processing",
    Completed => "completed",
});

impl BatchStatus {
    /// Status a batch should hold given its members' statuses.
    ///
    /// A batch completes only once every member is terminal. An untouched
    /// batch stays `created`; anything in between is `processing`.
    #[must_use]
    pub fn from_members(current: BatchStatus, members: &[CandidateStatus]) -> BatchStatus {
        if current == BatchStatus::Completed {
            return BatchStatus::Completed;
        }
        if !members.is_empty() && members.iter().all(|s| s.is_terminal()) {
            return BatchStatus::Completed;
        }
        if current == BatchStatus::Created && !members.iter().any(|s| s.is_terminal()) {
            return BatchStatus::Created;
        }
        BatchStatus::Processing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatedBy {
    Rules,
    Human,
}

string_enum!(RatedBy, "rating origin", {
    Rules => "rules",
    Human => "human",
});

/// One offer as scraped from a source page, before fingerprinting.
///
/// Only `title` is mandatory; extractors discard drafts without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateDraft {
    pub title: String,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub discount: Option<String>,
    pub validity: Option<String>,
    pub terms: Option<String>,
    /// Absolute URL of the offer page, if the extractor found a link.
    pub origin_url: Option<String>,
    /// Category the page states explicitly or the extractor inferred.
    pub category: Option<Category>,
    pub applicable_cards: Option<String>,
}

/// A raw candidate ready for the deduplicator. The fingerprint is computed
/// once here and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRawCandidate {
    pub source_id: i64,
    pub draft: CandidateDraft,
    pub fetched_at: DateTime<Utc>,
    pub fingerprint: String,
    pub status: CandidateStatus,
}

impl NewRawCandidate {
    #[must_use]
    pub fn from_draft(source_id: i64, draft: CandidateDraft, fetched_at: DateTime<Utc>) -> Self {
        let fingerprint = fingerprint(
            &draft.title,
            draft.merchant.as_deref().unwrap_or_default(),
            draft.validity.as_deref().unwrap_or_default(),
        );
        Self {
            source_id,
            draft,
            fetched_at,
            fingerprint,
            status: CandidateStatus::New,
        }
    }
}

/// A persisted raw candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub id: i64,
    pub source_id: i64,
    /// Display name of the owning source, e.g. `"SAB Bank"`.
    pub source_name: String,
    pub draft: CandidateDraft,
    pub fetched_at: DateTime<Utc>,
    pub fingerprint: String,
    pub status: CandidateStatus,
    pub error_message: Option<String>,
}

/// Editable fields of a structured deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealDetails {
    pub merchant_name: String,
    pub offer_title: String,
    pub description: Option<String>,
    /// Display string, e.g. `"20%"` or `"SAR 50"`.
    pub discount_value: Option<String>,
    pub discount_type: DiscountType,
    pub category: Category,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub location: Option<String>,
    pub applicable_cards: Option<String>,
    pub terms_conditions: Option<String>,
    pub promo_code: Option<String>,
    pub source_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDeal {
    pub id: i64,
    pub raw_candidate_id: i64,
    pub details: DealDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub tier: QualityTier,
    /// Always within `1..=10`.
    pub score: u8,
    pub reason: Option<String>,
    pub model_score: Option<u8>,
    pub model_reasoning: Option<String>,
    pub rated_by: RatedBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRating {
    pub deal_id: i64,
    pub rating: Rating,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingBatch {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub status: BatchStatus,
    pub deals_count: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub exported_at: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A batch member; `position` is the 1-based `temp_id` used in exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMember {
    pub position: i32,
    pub candidate: RawCandidate,
    pub structured_deal_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), *category);
        }
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(" Dining ".parse::<Category>().unwrap(), Category::Dining);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = "groceries".parse::<Category>().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidEnumValue { kind: "category", .. }
        ));
    }

    #[test]
    fn discount_type_uses_snake_case_wire_names() {
        assert_eq!(DiscountType::BuyXGetY.as_str(), "buy_x_get_y");
        let json = serde_json::to_string(&DiscountType::FixedAmount).unwrap();
        assert_eq!(json, "\"fixed_amount\"");
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(QualityTier::from_score(10), QualityTier::Good);
        assert_eq!(QualityTier::from_score(7), QualityTier::Good);
        assert_eq!(QualityTier::from_score(6), QualityTier::Mediocre);
        assert_eq!(QualityTier::from_score(5), QualityTier::Mediocre);
        assert_eq!(QualityTier::from_score(4), QualityTier::Bad);
        assert_eq!(QualityTier::from_score(1), QualityTier::Bad);
    }

    #[test]
    fn candidate_lifecycle_allows_only_documented_transitions() {
        use CandidateStatus::{Duplicate, Error, New, Processed, Processing};

        assert!(New.can_transition_to(Processing));
        assert!(New.can_transition_to(Duplicate));
        assert!(Processing.can_transition_to(Processed));
        assert!(Processing.can_transition_to(Error));

        assert!(!New.can_transition_to(Processed));
        assert!(!Duplicate.can_transition_to(Processing));
        assert!(!Duplicate.can_transition_to(Processed));
        assert!(!Processed.can_transition_to(Processing));
        assert!(!Error.can_transition_to(Processed));
    }

    #[test]
    fn illegal_transition_reports_both_ends() {
        let err = CandidateStatus::Duplicate
            .transition(CandidateStatus::Processed)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: "duplicate",
                to: "processed"
            }
        ));
    }

    #[test]
    fn batch_completes_only_when_all_members_terminal() {
        use CandidateStatus::{Duplicate, Error, Processed, Processing};

        assert_eq!(
            BatchStatus::from_members(BatchStatus::Processing, &[Processed, Error, Duplicate]),
            BatchStatus::Completed
        );
        assert_eq!(
            BatchStatus::from_members(BatchStatus::Processing, &[Processed, Processing]),
            BatchStatus::Processing
        );
        assert_eq!(
            BatchStatus::from_members(BatchStatus::Created, &[Processing, Processing]),
            BatchStatus::Created
        );
        assert_eq!(
            BatchStatus::from_members(BatchStatus::Created, &[Processed, Processing]),
            BatchStatus::Processing
        );
    }

    #[test]
    fn empty_batch_never_completes() {
        assert_eq!(
            BatchStatus::from_members(BatchStatus::Processing, &[]),
            BatchStatus::Processing
        );
    }

    #[test]
    fn new_candidate_fingerprint_ignores_case_and_padding() {
        let at = Utc::now();
        let a = NewRawCandidate::from_draft(
            1,
            CandidateDraft {
                title: "20% off".to_string(),
                merchant: Some("McDonald's".to_string()),
                validity: Some("Valid until December 31, 2026".to_string()),
                ..CandidateDraft::default()
            },
            at,
        );
        let b = NewRawCandidate::from_draft(
            2,
            CandidateDraft {
                title: "  20% OFF ".to_string(),
                merchant: Some("mcdonald's".to_string()),
                validity: Some("valid until december 31, 2026".to_string()),
                description: Some("different description".to_string()),
                ..CandidateDraft::default()
            },
            at,
        );
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.status, CandidateStatus::New);
    }
}
