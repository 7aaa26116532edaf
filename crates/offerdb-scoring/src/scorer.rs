use std::sync::LazyLock;

use offerdb_core::{Category, QualityTier, RatedBy, Rating, ScoringRules};
use regex::Regex;
use serde::Serialize;

static FIRST_INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid integer regex"));

const BASELINE: i32 = 5;
const POPULAR_BRAND_BONUS: i32 = 3;
const NO_DISCOUNT_PENALTY: i32 = -2;
const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 10;

/// Discount bands, highest first: `(minimum percent, bonus, reason label)`.
/// Bands without a label add to the score silently.
const DISCOUNT_BANDS: &[(u32, i32, Option<&str>)] = &[
    (30, 4, Some("High discount")),
    (20, 3, Some("Good discount")),
    (10, 2, None),
    (5, 1, None),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DealScore {
    /// Within `1..=10`.
    pub score: u8,
    pub tier: QualityTier,
    pub reason: String,
}

impl DealScore {
    #[must_use]
    pub fn into_rating(self) -> Rating {
        Rating {
            tier: self.tier,
            score: self.score,
            reason: Some(self.reason),
            model_score: None,
            model_reasoning: None,
            rated_by: RatedBy::Rules,
        }
    }
}

/// First integer in `text`, or 0 when there is none. "12.5% off" reads as 12.
#[must_use]
pub fn discount_percent(text: &str) -> u32 {
    FIRST_INTEGER_RE
        .find(text)
        .map_or(0, |m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
}

/// Scores a deal from its merchant and discount text.
///
/// Starts at 5, adds a bonus for the discount band and for a popular
/// merchant, subtracts 2 when no discount figure is present, and clamps to
/// `1..=10`. `category` is accepted for callers but doesn't change the
/// score.
#[must_use]
pub fn score_deal(
    rules: &ScoringRules,
    merchant: &str,
    discount_text: &str,
    category: Category,
) -> DealScore {
    let mut score = BASELINE;
    let mut reasons: Vec<String> = Vec::new();

    let pct = discount_percent(discount_text);
    if let Some(&(_, bonus, label)) = DISCOUNT_BANDS.iter().find(|(min, _, _)| pct >= *min) {
        score += bonus;
        if let Some(label) = label {
            reasons.push(format!("{label} ({pct}%)"));
        }
    }

    if let Some(brand) = rules.popular_brand_match(merchant) {
        score += POPULAR_BRAND_BONUS;
        reasons.push("Popular brand".to_string());
        tracing::trace!(merchant, brand, "popular brand bonus");
    }

    if pct == 0 {
        score += NO_DISCOUNT_PENALTY;
    }

    let score = score.clamp(MIN_SCORE, MAX_SCORE);
    let score = u8::try_from(score).unwrap_or(1);
    let tier = QualityTier::from_score(score);
    let reason = if reasons.is_empty() {
        "Standard deal".to_string()
    } else {
        reasons.join("; ")
    };

    tracing::trace!(merchant, pct, %category, score, %tier, "scored deal");

    DealScore {
        score,
        tier,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ScoringRules {
        ScoringRules::default()
    }

    #[test]
    fn popular_brand_with_high_discount_caps_at_ten() {
        let scored = score_deal(&rules(), "McDonald's", "30% off", Category::Dining);
        assert_eq!(scored.score, 10);
        assert_eq!(scored.tier, QualityTier::Good);
        assert_eq!(scored.reason, "High discount (30%); Popular brand");
    }

    #[test]
    fn unknown_merchant_without_discount_is_bad() {
        let scored = score_deal(&rules(), "Random Shop", "", Category::Other);
        assert_eq!(scored.score, 3);
        assert_eq!(scored.tier, QualityTier::Bad);
        assert_eq!(scored.reason, "Standard deal");
    }

    #[test]
    fn moderate_discount_alone_is_good() {
        let scored = score_deal(&rules(), "Local Cafe", "12% off", Category::Dining);
        assert_eq!(scored.score, 7);
        assert_eq!(scored.tier, QualityTier::Good);
        assert_eq!(scored.reason, "Standard deal");
    }

    #[test]
    fn good_discount_band_is_labelled() {
        let scored = score_deal(&rules(), "Local Cafe", "Save 25%", Category::Dining);
        assert_eq!(scored.score, 8);
        assert_eq!(scored.reason, "Good discount (25%)");
    }

    #[test]
    fn small_discount_is_mediocre() {
        let scored = score_deal(&rules(), "Corner Store", "5% cashback", Category::Shopping);
        assert_eq!(scored.score, 6);
        assert_eq!(scored.tier, QualityTier::Mediocre);
    }

    #[test]
    fn below_five_percent_earns_nothing_but_avoids_penalty() {
        let scored = score_deal(&rules(), "Corner Store", "3% off", Category::Shopping);
        assert_eq!(scored.score, 5);
        assert_eq!(scored.tier, QualityTier::Mediocre);
    }

    #[test]
    fn popular_brand_without_discount() {
        let scored = score_deal(&rules(), "Starbucks", "Free drink", Category::Dining);
        assert_eq!(scored.score, 6);
        assert_eq!(scored.reason, "Popular brand");
    }

    #[test]
    fn category_does_not_change_the_score() {
        let dining = score_deal(&rules(), "Nova", "15% off", Category::Dining);
        let travel = score_deal(&rules(), "Nova", "15% off", Category::Travel);
        assert_eq!(dining, travel);
    }

    #[test]
    fn custom_brand_list_is_honoured() {
        let rules = ScoringRules {
            popular_brands: vec!["nova".to_string()],
        };
        let scored = score_deal(&rules, "Nova Restaurant", "", Category::Dining);
        assert_eq!(scored.score, 6);
        assert_eq!(scored.reason, "Popular brand");
    }

    #[test]
    fn discount_percent_reads_first_integer() {
        assert_eq!(discount_percent("12.5% off"), 12);
        assert_eq!(discount_percent("Buy 1 get 1"), 1);
        assert_eq!(discount_percent("no figure"), 0);
    }

    #[test]
    fn rating_carries_rules_origin() {
        let rating = score_deal(&rules(), "McDonald's", "30%", Category::Dining).into_rating();
        assert_eq!(rating.rated_by, RatedBy::Rules);
        assert_eq!(rating.score, 10);
        assert_eq!(rating.reason.as_deref(), Some("High discount (30%); Popular brand"));
    }
}
