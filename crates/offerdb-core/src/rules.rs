//! Tunable rule tables: the popular-brand list used by the scorer and the
//! keyword sets used for category inference. Both have built-in defaults
//! and can be overridden from a YAML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deals::Category;
use crate::ConfigError;

const DEFAULT_POPULAR_BRANDS: &[&str] = &[
    // Quick service and casual dining
    "mcdonald",
    "kfc",
    "burger king",
    "hardee",
    "pizza hut",
    "domino",
    "papa john",
    "little caesars",
    "subway",
    "shake shack",
    "five guys",
    "nando",
    "albaik",
    "al baik",
    "kudu",
    "herfy",
    "maestro pizza",
    "texas roadhouse",
    "cheesecake factory",
    "applebee",
    "chili's",
    "p.f. chang",
    "starbucks",
    "dunkin",
    "tim hortons",
    "costa coffee",
    "krispy kreme",
    "baskin robbins",
    "cinnabon",
    // Retail and electronics
    "ikea",
    "jarir",
    "extra stores",
    "centrepoint",
    "h&m",
    "zara",
    "nike",
    "adidas",
    "apple",
    "samsung",
    "sephora",
    "bath & body works",
    "amazon",
    "namshi",
    "carrefour",
    "lulu",
    "panda",
    "danube",
    "tamimi",
    "othaim",
    // Travel and hospitality
    "marriott",
    "hilton",
    "hyatt",
    "four seasons",
    "accor",
    "anantara",
    "saudia",
    "flynas",
    "flyadeal",
    "emirates",
    "qatar airways",
    "booking.com",
    "agoda",
    "almosafer",
    // Delivery, rides, and entertainment
    "careem",
    "uber",
    "hungerstation",
    "jahez",
    "vox cinemas",
    "muvi",
    "netflix",
];

const DINING_KEYWORDS: &[&str] = &[
    "restaurant",
    "cafe",
    "coffee",
    "food",
    "kitchen",
    "grill",
    "burger",
    "pizza",
    "sushi",
    "roastery",
];

const LIFESTYLE_KEYWORDS: &[&str] = &[
    "spa", "beauty", "salon", "clinic", "medical", "dental", "gym", "fitness", "sport", "health",
];

const TRAVEL_KEYWORDS: &[&str] = &[
    "hotel", "resort", "travel", "flight", "airline", "anantara", "vacation",
];

const SHOPPING_KEYWORDS: &[&str] = &["shop", "store", "fashion", "mall", "boutique"];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Inputs to the deal scorer that are configuration rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Lowercase fragments matched as substrings of the merchant name.
    pub popular_brands: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            popular_brands: owned(DEFAULT_POPULAR_BRANDS),
        }
    }
}

impl ScoringRules {
    /// First popular-brand fragment contained in `merchant`, ignoring case.
    #[must_use]
    pub fn popular_brand_match(&self, merchant: &str) -> Option<&str> {
        let merchant = merchant.to_lowercase();
        self.popular_brands
            .iter()
            .map(String::as_str)
            .find(|brand| !brand.is_empty() && merchant.contains(&brand.to_lowercase()))
    }
}

/// Keyword sets for category inference, checked in a fixed priority order:
/// dining, lifestyle, travel, shopping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryKeywords {
    pub dining: Vec<String>,
    pub lifestyle: Vec<String>,
    pub travel: Vec<String>,
    pub shopping: Vec<String>,
}

impl Default for CategoryKeywords {
    fn default() -> Self {
        Self {
            dining: owned(DINING_KEYWORDS),
            lifestyle: owned(LIFESTYLE_KEYWORDS),
            travel: owned(TRAVEL_KEYWORDS),
            shopping: owned(SHOPPING_KEYWORDS),
        }
    }
}

impl CategoryKeywords {
    #[must_use]
    pub fn in_priority_order(&self) -> [(Category, &[String]); 4] {
        [
            (Category::Dining, self.dining.as_slice()),
            (Category::Lifestyle, self.lifestyle.as_slice()),
            (Category::Travel, self.travel.as_slice()),
            (Category::Shopping, self.shopping.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub scoring: ScoringRules,
    #[serde(default)]
    pub categories: CategoryKeywords,
}

/// Load rule overrides from YAML. Sections left out of the file keep their
/// built-in defaults.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, or if a
/// keyword list is present but empty.
pub fn load_rules(path: &Path) -> Result<RulesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let rules: RulesFile = serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
        path: path.display().to_string(),
        source: e,
    })?;

    for (category, keywords) in rules.categories.in_priority_order() {
        if keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "category '{category}' has no keywords"
            )));
        }
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popular_brand_match_is_case_insensitive_substring() {
        let rules = ScoringRules::default();
        assert_eq!(rules.popular_brand_match("McDonald's"), Some("mcdonald"));
        assert_eq!(
            rules.popular_brand_match("STARBUCKS Riyadh Park"),
            Some("starbucks")
        );
    }

    #[test]
    fn generic_merchants_are_not_popular() {
        let rules = ScoringRules::default();
        assert_eq!(rules.popular_brand_match("Random Shop"), None);
        assert_eq!(rules.popular_brand_match("Local Cafe"), None);
        assert_eq!(rules.popular_brand_match(""), None);
    }

    #[test]
    fn default_brand_list_is_lowercase() {
        for brand in &ScoringRules::default().popular_brands {
            assert_eq!(brand, &brand.to_lowercase());
        }
    }

    #[test]
    fn keyword_priority_order_is_fixed() {
        let keywords = CategoryKeywords::default();
        let order: Vec<Category> = keywords
            .in_priority_order()
            .iter()
            .map(|(c, _)| *c)
            .collect();
        assert_eq!(
            order,
            vec![
                Category::Dining,
                Category::Lifestyle,
                Category::Travel,
                Category::Shopping
            ]
        );
    }

    #[test]
    fn partial_rules_file_keeps_defaults() {
        let yaml = r"
scoring:
  popular_brands: [acme]
";
        let rules: RulesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.scoring.popular_brands, vec!["acme".to_string()]);
        assert_eq!(rules.categories, CategoryKeywords::default());
    }

    #[test]
    fn partial_category_section_keeps_other_sets() {
        let yaml = r"
categories:
  travel: [hotel, airport]
";
        let rules: RulesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.categories.travel, vec!["hotel", "airport"]);
        assert_eq!(
            rules.categories.dining,
            CategoryKeywords::default().dining
        );
        assert_eq!(rules.scoring, ScoringRules::default());
    }

    #[test]
    fn example_rules_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/rules.example.yaml");
        let rules = load_rules(&path).unwrap();
        assert!(rules.scoring.popular_brands.contains(&"mcdonald".to_string()));
        assert_eq!(rules.categories, CategoryKeywords::default());
    }

    #[test]
    fn empty_keyword_list_is_rejected() {
        let dir = std::env::temp_dir().join(format!("offerdb-rules-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rules.yaml");
        std::fs::write(&path, "categories:\n  dining: []\n").unwrap();
        let err = load_rules(&path).unwrap_err();
        assert!(err.to_string().contains("dining"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
