use offerdb_core::{CandidateDraft, Category, ScanWindow};
use url::Url;

use super::heuristics::{
    discount_figure, is_offer_line, scan_containers, scan_lines, ContainerProfile,
    DEFAULT_DESCRIPTION, DEFAULT_MERCHANT, DEFAULT_TERMS, DEFAULT_TITLE,
};
use super::{ExtractionConfig, Extractor};
use crate::category::{category_from_label, infer_category};
use crate::content::{flatten_lines, RenderedContent};
use crate::validity::mentions_date;

const PROFILE: ContainerProfile = ContainerProfile {
    containers: &[
        "div.special-offer",
        "div.offer",
        "div.card",
        "article",
        "li.offer",
    ],
    title: DEFAULT_TITLE,
    merchant: DEFAULT_MERCHANT,
    description: DEFAULT_DESCRIPTION,
    discount: &[],
    validity: &["span.date", "[class*=valid]"],
    terms: DEFAULT_TERMS,
};

const MERCHANT_MARKER: &str = "- KSA";
/// Lines after a merchant line searched for its offer text.
const OFFER_LOOKAHEAD: usize = 7;
const MADA_CARDS: &str = "SAB Credit Cards & Mada Cards";

/// SAB lists offers as merchant blocks ("STARBUCKS - KSA") grouped under
/// category tabs, paginated client-side.
pub struct SabExtractor;

impl Extractor for SabExtractor {
    fn key(&self) -> &'static str {
        "sab"
    }

    fn extract(
        &self,
        content: &RenderedContent,
        base_url: &Url,
        config: &ExtractionConfig,
    ) -> Vec<CandidateDraft> {
        let document = content.document();

        let drafts = scan_containers(&document, &PROFILE, base_url, &config.keywords);
        if !drafts.is_empty() {
            tracing::debug!(tier = "containers", count = drafts.len(), "sab extraction");
            return drafts;
        }

        let lines = flatten_lines(&document);
        let drafts = scan_merchant_blocks(&lines, &config.scan, config);
        if !drafts.is_empty() {
            tracing::debug!(tier = "merchant_blocks", count = drafts.len(), "sab extraction");
            return drafts;
        }

        let drafts = scan_lines(&lines, &config.scan, &config.keywords);
        tracing::debug!(tier = "lines", count = drafts.len(), "sab extraction");
        drafts
    }
}

/// A merchant heading: tagged with the country marker, or an all-caps line
/// of plausible name length that isn't itself an offer.
fn is_merchant_line(line: &str) -> bool {
    if line.contains(MERCHANT_MARKER) {
        return true;
    }
    let len = line.chars().count();
    (6..60).contains(&len)
        && line.chars().any(char::is_alphabetic)
        && line == line.to_uppercase()
        && !is_offer_line(line)
        && category_from_label(line).is_none()
}

fn scan_merchant_blocks(
    lines: &[String],
    window: &ScanWindow,
    config: &ExtractionConfig,
) -> Vec<CandidateDraft> {
    let mut drafts = Vec::new();
    let mut section: Option<Category> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(category) = category_from_label(line) {
            section = Some(category);
            continue;
        }
        if !is_merchant_line(line) {
            continue;
        }

        let merchant = line.replace(MERCHANT_MARKER, "").trim().to_string();
        if merchant.is_empty() {
            continue;
        }

        let following = || lines.iter().skip(i + 1);
        let Some(offer) = following().take(OFFER_LOOKAHEAD).find(|l| is_offer_line(l)) else {
            tracing::debug!(merchant = %merchant, "merchant block without offer text");
            continue;
        };
        let mada = following()
            .take(window.validity_lookahead)
            .any(|l| l.to_lowercase().contains("mada"));
        let validity = following()
            .take(window.validity_lookahead)
            .find(|l| mentions_date(l))
            .cloned();

        drafts.push(CandidateDraft {
            title: offer.clone(),
            discount: discount_figure(offer),
            category: Some(
                section.unwrap_or_else(|| infer_category(&merchant, &config.keywords)),
            ),
            applicable_cards: mada.then(|| MADA_CARDS.to_string()),
            merchant: Some(merchant),
            validity,
            ..CandidateDraft::default()
        });
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str =
        "https://www.sab.com/en/personal/compare-credit-cards/credit-card-special-offers/all-offers/";

    fn run(html: &str) -> Vec<CandidateDraft> {
        let content = RenderedContent::new(LISTING, html);
        let base = Url::parse(LISTING).unwrap();
        SabExtractor.extract(&content, &base, &ExtractionConfig::default())
    }

    #[test]
    fn merchant_blocks_under_category_tabs() {
        let drafts = run(
            "<body>
               <div class=\"tabs\"><span>Dining &amp; Groceries</span></div>
               <div class=\"listing\">
                 <h5>STARBUCKS - KSA</h5>
                 <p>Get 20% off on all beverages</p>
                 <p>Use your SAB mada card</p>
                 <p>Valid until 31 December 2026</p>
                 <h5>Shake Shack - KSA</h5>
                 <p>Free fries with any burger</p>
                 <p>SAR 10 off orders above SAR 100</p>
               </div>
             </body>",
        );
        assert_eq!(drafts.len(), 2);

        let first = &drafts[0];
        assert_eq!(first.merchant.as_deref(), Some("STARBUCKS"));
        assert_eq!(first.title, "Get 20% off on all beverages");
        assert_eq!(first.discount.as_deref(), Some("20%"));
        assert_eq!(first.validity.as_deref(), Some("Valid until 31 December 2026"));
        assert_eq!(first.applicable_cards.as_deref(), Some(MADA_CARDS));
        assert_eq!(first.category, Some(Category::Dining));

        let second = &drafts[1];
        assert_eq!(second.merchant.as_deref(), Some("Shake Shack"));
        assert_eq!(second.title, "SAR 10 off orders above SAR 100");
        assert_eq!(second.applicable_cards, None);
        assert_eq!(second.validity, None);
    }

    #[test]
    fn merchant_block_validity_skips_modal_may() {
        let drafts = run(
            "<body>
               <h5>STARBUCKS - KSA</h5>
               <p>Get 20% off on all beverages</p>
               <p>Discount may not apply to merchandise</p>
               <p>Ends 31 May 2026</p>
             </body>",
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].validity.as_deref(), Some("Ends 31 May 2026"));
    }

    #[test]
    fn all_caps_lines_need_plausible_length() {
        assert!(is_merchant_line("NOVA RESTAURANT"));
        assert!(is_merchant_line("Nova - KSA"));
        assert!(!is_merchant_line("KFC"));
        assert!(!is_merchant_line("20% OFF TODAY"));
        assert!(!is_merchant_line("TRAVEL"));
        assert!(!is_merchant_line("Nova Restaurant"));
    }

    #[test]
    fn offer_containers_take_priority() {
        let drafts = run(
            r#"<div class="offer"><h3>Hotel weekend</h3><p>25% off suites</p></div>"#,
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Hotel weekend");
        assert_eq!(drafts[0].category, Some(Category::Travel));
    }
}
