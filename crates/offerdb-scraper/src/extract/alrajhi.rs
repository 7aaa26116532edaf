use offerdb_core::CandidateDraft;
use url::Url;

use super::heuristics::{
    scan_anchors, scan_containers, scan_lines, ContainerProfile, DEFAULT_DESCRIPTION,
    DEFAULT_TERMS, DEFAULT_TITLE,
};
use super::{ExtractionConfig, Extractor};
use crate::content::{flatten_lines, RenderedContent};

const PROFILE: ContainerProfile = ContainerProfile {
    containers: &["div.offer-card", "div.card", "article"],
    title: DEFAULT_TITLE,
    merchant: &["h5.merchant", "h6.merchant", ".merchant", "span.brand"],
    description: DEFAULT_DESCRIPTION,
    discount: &[],
    validity: &["span.date", "[class*=valid]"],
    terms: DEFAULT_TERMS,
};

/// Offer detail pages live under this path; the listing links to each one.
const OFFER_PATH: &str = "/Offers/CardsOffers/";

/// Al Rajhi serves its card offers as static HTML.
pub struct AlrajhiExtractor;

impl Extractor for AlrajhiExtractor {
    fn key(&self) -> &'static str {
        "alrajhi"
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
            tracing::debug!(tier = "containers", count = drafts.len(), "alrajhi extraction");
            return drafts;
        }

        let drafts = scan_anchors(&document, OFFER_PATH, base_url, &config.keywords);
        if !drafts.is_empty() {
            tracing::debug!(tier = "anchors", count = drafts.len(), "alrajhi extraction");
            return drafts;
        }

        let drafts = scan_lines(&flatten_lines(&document), &config.scan, &config.keywords);
        tracing::debug!(tier = "lines", count = drafts.len(), "alrajhi extraction");
        drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "https://www.alrajhibank.com.sa/en/Personal/Offers/CardsOffers";

    fn run(html: &str) -> Vec<CandidateDraft> {
        let content = RenderedContent::new(LISTING, html);
        let base = Url::parse(LISTING).unwrap();
        AlrajhiExtractor.extract(&content, &base, &ExtractionConfig::default())
    }

    #[test]
    fn offer_cards_take_priority() {
        let drafts = run(
            r#"<div class="offer-card">
                 <h4>Al Baik</h4><span class="brand">ALBAIK</span>
                 <p>10% off family meals</p><span class="date">Valid until 31 March 2026</span>
                 <a href="/en/Personal/Offers/CardsOffers/albaik">More</a>
               </div>
               <a href="/en/Personal/Offers/CardsOffers/ignored">Ignored link offer</a>"#,
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].merchant.as_deref(), Some("ALBAIK"));
        assert_eq!(drafts[0].validity.as_deref(), Some("Valid until 31 March 2026"));
        assert_eq!(
            drafts[0].origin_url.as_deref(),
            Some("https://www.alrajhibank.com.sa/en/Personal/Offers/CardsOffers/albaik")
        );
    }

    #[test]
    fn falls_back_to_offer_links() {
        let drafts = run(
            r#"<ul>
                 <li><a href="/en/Personal/Offers/CardsOffers/nova-cafe">Nova Cafe</a></li>
                 <li><a href="/en/Personal/Offers/CardsOffers/skyline-hotel">Skyline Hotel</a></li>
                 <li><a href="/en/Personal/Loans">Loans</a></li>
               </ul>"#,
        );
        let titles: Vec<_> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Nova Cafe", "Skyline Hotel"]);
    }
}
