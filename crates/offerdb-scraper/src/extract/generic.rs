use offerdb_core::CandidateDraft;
use url::Url;

use super::heuristics::{scan_containers, scan_lines, GENERIC_PROFILE};
use super::{ExtractionConfig, Extractor};
use crate::content::{flatten_lines, RenderedContent};

/// Container and line tiers with no source-specific selectors.
pub struct GenericExtractor;

impl Extractor for GenericExtractor {
    fn key(&self) -> &'static str {
        "generic"
    }

    fn extract(
        &self,
        content: &RenderedContent,
        base_url: &Url,
        config: &ExtractionConfig,
    ) -> Vec<CandidateDraft> {
        let document = content.document();

        let drafts = scan_containers(&document, &GENERIC_PROFILE, base_url, &config.keywords);
        if !drafts.is_empty() {
            tracing::debug!(tier = "containers", count = drafts.len(), "generic extraction");
            return drafts;
        }

        let drafts = scan_lines(&flatten_lines(&document), &config.scan, &config.keywords);
        tracing::debug!(tier = "lines", count = drafts.len(), "generic extraction");
        drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_line_scan() {
        let content = RenderedContent::new(
            "https://bank.example.com/offers",
            "<body><section><h2>Travel</h2><p>Skyline Resort</p><p>25% off weekend stays</p>\
             <p>Valid until 30 June 2026</p></section></body>",
        );
        let base = Url::parse(&content.url).unwrap();
        let drafts = GenericExtractor.extract(&content, &base, &ExtractionConfig::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].merchant.as_deref(), Some("Skyline Resort"));
        assert_eq!(drafts[0].category, Some(offerdb_core::Category::Travel));
        assert_eq!(drafts[0].validity.as_deref(), Some("Valid until 30 June 2026"));
    }

    #[test]
    fn modal_may_is_not_read_as_a_date() {
        let content = RenderedContent::new(
            "https://bank.example.com/offers",
            "<body><p>Skyline Resort</p><p>25% off weekend stays</p>\
             <p>Offer may not be combined with other promotions</p>\
             <p>Valid until 30 June 2026</p></body>",
        );
        let base = Url::parse(&content.url).unwrap();
        let drafts = GenericExtractor.extract(&content, &base, &ExtractionConfig::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].validity.as_deref(), Some("Valid until 30 June 2026"));
    }
}
