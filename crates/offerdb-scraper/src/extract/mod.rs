//! Per-source offer extractors and the registry that selects them by key.

mod alrajhi;
mod generic;
pub(crate) mod heuristics;
mod riyad;
mod sab;

use std::collections::HashMap;

use offerdb_core::{CandidateDraft, CategoryKeywords, ScanWindow};
use url::Url;

use crate::content::RenderedContent;
use crate::error::ExtractError;

pub use alrajhi::AlrajhiExtractor;
pub use generic::GenericExtractor;
pub use riyad::RiyadExtractor;
pub use sab::SabExtractor;

/// Tunables passed to every extractor.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub scan: ScanWindow,
    pub keywords: CategoryKeywords,
}

/// Turns one source's rendered page into candidate drafts.
///
/// Extraction is synchronous: it parses the DOM internally and never holds
/// it across an await.
pub trait Extractor: Send + Sync {
    /// Registry key, matching `extractor:` in the sources file.
    fn key(&self) -> &'static str;

    /// Every draft found on the page. Items that can't be parsed are
    /// skipped, so an unrecognized layout yields an empty vector.
    fn extract(
        &self,
        content: &RenderedContent,
        base_url: &Url,
        config: &ExtractionConfig,
    ) -> Vec<CandidateDraft>;
}

#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<&'static str, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `alrajhi`, `riyad`, `sab`, and
    /// `generic` extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AlrajhiExtractor));
        registry.register(Box::new(RiyadExtractor));
        registry.register(Box::new(SabExtractor));
        registry.register(Box::new(GenericExtractor));
        registry
    }

    /// Adds an extractor, replacing any previous one with the same key.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.insert(extractor.key(), extractor);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&dyn Extractor> {
        self.extractors.get(key).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.extractors.contains_key(key)
    }

    /// Sorted registry keys.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.extractors.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Runs the extractor registered under `key` against `content`.
    ///
    /// Titles are trimmed and drafts left without one are dropped.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::UnknownExtractor`] if no extractor has that key.
    /// - [`ExtractError::InvalidBaseUrl`] if `content.url` doesn't parse.
    pub fn extract(
        &self,
        key: &str,
        content: &RenderedContent,
        config: &ExtractionConfig,
    ) -> Result<Vec<CandidateDraft>, ExtractError> {
        let extractor = self
            .get(key)
            .ok_or_else(|| ExtractError::UnknownExtractor(key.to_string()))?;
        let base_url = Url::parse(&content.url).map_err(|source| ExtractError::InvalidBaseUrl {
            url: content.url.clone(),
            source,
        })?;

        let drafts: Vec<CandidateDraft> = extractor
            .extract(content, &base_url, config)
            .into_iter()
            .filter_map(|mut draft| {
                draft.title = heuristics::clean_text(&draft.title);
                if draft.title.is_empty() {
                    tracing::debug!(extractor = key, error = %ExtractError::MissingTitle, "dropping draft");
                    None
                } else {
                    Some(draft)
                }
            })
            .collect();

        tracing::debug!(extractor = key, drafts = drafts.len(), url = %content.url, "extraction finished");
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Extractor for Fixed {
        fn key(&self) -> &'static str {
            "fixed"
        }

        fn extract(
            &self,
            _content: &RenderedContent,
            _base_url: &Url,
            _config: &ExtractionConfig,
        ) -> Vec<CandidateDraft> {
            vec![
                CandidateDraft {
                    title: "  10%   off  ".to_string(),
                    ..CandidateDraft::default()
                },
                CandidateDraft {
                    title: "   ".to_string(),
                    ..CandidateDraft::default()
                },
            ]
        }
    }

    #[test]
    fn defaults_cover_all_bank_layouts() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.keys(), vec!["alrajhi", "generic", "riyad", "sab"]);
        assert!(registry.get("sab").is_some());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = ExtractorRegistry::with_defaults();
        let content = RenderedContent::new("https://bank.example.com", "<html></html>");
        let err = registry
            .extract("nope", &content, &ExtractionConfig::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnknownExtractor(ref k) if k == "nope"));
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(Fixed));
        let content = RenderedContent::new("not a url", "<html></html>");
        let err = registry
            .extract("fixed", &content, &ExtractionConfig::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn blank_titles_are_dropped_and_titles_cleaned() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(Fixed));
        let content = RenderedContent::new("https://bank.example.com", "<html></html>");
        let drafts = registry
            .extract("fixed", &content, &ExtractionConfig::default())
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "10% off");
    }
}
