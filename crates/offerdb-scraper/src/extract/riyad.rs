use std::sync::LazyLock;

use offerdb_core::CandidateDraft;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::heuristics::{
    element_text, first_text, resolve_link, scan_containers, scan_lines, ContainerProfile,
    DEFAULT_DESCRIPTION, DEFAULT_TERMS, DEFAULT_TITLE, DEFAULT_VALIDITY,
};
use super::{ExtractionConfig, Extractor};
use crate::category::infer_category;
use crate::content::{flatten_lines, RenderedContent};

const PROFILE: ContainerProfile = ContainerProfile {
    containers: &[".offer-card", ".card-offer", "[class*=offer]"],
    title: DEFAULT_TITLE,
    merchant: &[".rb-brand-name", ".merchant", ".brand", "[class*=merchant]"],
    description: DEFAULT_DESCRIPTION,
    discount: &["span.discount-percent-text", "[class*=discount]"],
    validity: DEFAULT_VALIDITY,
    terms: DEFAULT_TERMS,
};

const BADGE_SELECTOR: &str = "span.discount-percent-text";
const BRAND_SELECTOR: &str = ".rb-brand-name";

/// How far up from a discount badge to look for the card holding its brand.
const MAX_CARD_DEPTH: usize = 15;

static VALIDITY_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvalid[^:]*:\s*(.+)").expect("valid validity label regex")
});

/// Riyad Bank renders its offers client-side; each card carries a discount
/// badge and a brand name somewhere above it.
pub struct RiyadExtractor;

impl Extractor for RiyadExtractor {
    fn key(&self) -> &'static str {
        "riyad"
    }

    fn extract(
        &self,
        content: &RenderedContent,
        base_url: &Url,
        config: &ExtractionConfig,
    ) -> Vec<CandidateDraft> {
        let document = content.document();

        let drafts = scan_badges(&document, base_url, config);
        if !drafts.is_empty() {
            tracing::debug!(tier = "badges", count = drafts.len(), "riyad extraction");
            return drafts;
        }

        let drafts = scan_containers(&document, &PROFILE, base_url, &config.keywords);
        if !drafts.is_empty() {
            tracing::debug!(tier = "containers", count = drafts.len(), "riyad extraction");
            return drafts;
        }

        let drafts = scan_lines(&flatten_lines(&document), &config.scan, &config.keywords);
        tracing::debug!(tier = "lines", count = drafts.len(), "riyad extraction");
        drafts
    }
}

/// Badges that are amounts or words rather than percentages ("SAR 100",
/// "Free") describe no discount figure.
fn is_percentage_badge(text: &str) -> bool {
    text.contains('%')
        || !(text.contains("SAR")
            || text
                .chars()
                .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '.'))
}

fn card_with_brand<'a>(badge: ElementRef<'a>, brand: &Selector) -> Option<(ElementRef<'a>, String)> {
    badge
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_CARD_DEPTH)
        .find_map(|ancestor| {
            ancestor
                .select(brand)
                .next()
                .map(|b| (ancestor, element_text(b)))
        })
}

fn labelled_validity(card: ElementRef<'_>) -> Option<String> {
    card.text()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .lines()
        .find_map(|line| {
            VALIDITY_LABEL_RE
                .captures(line)
                .map(|caps| caps[1].trim().chars().take(100).collect::<String>())
        })
        .filter(|v| !v.is_empty())
}

fn scan_badges(document: &Html, base_url: &Url, config: &ExtractionConfig) -> Vec<CandidateDraft> {
    let (Ok(badge_selector), Ok(brand_selector), Ok(link_selector)) = (
        Selector::parse(BADGE_SELECTOR),
        Selector::parse(BRAND_SELECTOR),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut drafts = Vec::new();
    for badge in document.select(&badge_selector) {
        let discount = element_text(badge);
        if !is_percentage_badge(&discount) {
            continue;
        }

        let Some((card, merchant)) = card_with_brand(badge, &brand_selector) else {
            tracing::debug!(discount = %discount, "discount badge without a brand card");
            continue;
        };
        if merchant.chars().count() < 2 {
            continue;
        }

        let origin_url = match card
            .select(&link_selector)
            .find_map(|a| a.value().attr("href"))
            .map(|href| resolve_link(base_url, href))
            .transpose()
        {
            Ok(url) => url.flatten(),
            Err(e) => {
                tracing::debug!(merchant = %merchant, error = %e, "skipping offer card");
                continue;
            }
        };

        let title = if discount.contains('%') {
            format!("{discount} off at {merchant}")
        } else {
            format!("Special offer at {merchant}")
        };

        drafts.push(CandidateDraft {
            title,
            description: first_text(card, DEFAULT_DESCRIPTION),
            validity: labelled_validity(card).or_else(|| first_text(card, DEFAULT_VALIDITY)),
            category: Some(infer_category(&merchant, &config.keywords)),
            merchant: Some(merchant),
            discount: Some(discount),
            origin_url,
            ..CandidateDraft::default()
        });
    }

    drafts
}
