//! Extraction tiers shared by the per-source extractors.
//!
//! Each tier returns every draft it could build; extractors try tiers in
//! order and keep the first non-empty result. Items that can't be turned
//! into a draft are logged at debug and skipped.

use std::collections::HashSet;
use std::sync::LazyLock;

use offerdb_core::{CandidateDraft, CategoryKeywords, ScanWindow};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::category::{category_from_label, infer_category};
use crate::error::ExtractError;
use crate::validity::mentions_date;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));
static OFF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\boff\b").expect("valid off regex"));
static VALID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvalid(?:ity)?\b").expect("valid validity regex"));
static CARDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:cards?|mada)\b").expect("valid cards regex"));

/// Offer lines longer than this are treated as prose, not offers.
const MAX_OFFER_LINE_CHARS: usize = 200;
const MAX_MERCHANT_LINE_CHARS: usize = 80;

/// Selector lists for the container tier. Within `containers`, the first
/// selector that matches anything wins; field lists are tried in order.
pub(crate) struct ContainerProfile {
    pub containers: &'static [&'static str],
    pub title: &'static [&'static str],
    pub merchant: &'static [&'static str],
    pub description: &'static [&'static str],
    pub discount: &'static [&'static str],
    pub validity: &'static [&'static str],
    pub terms: &'static [&'static str],
}

pub(crate) const DEFAULT_TITLE: &[&str] = &["h2", "h3", "h4", "a.title", ".title", "[class*=title]"];
pub(crate) const DEFAULT_MERCHANT: &[&str] = &[
    ".merchant",
    ".brand",
    ".rb-brand-name",
    "[class*=merchant]",
];
pub(crate) const DEFAULT_DESCRIPTION: &[&str] = &["p", ".description", "[class*=desc]"];
pub(crate) const DEFAULT_VALIDITY: &[&str] = &["span.date", "[class*=valid]", "[class*=date]"];
pub(crate) const DEFAULT_TERMS: &[&str] = &[".terms", "[class*=terms]", "small"];

/// Container selectors of every known bank layout, for unrecognized sources.
pub(crate) const GENERIC_PROFILE: ContainerProfile = ContainerProfile {
    containers: &[
        ".offer-card",
        ".card-offer",
        "div.special-offer",
        "div.offer",
        "li.offer",
        "article",
        "div.card",
    ],
    title: DEFAULT_TITLE,
    merchant: DEFAULT_MERCHANT,
    description: DEFAULT_DESCRIPTION,
    discount: &["[class*=discount]"],
    validity: DEFAULT_VALIDITY,
    terms: DEFAULT_TERMS,
};

/// Collapses runs of whitespace and trims.
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn parse_selectors(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// Text of the first element matching any of `selectors`, in order.
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    parse_selectors(selectors).iter().find_map(|selector| {
        scope
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn none_if_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The percentage figure in `text` ("20%"), else the whole text when it
/// carries an "off" marker.
pub(crate) fn discount_figure(text: &str) -> Option<String> {
    if let Some(caps) = PERCENT_RE.captures(text) {
        return Some(format!("{}%", &caps[1]));
    }
    if OFF_RE.is_match(text) {
        return none_if_empty(clean_text(text));
    }
    None
}

pub(crate) fn is_offer_line(line: &str) -> bool {
    line.chars().count() <= MAX_OFFER_LINE_CHARS
        && (PERCENT_RE.is_match(line) || OFF_RE.is_match(line))
}

pub(crate) fn is_validity_hint(line: &str) -> bool {
    VALID_RE.is_match(line) || mentions_date(line)
}

pub(crate) fn is_cards_hint(line: &str) -> bool {
    CARDS_RE.is_match(line)
}

fn is_merchant_candidate(line: &str) -> bool {
    let len = line.chars().count();
    (2..=MAX_MERCHANT_LINE_CHARS).contains(&len)
        && !is_offer_line(line)
        && !is_validity_hint(line)
        && !is_cards_hint(line)
        && category_from_label(line).is_none()
}

/// Resolves `href` against `base_url`. Fragment-only and non-navigational
/// links resolve to `None`.
///
/// # Errors
///
/// Returns [`ExtractError::UnresolvableLink`] when the href cannot be joined.
pub(crate) fn resolve_link(base_url: &Url, href: &str) -> Result<Option<String>, ExtractError> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
    {
        return Ok(None);
    }
    base_url
        .join(href)
        .map(|u| Some(u.to_string()))
        .map_err(|source| ExtractError::UnresolvableLink {
            href: href.to_string(),
            source,
        })
}

fn discount_in(container: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    if let Some(text) = first_text(container, selectors) {
        return Some(text);
    }
    container
        .text()
        .map(clean_text)
        .find(|t| PERCENT_RE.is_match(t) || OFF_RE.is_match(t))
}

fn validity_in(container: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    if let Some(text) = first_text(container, selectors) {
        return Some(text);
    }
    container
        .text()
        .map(clean_text)
        .find(|t| is_validity_hint(t))
}

fn parse_container(
    container: ElementRef<'_>,
    profile: &ContainerProfile,
    base_url: &Url,
    keywords: &CategoryKeywords,
) -> Result<CandidateDraft, ExtractError> {
    let title = first_text(container, profile.title).ok_or(ExtractError::MissingTitle)?;
    let merchant = first_text(container, profile.merchant).unwrap_or_else(|| title.clone());
    let description = parse_selectors(profile.description)
        .iter()
        .find_map(|selector| {
            container
                .select(selector)
                .map(element_text)
                .find(|text| !text.is_empty() && *text != title)
        });

    let origin_url = match Selector::parse("a[href]") {
        Ok(selector) => match container
            .select(&selector)
            .find_map(|a| a.value().attr("href"))
        {
            Some(href) => resolve_link(base_url, href)?,
            None => None,
        },
        Err(_) => None,
    };

    let labelled = first_text(container, &["[class*=category]"])
        .as_deref()
        .and_then(category_from_label);
    let category = labelled.unwrap_or_else(|| {
        infer_category(
            &format!(
                "{merchant} {title} {}",
                description.as_deref().unwrap_or_default()
            ),
            keywords,
        )
    });

    Ok(CandidateDraft {
        discount: discount_in(container, profile.discount),
        validity: validity_in(container, profile.validity),
        terms: first_text(container, profile.terms),
        title,
        merchant: Some(merchant),
        description,
        origin_url,
        category: Some(category),
        applicable_cards: None,
    })
}

/// Tier 1: repeated offer containers, each parsed independently.
pub(crate) fn scan_containers(
    document: &Html,
    profile: &ContainerProfile,
    base_url: &Url,
    keywords: &CategoryKeywords,
) -> Vec<CandidateDraft> {
    let Some((selector, matched)) = parse_selectors(profile.containers)
        .into_iter()
        .find_map(|selector| {
            let matched: Vec<ElementRef<'_>> = document.select(&selector).collect();
            if matched.is_empty() {
                None
            } else {
                Some((selector, matched))
            }
        })
    else {
        return Vec::new();
    };

    tracing::debug!(
        selector = ?selector,
        containers = matched.len(),
        "matched offer containers"
    );

    matched
        .into_iter()
        .filter_map(|container| {
            match parse_container(container, profile, base_url, keywords) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping offer container");
                    None
                }
            }
        })
        .collect()
}

/// Tier 2: links whose href contains `path_pattern` (case-insensitive),
/// one draft per distinct absolute URL.
pub(crate) fn scan_anchors(
    document: &Html,
    path_pattern: &str,
    base_url: &Url,
    keywords: &CategoryKeywords,
) -> Vec<CandidateDraft> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let pattern = path_pattern.to_lowercase();
    let listing = base_url.as_str().trim_end_matches('/');
    let mut seen = HashSet::new();
    let mut drafts = Vec::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.to_lowercase().contains(&pattern) {
            continue;
        }
        let url = match resolve_link(base_url, href) {
            Ok(Some(url)) => url,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "skipping offer link");
                continue;
            }
        };
        if url.trim_end_matches('/') == listing || !seen.insert(url.clone()) {
            continue;
        }
        let title = element_text(anchor);
        if title.chars().count() <= 3 {
            tracing::debug!(href, error = %ExtractError::MissingTitle, "skipping offer link");
            continue;
        }
        drafts.push(CandidateDraft {
            merchant: Some(title.clone()),
            discount: discount_figure(&title),
            category: Some(infer_category(&title, keywords)),
            origin_url: Some(url),
            title,
            ..CandidateDraft::default()
        });
    }

    drafts
}

fn look_back<'a>(lines: &'a [String], i: usize, n: usize) -> impl Iterator<Item = &'a String> {
    lines[i.saturating_sub(n)..i].iter().rev()
}

fn look_ahead<'a>(lines: &'a [String], i: usize, n: usize) -> impl Iterator<Item = &'a String> {
    lines.iter().skip(i + 1).take(n)
}

/// Tier 3: windowed scan of flattened text lines around each offer line.
pub(crate) fn scan_lines(
    lines: &[String],
    window: &ScanWindow,
    keywords: &CategoryKeywords,
) -> Vec<CandidateDraft> {
    let mut drafts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !is_offer_line(line) {
            continue;
        }

        let merchant = look_back(lines, i, window.merchant_lookback)
            .find(|l| is_merchant_candidate(l))
            .cloned();
        let validity = look_ahead(lines, i, window.validity_lookahead)
            .find(|l| is_validity_hint(l))
            .cloned();
        let applicable_cards = look_ahead(lines, i, window.cards_lookahead)
            .find(|l| is_cards_hint(l))
            .cloned();
        let category = look_back(lines, i, window.category_lookback)
            .find_map(|l| category_from_label(l))
            .unwrap_or_else(|| {
                infer_category(
                    &format!("{} {line}", merchant.as_deref().unwrap_or_default()),
                    keywords,
                )
            });

        drafts.push(CandidateDraft {
            title: line.clone(),
            discount: discount_figure(line),
            merchant,
            validity,
            applicable_cards,
            category: Some(category),
            ..CandidateDraft::default()
        });
    }

    drafts
}

#[cfg(test)]
#[path = "heuristics_test.rs"]
mod tests;
