//! Fetch, extract, deduplicate, and persist candidates for one or more
//! sources.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use offerdb_core::{NewRawCandidate, SourceRecord};
use offerdb_scraper::{ContentFetcher, ExtractError, ExtractionConfig, ExtractorRegistry};
use serde::Serialize;

use crate::dedup::{mark_duplicate, Classification, Deduplicator};
use crate::error::PipelineError;
use crate::store::DealStore;

/// Everything a source run needs, borrowed for the duration of the run.
#[derive(Clone, Copy)]
pub struct IngestContext<'a> {
    pub fetcher: &'a dyn ContentFetcher,
    pub registry: &'a ExtractorRegistry,
    pub extraction: &'a ExtractionConfig,
    pub store: &'a dyn DealStore,
}

/// Result of one source run. A failed run still reports what it managed
/// before failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceRunReport {
    pub source: String,
    /// Drafts the extractor produced.
    pub found: usize,
    pub new: usize,
    pub duplicates: usize,
    pub failure: Option<String>,
}

impl SourceRunReport {
    fn for_source(source: &SourceRecord) -> Self {
        Self {
            source: source.slug.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs one source end to end. Never fails: fetch, extraction, and store
/// errors end the run early and are recorded in
/// [`SourceRunReport::failure`].
pub async fn run_source(ctx: IngestContext<'_>, source: &SourceRecord) -> SourceRunReport {
    let mut report = SourceRunReport::for_source(source);

    if let Err(e) = ingest(ctx, source, &mut report).await {
        tracing::warn!(source = %source.slug, error = %e, "source run failed");
        report.failure = Some(e.to_string());
        return report;
    }

    if let Err(e) = ctx.store.touch_source(source.id).await {
        tracing::warn!(source = %source.slug, error = %e, "failed to record fetch time");
    }

    tracing::info!(
        source = %source.slug,
        found = report.found,
        new = report.new,
        duplicates = report.duplicates,
        "source run finished"
    );
    report
}

async fn ingest(
    ctx: IngestContext<'_>,
    source: &SourceRecord,
    report: &mut SourceRunReport,
) -> Result<(), PipelineError> {
    if !ctx.registry.contains(&source.extractor) {
        return Err(ExtractError::UnknownExtractor(source.extractor.clone()).into());
    }

    let content = ctx.fetcher.fetch(source).await?;
    let drafts = ctx
        .registry
        .extract(&source.extractor, &content, ctx.extraction)?;
    report.found = drafts.len();

    let mut dedup = Deduplicator::new();
    for draft in drafts {
        let mut candidate = NewRawCandidate::from_draft(source.id, draft, content.fetched_at);

        if dedup.classify(ctx.store, &mut candidate).await? == Classification::Duplicate {
            report.duplicates += 1;
            continue;
        }

        match ctx.store.insert_raw_candidate(&candidate).await? {
            Some(id) => {
                tracing::debug!(
                    source = %source.slug,
                    id,
                    title = %candidate.draft.title,
                    "stored candidate"
                );
                report.new += 1;
            }
            None => {
                // Lost a race with a concurrent run holding the same fingerprint.
                mark_duplicate(&mut candidate)?;
                report.duplicates += 1;
            }
        }
    }

    Ok(())
}

/// Runs each distinct source once, at most `max_concurrent` at a time.
///
/// Repeated slugs are collapsed to their first occurrence so no source has
/// two overlapping runs. Reports come back in completion order.
pub async fn run_sources(
    ctx: IngestContext<'_>,
    sources: &[SourceRecord],
    max_concurrent: usize,
) -> Vec<SourceRunReport> {
    let mut seen = HashSet::new();
    let distinct: Vec<&SourceRecord> = sources
        .iter()
        .filter(|s| seen.insert(s.slug.as_str()))
        .collect();

    if distinct.len() < sources.len() {
        tracing::debug!(
            requested = sources.len(),
            distinct = distinct.len(),
            "collapsed repeated sources"
        );
    }

    stream::iter(distinct)
        .map(|source| run_source(ctx, source))
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await
}

/// Picks the sources a run should cover: the one matching `slug`
/// (active or not), or every active source.
///
/// # Errors
///
/// Returns [`PipelineError::UnknownSource`] if `slug` matches nothing, or
/// [`PipelineError::Store`] if sources can't be listed.
pub async fn select_sources(
    store: &dyn DealStore,
    slug: Option<&str>,
) -> Result<Vec<SourceRecord>, PipelineError> {
    let sources = store.sources().await?;
    match slug {
        Some(slug) => {
            let source = sources
                .into_iter()
                .find(|s| s.slug == slug)
                .ok_or_else(|| PipelineError::UnknownSource(slug.to_string()))?;
            Ok(vec![source])
        }
        None => Ok(sources.into_iter().filter(|s| s.is_active).collect()),
    }
}
