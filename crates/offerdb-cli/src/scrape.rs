//! `scrape` command: run sources through the ingest pipeline.
//!
//! A failing source is reported and skipped; the command only fails when
//! every selected source failed.

use anyhow::bail;
use offerdb_core::{AppConfig, RulesFile};
use offerdb_pipeline::{
    run_sources, select_sources, DealStore, IngestContext, MemoryStore, SourceRunReport,
};
use offerdb_scraper::{
    ExtractionConfig, ExtractorRegistry, HeadlessFetcher, HttpFetcher, SourceFetcher,
};

fn build_fetcher(config: &AppConfig) -> anyhow::Result<SourceFetcher> {
    let http = HttpFetcher::new(config.fetch_timeout_secs, &config.fetch_user_agent)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
    let headless = config.headless_browser.as_ref().map(|browser| {
        HeadlessFetcher::new(
            browser.clone(),
            config.fetch_timeout_secs,
            &config.fetch_user_agent,
        )
    });
    Ok(SourceFetcher::new(http, headless))
}

async fn scrape(
    store: &dyn DealStore,
    config: &AppConfig,
    rules: &RulesFile,
    slug: Option<&str>,
) -> anyhow::Result<Vec<SourceRunReport>> {
    let sources = select_sources(store, slug).await?;
    if sources.is_empty() {
        println!("no active sources to scrape");
        return Ok(Vec::new());
    }

    tracing::info!(
        sources = sources.len(),
        max_concurrent = config.max_concurrent_sources,
        "scrape starting"
    );
    let fetcher = build_fetcher(config)?;
    let registry = ExtractorRegistry::with_defaults();
    let extraction = ExtractionConfig {
        scan: config.scan_window,
        keywords: rules.categories.clone(),
    };
    let ctx = IngestContext {
        fetcher: &fetcher,
        registry: &registry,
        extraction: &extraction,
        store,
    };

    let reports = run_sources(ctx, &sources, config.max_concurrent_sources).await;
    print_reports(&reports);

    if reports.iter().all(|r| !r.succeeded()) {
        bail!("all {} source(s) failed", reports.len());
    }
    Ok(reports)
}

fn print_reports(reports: &[SourceRunReport]) {
    for report in reports {
        match &report.failure {
            None => println!(
                "{:<12} found {:>4}  new {:>4}  duplicates {:>4}",
                report.source, report.found, report.new, report.duplicates
            ),
            Some(reason) => println!("{:<12} FAILED: {reason}", report.source),
        }
    }
}

/// Scrapes into the database.
///
/// # Errors
///
/// Returns an error if sources can't be selected, the HTTP client can't be
/// built, or every source failed.
pub(crate) async fn run_scrape(
    store: &dyn DealStore,
    config: &AppConfig,
    rules: &RulesFile,
    slug: Option<&str>,
) -> anyhow::Result<()> {
    let reports = scrape(store, config, rules, slug).await?;
    let new: usize = reports.iter().map(|r| r.new).sum();
    println!("stored {new} new candidate(s)");
    Ok(())
}

/// Scrapes into a throwaway in-memory store built from the sources file and
/// prints the candidates that would have been inserted.
///
/// Fingerprints already in the database are not consulted, so a dry run
/// reports every distinct offer on the pages as new.
///
/// # Errors
///
/// Returns an error if the sources file can't be loaded or every source
/// failed.
pub(crate) async fn run_scrape_dry(
    config: &AppConfig,
    rules: &RulesFile,
    slug: Option<&str>,
) -> anyhow::Result<()> {
    let sources = offerdb_core::load_sources(&config.sources_path)?;
    let store = MemoryStore::from_sources_file(&sources);

    scrape(&store, config, rules, slug).await?;

    let candidates = store.raw_candidates();
    println!("dry-run: would insert {} candidate(s)", candidates.len());
    for candidate in &candidates {
        println!(
            "  [{}] {} | {} | {}",
            candidate.source_name,
            candidate.draft.merchant.as_deref().unwrap_or("-"),
            candidate.draft.title,
            candidate.draft.validity.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
