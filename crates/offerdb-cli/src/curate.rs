//! `structure`, `deal`, `rate`, and `rescore` commands.

use std::path::PathBuf;

use clap::Subcommand;
use offerdb_core::{QualityTier, ScoringRules};
use offerdb_pipeline::{
    correct_deal, rate_deal, rescore_all, structure_pending, DealPatch, DealStore,
    StructuringRules,
};

/// Sub-commands available under `deal`.
#[derive(Debug, Subcommand)]
pub enum DealCommands {
    /// Print a structured deal and its rating as JSON
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Overwrite fields of a deal from a JSON patch file
    Edit {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        file: PathBuf,
    },
}

pub(crate) async fn run_structure(
    store: &dyn DealStore,
    rules: &StructuringRules,
    limit: usize,
) -> anyhow::Result<()> {
    match structure_pending(store, rules, limit).await? {
        None => println!("no new candidates to structure"),
        Some(report) => println!(
            "batch {}: structured {}, errors {}, skipped {} -> {}",
            report.batch_id, report.structured, report.errors, report.skipped, report.status
        ),
    }
    Ok(())
}

pub(crate) async fn run_rate(
    store: &dyn DealStore,
    scoring: &ScoringRules,
    deal_id: i64,
    tier: QualityTier,
    score: Option<u8>,
    reason: Option<String>,
) -> anyhow::Result<()> {
    let stored = rate_deal(store, scoring, deal_id, tier, score, reason).await?;
    println!(
        "deal {deal_id} rated {} ({}/10)",
        stored.rating.tier, stored.rating.score
    );
    Ok(())
}

pub(crate) async fn run_rescore(
    store: &dyn DealStore,
    scoring: &ScoringRules,
) -> anyhow::Result<()> {
    let report = rescore_all(store, scoring).await?;
    println!(
        "rescored {} deal(s): good {}, mediocre {}, bad {} (kept {} human rating(s))",
        report.rescored, report.good, report.mediocre, report.bad, report.skipped_human
    );
    Ok(())
}

pub(crate) async fn run_deal(
    store: &dyn DealStore,
    scoring: &ScoringRules,
    command: DealCommands,
) -> anyhow::Result<()> {
    match command {
        DealCommands::Show { id } => {
            let deal = store
                .get_structured_deal(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("structured deal {id} not found"))?;
            let rating = store.get_rating(id).await?;
            let json = serde_json::json!({ "deal": deal, "rating": rating });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        DealCommands::Edit { id, file } => {
            let json = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            let patch = DealPatch::from_json(&json)?;
            let deal = correct_deal(store, scoring, id, &patch).await?;
            println!(
                "deal {id} updated: {} | {}",
                deal.details.merchant_name, deal.details.offer_title
            );
        }
    }
    Ok(())
}
