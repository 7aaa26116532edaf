//! `batch` commands: claim candidates into batches, structure them, and
//! round-trip them through JSON for offline curation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Subcommand;
use offerdb_core::AppConfig;
use offerdb_pipeline::{
    export_batch, import_batch, parse_import, process_batch, DealStore, PgStore,
    StructuringRules,
};

/// Sub-commands available under `batch`.
#[derive(Debug, Subcommand)]
pub enum BatchCommands {
    /// Claim new candidates into a batch without structuring them
    Create {
        #[arg(long)]
        name: Option<String>,
        /// Maximum candidates (defaults to `OFFERDB_BATCH_SIZE`)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the most recent batches
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Structure every pending member of a batch with the rule table
    Process {
        #[arg(long)]
        id: i64,
    },
    /// Write a batch as JSON for curation
    Export {
        #[arg(long)]
        id: i64,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Apply a curated JSON file to a batch
    Import {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        file: PathBuf,
    },
}

pub(crate) async fn run_batch(
    store: &PgStore,
    config: &AppConfig,
    rules: &StructuringRules,
    command: BatchCommands,
) -> anyhow::Result<()> {
    match command {
        BatchCommands::Create { name, limit } => {
            let name = name
                .unwrap_or_else(|| format!("batch {}", Utc::now().format("%Y-%m-%d %H:%M")));
            match store
                .create_batch(&name, limit.unwrap_or(config.batch_size))
                .await?
            {
                Some(batch) => println!(
                    "created batch {} '{}' with {} candidate(s)",
                    batch.id, batch.name, batch.deals_count
                ),
                None => println!("no new candidates to batch"),
            }
        }
        BatchCommands::List { limit } => list_batches(store, limit).await?,
        BatchCommands::Process { id } => {
            let report = process_batch(store, id, rules).await?;
            println!(
                "batch {id}: structured {}, errors {}, skipped {} -> {}",
                report.structured, report.errors, report.skipped, report.status
            );
        }
        BatchCommands::Export { id, out } => {
            let export = export_batch(store, id).await?;
            let json = serde_json::to_string_pretty(&export)?;
            match out {
                Some(path) => {
                    write_file(&path, &json)?;
                    println!(
                        "exported {} deal(s) from batch {id} to {}",
                        export.deals.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
        BatchCommands::Import { id, file } => {
            let json = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            let import = parse_import(&json)?;
            let report = import_batch(store, id, &import, rules).await?;
            println!(
                "batch {id}: imported {}, errors {}, skipped {} -> {}",
                report.imported, report.errors, report.skipped, report.status
            );
            if !report.unknown_temp_ids.is_empty() {
                println!("unmatched temp_ids: {:?}", report.unknown_temp_ids);
            }
        }
    }

    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))
}

async fn list_batches(store: &PgStore, limit: u32) -> anyhow::Result<()> {
    let rows = offerdb_db::list_batches(store.pool(), i64::from(limit)).await?;
    if rows.is_empty() {
        println!("no batches");
        return Ok(());
    }

    println!("{:>6}  {:<10}  {:>5}  {:<16}  name", "id", "status", "deals", "created");
    for row in rows {
        println!(
            "{:>6}  {:<10}  {:>5}  {:<16}  {}",
            row.id,
            row.status,
            row.deals_count,
            row.created_at.format("%Y-%m-%d %H:%M"),
            row.name
        );
    }
    Ok(())
}
