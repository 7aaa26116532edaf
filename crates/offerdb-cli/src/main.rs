mod batch;
mod curate;
mod scrape;

use clap::{Parser, Subcommand};
use offerdb_core::{AppConfig, QualityTier, RulesFile};
use offerdb_pipeline::{PgStore, StructuringRules};
use tracing_subscriber::EnvFilter;

use crate::batch::BatchCommands;
use crate::curate::DealCommands;

#[derive(Debug, Parser)]
#[command(name = "offerdb")]
#[command(about = "Bank card offer scraping and curation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Fetch offer pages and store new candidates
    Scrape {
        /// Run only this source (active or not)
        #[arg(long)]
        source: Option<String>,
        /// Use an in-memory store and print what would be inserted
        #[arg(long)]
        dry_run: bool,
    },
    /// Batch up new candidates and structure them with the rule table
    Structure {
        /// Candidates per batch (defaults to `OFFERDB_BATCH_SIZE`)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Processing batches for external curation
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Inspect or correct structured deals
    Deal {
        #[command(subcommand)]
        command: DealCommands,
    },
    /// Record a human rating for a structured deal
    Rate {
        #[arg(long)]
        deal_id: i64,
        /// good, mediocre, or bad
        #[arg(long)]
        tier: QualityTier,
        #[arg(long)]
        reason: Option<String>,
        /// 1 to 10; keeps the current score when omitted
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        score: Option<u8>,
    },
    /// Recompute rule ratings for every deal not rated by a human
    Rescore,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert the sources file into the `sources` table
    Seed,
    /// Raw candidate counts per status
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = offerdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let Some(command) = cli.command else {
        println!("offerdb: no command given, see --help");
        return Ok(());
    };

    match command {
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Scrape {
            source,
            dry_run: true,
        } => {
            let rules = load_rules_file(&config)?;
            scrape::run_scrape_dry(&config, &rules, source.as_deref()).await
        }
        Commands::Scrape {
            source,
            dry_run: false,
        } => {
            let store = connect_store(&config).await?;
            let rules = load_rules_file(&config)?;
            scrape::run_scrape(&store, &config, &rules, source.as_deref()).await
        }
        Commands::Structure { limit } => {
            let store = connect_store(&config).await?;
            let rules = structuring_rules(&config)?;
            curate::run_structure(&store, &rules, limit.unwrap_or(config.batch_size)).await
        }
        Commands::Batch { command } => {
            let store = connect_store(&config).await?;
            let rules = structuring_rules(&config)?;
            batch::run_batch(&store, &config, &rules, command).await
        }
        Commands::Deal { command } => {
            let store = connect_store(&config).await?;
            let rules = load_rules_file(&config)?;
            curate::run_deal(&store, &rules.scoring, command).await
        }
        Commands::Rate {
            deal_id,
            tier,
            reason,
            score,
        } => {
            let store = connect_store(&config).await?;
            let rules = load_rules_file(&config)?;
            curate::run_rate(&store, &rules.scoring, deal_id, tier, score, reason).await
        }
        Commands::Rescore => {
            let store = connect_store(&config).await?;
            let rules = load_rules_file(&config)?;
            curate::run_rescore(&store, &rules.scoring).await
        }
    }
}

async fn connect_pool(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = offerdb_db::PoolConfig::from_app_config(config);
    let pool = offerdb_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<PgStore> {
    Ok(PgStore::new(connect_pool(config).await?))
}

/// The rules file named by `OFFERDB_RULES_PATH`, or the built-in rules.
fn load_rules_file(config: &AppConfig) -> anyhow::Result<RulesFile> {
    match &config.rules_path {
        Some(path) => Ok(offerdb_core::load_rules(path)?),
        None => Ok(RulesFile::default()),
    }
}

fn structuring_rules(config: &AppConfig) -> anyhow::Result<StructuringRules> {
    Ok(StructuringRules::new(
        load_rules_file(config)?,
        config.date_fallback_year,
    ))
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect_pool(config).await?;

    match command {
        DbCommands::Ping => {
            offerdb_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = offerdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let sources = offerdb_core::load_sources(&config.sources_path)?;
            let seeded = offerdb_db::seed_sources(&pool, &sources.sources).await?;
            println!(
                "seeded {seeded} source(s) from {}",
                config.sources_path.display()
            );
        }
        DbCommands::Stats => {
            let counts = offerdb_db::count_raw_deals_by_status(&pool).await?;
            if counts.is_empty() {
                println!("no raw candidates stored");
            }
            for (status, count) in counts {
                println!("{status:<12} {count}");
            }
        }
    }

    Ok(())
}
