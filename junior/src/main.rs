use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use junior::{parse_value, Settings};
use junior_cache::{start_auto_compaction, CacheManager, LedgerEntry, TierName};

#[derive(Parser)]
#[command(name = "junior")]
#[command(about = "Tiered cache and knowledge search for Junior", long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides settings)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a cached value
    Get {
        key: String,

        /// short_term, medium_term or long_term
        #[arg(short, long, default_value = "short_term")]
        tier: TierName,
    },

    /// Store a value (JSON, or plain text stored as a string)
    Set {
        key: String,

        value: String,

        #[arg(short, long, default_value = "short_term")]
        tier: TierName,

        /// Time to live in seconds (long_term only)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Interaction context ledger
    Context {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Execution step ledger
    Memory {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Knowledge base documents
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Show per-tier statistics
    Stats,

    /// Delete expired long-term rows
    Compact {
        /// Keep running and compact periodically until interrupted
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Append an entry
    Add { payload: String },

    /// Show retained entries, oldest first
    List,
}

#[derive(Subcommand)]
enum KbAction {
    /// Add a document
    Add { content: String },

    /// Show the best matching documents
    Search { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.cache_dir {
        settings.cache.cache_dir = dir;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(settings.log_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let embedder = settings.build_embedder()?;
    let manager = CacheManager::open(settings.cache.clone(), embedder)
        .with_context(|| format!("Failed to open cache at {:?}", settings.cache.cache_dir))?;

    match cli.command {
        Commands::Get { key, tier } => match manager.get(&key, tier)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                println!("(miss)");
            }
        },

        Commands::Set {
            key,
            value,
            tier,
            ttl_secs,
        } => {
            manager.set(&key, parse_value(&value), tier, ttl_secs.map(Duration::from_secs))?;
            println!("Stored {} in {}", key, tier);
        }

        Commands::Context { action } => match action {
            LedgerAction::Add { payload } => {
                manager.add_to_context(parse_value(&payload))?;
                println!("Context entries: {}", manager.context().len()?);
            }
            LedgerAction::List => print_ledger(&manager.get_recent_context()?)?,
        },

        Commands::Memory { action } => match action {
            LedgerAction::Add { payload } => {
                manager.add_to_memory(parse_value(&payload))?;
                println!("Memory steps: {}", manager.memory().len()?);
            }
            LedgerAction::List => print_ledger(&manager.get_memory_steps()?)?,
        },

        Commands::Kb { action } => match action {
            KbAction::Add { content } => {
                let doc = manager.add_document(parse_value(&content))?;
                println!("Added document {}", doc.id);
            }
            KbAction::Search { query } => {
                let hits = manager.search_knowledge_base(&query)?;
                if hits.is_empty() {
                    println!("No matching documents.");
                }
                for (rank, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {} {}",
                        rank + 1,
                        hit.score,
                        hit.document.id,
                        hit.document.content
                    );
                }
            }
        },

        Commands::Stats => {
            println!("{}", manager.stats()?);
        }

        Commands::Compact { watch } => {
            let removed = manager.compact_expired()?;
            println!("Removed {} expired rows", removed);

            if watch {
                let interval = settings.cache.compaction_interval();
                let task = tokio::spawn(start_auto_compaction(Arc::new(manager), interval));
                tokio::signal::ctrl_c()
                    .await
                    .context("Failed to listen for ctrl-c")?;
                task.abort();
                info!("Compaction stopped");
            }
        }
    }

    Ok(())
}

fn print_ledger(entries: &[LedgerEntry]) -> Result<()> {
    if entries.is_empty() {
        println!("(empty)");
    }
    for entry in entries {
        println!(
            "{}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            serde_json::to_string(&entry.payload)?
        );
    }
    Ok(())
}
