use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use marketwire::config::Config;
use marketwire::feed::{BatchReport, FeedRegistry, HttpTransport, IngestError, Ingestor};
use marketwire::storage::SharedDatabase;

/// Get the config directory path (~/.config/marketwire/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("marketwire"))
}

#[derive(Parser, Debug)]
#[command(
    name = "marketwire",
    about = "Fetch financial news feeds and store new items exactly once"
)]
struct Args {
    /// Source keys to fetch (see --list)
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,

    /// Fetch every registered source
    #[arg(long, conflicts_with = "sources")]
    all: bool,

    /// List registered sources and exit
    #[arg(long)]
    list: bool,

    /// SQLite database file (overrides config)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Config file (default ~/.config/marketwire/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print new items as JSON lines instead of titles
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let registry = FeedRegistry::builtin();

    if args.list {
        for source in registry.sources() {
            println!("{:<14} {:<20} {}", source.key, source.id, source.name);
        }
        return Ok(());
    }

    if !args.all && args.sources.is_empty() {
        anyhow::bail!("No sources given. Pass source keys, --all, or --list to see them.");
    }

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match args.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            config_dir.join("marketwire.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let store = Arc::new(SharedDatabase::new(db_path_str));
    let transport = Arc::new(
        HttpTransport::from_config(&config).context("Failed to build HTTP client")?,
    );
    let ingestor = Ingestor::new(registry, transport, Arc::clone(&store))
        .with_concurrency(config.concurrency);

    let results: Vec<(String, Result<BatchReport, IngestError>)> = if args.all {
        ingestor
            .fetch_all()
            .await
            .into_iter()
            .map(|r| (r.key, r.result))
            .collect()
    } else {
        let mut results = Vec::with_capacity(args.sources.len());
        for key in &args.sources {
            results.push((key.clone(), ingestor.fetch_report(key).await));
        }
        results
    };

    let mut failed_sources = 0;
    for (key, result) in results {
        match result {
            Ok(report) => print_report(&key, report, args.json)?,
            Err(e) => {
                failed_sources += 1;
                eprintln!("{}: {}", key, e);
            }
        }
    }

    store.close().await;

    if failed_sources > 0 {
        anyhow::bail!("{} source(s) failed", failed_sources);
    }
    Ok(())
}

fn print_report(key: &str, report: BatchReport, json: bool) -> Result<()> {
    let summary = format!(
        "{}: {} new, {} updated, {} skipped",
        key,
        report.created_count(),
        report.updated_count(),
        report.failed_count()
    );

    for item in report.into_created() {
        if json {
            println!("{}", serde_json::to_string(&item).context("Failed to encode item")?);
        } else {
            println!("[{}] {}  {}", item.source, item.title, item.link);
        }
    }
    if json {
        eprintln!("{}", summary);
    } else {
        println!("{}", summary);
    }
    Ok(())
}
