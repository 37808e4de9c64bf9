#![forbid(unsafe_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use four_keys::datetime::DATE_FORMAT;
use four_keys::four_keys_sheet::generate_report;
use four_keys::{
    initialize, DisplayZone, GithubGraphqlClient, PullRequestsSheet, SqliteSheetStore, SyncConfig,
    SyncDriver,
};

#[derive(Parser)]
#[command(name = "four-keys", version, about = "Pull request sync and four keys metrics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the sheets and fill in default settings
    Init {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Fetch pull requests from GitHub and upsert them into the store
    Sync {
        #[arg(long)]
        db: Option<PathBuf>,
        /// Comma-separated repository names (defaults to GITHUB_REPO_NAMES)
        #[arg(long, value_delimiter = ',')]
        repos: Vec<String>,
    },
    /// Compute the four keys for the last five fortnights and write them
    Report {
        #[arg(long)]
        db: Option<PathBuf>,
        /// Last report date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Export stored pull request rows to JSONL
    Export {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteSheetStore, Box<dyn std::error::Error>> {
    let path = db.unwrap_or_else(SqliteSheetStore::default_path);
    Ok(SqliteSheetStore::new(path)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let zone = DisplayZone::default();

    match cli.command {
        Commands::Init { db } => {
            let store = open_store(db)?;
            let _lock = store.lock_exclusive()?;
            initialize(&store, zone).await?;
            println!("initialized {}", store.path().display());
        }
        Commands::Sync { db, repos } => {
            let mut config = SyncConfig::from_env()?;
            if !repos.is_empty() {
                config = config.with_repositories(repos);
            }
            let client = GithubGraphqlClient::from_config(&config)?;

            let store = open_store(db)?;
            let _lock = store.lock_exclusive()?;
            let driver = SyncDriver::new(&client, &store).with_zone(zone);
            let summaries = driver.sync_all(&config.repositories).await?;
            for summary in summaries {
                println!(
                    "{}: fetched {}, inserted {}, updated {}",
                    summary.repository, summary.fetched, summary.inserted, summary.updated
                );
            }
        }
        Commands::Report { db, date } => {
            let today = match date {
                Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                    .map_err(|e| format!("--date must be YYYY-MM-DD: {e}"))?,
                None => zone.today(),
            };
            let store = open_store(db)?;
            let _lock = store.lock_exclusive()?;
            let reports = generate_report(&store, zone, today).await?;

            println!(
                "date        deploy/day  rank    lead(h)  rank    cfr     rank    restore(h) rank"
            );
            for r in reports {
                println!(
                    "{}  {:>10.3}  {:<6}  {:>7.1}  {:<6}  {:>6.2}  {:<6}  {:>10.1} {}",
                    r.date.format(DATE_FORMAT),
                    r.deployment_frequency,
                    r.deployment_frequency_rank.to_string(),
                    r.lead_time_hours,
                    r.lead_time_rank.to_string(),
                    r.change_failure_rate,
                    r.change_failure_rate_rank.to_string(),
                    r.time_to_restore_hours,
                    r.time_to_restore_rank,
                );
            }
        }
        Commands::Export { db, out } => {
            let store = open_store(db)?;
            let sheet = PullRequestsSheet::open(&store, zone).await?;
            let count = sheet.export_jsonl(&out).await?;
            println!("exported {count} rows to {}", out.display());
        }
    }

    Ok(())
}
