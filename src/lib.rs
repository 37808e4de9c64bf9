#![forbid(unsafe_code)]

//! # four-keys
//!
//! Keeps a tabular store of pull request metadata in sync with GitHub and derives
//! the four DORA metrics (deployment frequency, lead time for changes, change
//! failure rate, time to restore) from it.
//!
//! A sync pass reads the newest `updatedAt` already stored for a repository, pages
//! through the GraphQL `pullRequests` connection newest first until it reaches that
//! watermark, and upserts each record oldest first into the "Pull Requests" sheet
//! keyed by `{repository}/{number}`. Reports are computed from the stored rows
//! and the "Settings" sheet, then written to the "Four Keys" sheet.

pub mod config;
pub mod datetime;
pub mod error;
pub mod four_keys_sheet;
pub mod github;
pub mod metrics;
pub mod pull_requests;
pub mod settings;
pub mod store;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use datetime::DisplayZone;
pub use error::FourKeysError;
pub use github::{
    fetch_pull_requests, FetchError, GithubGraphqlClient, PullRequestPage, PullRequestRecord,
    PullRequestSource,
};
pub use metrics::{compute_four_keys, FourKeysReport, Rank, RankThresholds};
pub use pull_requests::{natural_key, PullRequestsSheet, StoredRow, UpsertOutcome};
pub use settings::AnalysisSettings;
pub use store::{CellValue, MemorySheetStore, SqliteSheetStore, StoreError, TabularStore};
pub use sync::{initialize, RepositorySummary, SyncDriver};
