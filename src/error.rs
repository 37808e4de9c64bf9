//! Crate-level error for sync passes, sheet layouts and reports.

use thiserror::Error;

use crate::github::FetchError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum FourKeysError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cannot find expected table: {0}")]
    MissingSheet(String),

    #[error("invalid pattern in {cell}: {source}")]
    InvalidPattern {
        cell: String,
        #[source]
        source: regex::Error,
    },
}

impl FourKeysError {
    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.code(),
            Self::Store(_) => "store_error",
            Self::MissingSheet(_) => "missing_sheet",
            Self::InvalidPattern { .. } => "invalid_pattern",
        }
    }
}
