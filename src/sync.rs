//! Sync driver: per repository, read the watermark, fetch, then upsert in order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::datetime::DisplayZone;
use crate::error::FourKeysError;
use crate::four_keys_sheet;
use crate::github::{fetch_pull_requests, PullRequestSource};
use crate::pull_requests::{PullRequestsSheet, UpsertOutcome};
use crate::settings;
use crate::store::TabularStore;

/// Create every sheet and write its layout. Existing settings values are kept.
pub async fn initialize(store: &dyn TabularStore, zone: DisplayZone) -> Result<(), FourKeysError> {
    PullRequestsSheet::initialize(store, zone).await?;
    settings::initialize(store).await?;
    four_keys_sheet::initialize(store).await?;
    info!("initialized sheets");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySummary {
    pub repository: String,
    pub updated_from: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
}

pub struct SyncDriver<'a> {
    source: &'a dyn PullRequestSource,
    store: &'a dyn TabularStore,
    zone: DisplayZone,
}

impl<'a> SyncDriver<'a> {
    pub fn new(source: &'a dyn PullRequestSource, store: &'a dyn TabularStore) -> Self {
        Self {
            source,
            store,
            zone: DisplayZone::default(),
        }
    }

    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    /// Sync one repository. Records are upserted oldest first.
    pub async fn sync_repository(
        &self,
        repository: &str,
    ) -> Result<RepositorySummary, FourKeysError> {
        let sheet = PullRequestsSheet::open(self.store, self.zone).await?;
        let updated_from = sheet.latest_updated_at(repository).await?;

        let records = fetch_pull_requests(self.source, repository, updated_from).await?;

        let mut summary = RepositorySummary {
            repository: repository.to_string(),
            updated_from,
            fetched: records.len(),
            inserted: 0,
            updated: 0,
        };
        for record in &records {
            match sheet.upsert(repository, record).await? {
                UpsertOutcome::Inserted(_) => summary.inserted += 1,
                UpsertOutcome::Updated(_) => summary.updated += 1,
            }
        }

        info!(
            repository,
            fetched = summary.fetched,
            inserted = summary.inserted,
            updated = summary.updated,
            "synced repository"
        );
        Ok(summary)
    }

    /// Sync `repositories` in order; the first failure stops the run.
    pub async fn sync_all(
        &self,
        repositories: &[String],
    ) -> Result<Vec<RepositorySummary>, FourKeysError> {
        let mut summaries = Vec::with_capacity(repositories.len());
        for repository in repositories {
            match self.sync_repository(repository).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(repository = %repository, code = e.code(), error = %e, "sync failed");
                    return Err(e);
                }
            }
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{FetchError, PageInfo, PullRequestPage};
    use crate::store::MemorySheetStore;
    use async_trait::async_trait;

    struct FailingSource;

    #[async_trait]
    impl PullRequestSource for FailingSource {
        async fn fetch_page(
            &self,
            _repository: &str,
            _after: Option<&str>,
        ) -> Result<PullRequestPage, FetchError> {
            Err(FetchError::Graphql("boom".into()))
        }
    }

    struct EmptySource;

    #[async_trait]
    impl PullRequestSource for EmptySource {
        async fn fetch_page(
            &self,
            _repository: &str,
            _after: Option<&str>,
        ) -> Result<PullRequestPage, FetchError> {
            Ok(PullRequestPage {
                page_info: PageInfo::default(),
                nodes: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn missing_sheet_stops_the_pass() {
        let store = MemorySheetStore::new();
        let driver = SyncDriver::new(&EmptySource, &store);
        let err = driver.sync_repository("api").await.unwrap_err();
        assert_eq!(err.to_string(), "cannot find expected table: Pull Requests");
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let store = MemorySheetStore::new();
        initialize(&store, DisplayZone::utc()).await.unwrap();
        let driver = SyncDriver::new(&FailingSource, &store);

        let err = driver
            .sync_all(&["api".to_string(), "web".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, FourKeysError::Fetch(FetchError::Graphql(_))));
    }

    #[tokio::test]
    async fn empty_repository_writes_nothing() {
        let store = MemorySheetStore::new();
        initialize(&store, DisplayZone::utc()).await.unwrap();
        let before = store.write_count();

        let driver = SyncDriver::new(&EmptySource, &store).with_zone(DisplayZone::utc());
        let summary = driver.sync_repository("api").await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.updated_from, None);
        assert_eq!(store.write_count(), before);
    }
}
