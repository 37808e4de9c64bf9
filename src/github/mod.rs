//! Pull request fetcher for the GitHub GraphQL API.

pub mod error;
pub mod graphql;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub use error::{ErrorContext, FetchError};
pub use graphql::{build_query, GithubGraphqlClient, DEFAULT_TIMEOUT, GITHUB_GRAPHQL_URL};
pub use types::*;

/// Records requested per page, and the threshold below which a page ends the fetch.
pub const PAGE_SIZE: usize = 100;

/// Source of `pullRequests` pages, newest `updatedAt` first.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Fetch one page. `after` is the previous page's end cursor, `None` for the first page.
    async fn fetch_page(
        &self,
        repository: &str,
        after: Option<&str>,
    ) -> Result<PullRequestPage, FetchError>;
}

/// Fetch every pull request of `repository` updated strictly after `updated_from`.
///
/// Each page is filtered as soon as it arrives. Paging stops once a page keeps fewer
/// than [`PAGE_SIZE`] records or GitHub reports no further page. The result is
/// oldest first, so replaying it in order leaves the newest write last.
pub async fn fetch_pull_requests(
    source: &dyn PullRequestSource,
    repository: &str,
    updated_from: Option<DateTime<Utc>>,
) -> Result<Vec<PullRequestRecord>, FetchError> {
    match updated_from {
        Some(from) => info!(repository, updated_from = %from, "fetching pull requests"),
        None => info!(repository, "fetching all pull requests"),
    }

    let mut records = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(repository, after.as_deref()).await?;
        pages += 1;

        let fetched = page.nodes.len();
        let mut nodes = page.nodes;
        if let Some(from) = updated_from {
            nodes.retain(|node| node.updated_at > from);
        }
        let kept = nodes.len();
        debug!(repository, page = pages, fetched, kept, "fetched pull request page");

        records.extend(nodes);

        if kept < PAGE_SIZE || !page.page_info.has_next_page {
            break;
        }
        match page.page_info.end_cursor {
            Some(cursor) => after = Some(cursor),
            None => {
                return Err(FetchError::invalid_response(
                    "hasNextPage is true but endCursor is missing",
                ))
            }
        }
    }

    info!(repository, pages, records = records.len(), "fetched pull requests");

    records.reverse();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        pages: Mutex<VecDeque<PullRequestPage>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<PullRequestPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PullRequestSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _repository: &str,
            after: Option<&str>,
        ) -> Result<PullRequestPage, FetchError> {
            self.cursors.lock().unwrap().push(after.map(String::from));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| FetchError::invalid_response("no more scripted pages"))
        }
    }

    fn base() -> DateTime<Utc> {
        "2024-06-01T00:00:00Z".parse().unwrap()
    }

    fn record(number: u64, updated_at: DateTime<Utc>) -> PullRequestRecord {
        PullRequestRecord {
            number,
            author: Some(Author {
                login: "octocat".into(),
            }),
            head_ref_name: format!("feature/{number}"),
            body_text: String::new(),
            merged: false,
            merged_at: None,
            commits: CommitConnection::default(),
            updated_at,
        }
    }

    /// `count` records, newest first, one hour apart starting at `newest`.
    fn descending(
        start_number: u64,
        count: usize,
        newest: DateTime<Utc>,
    ) -> Vec<PullRequestRecord> {
        (0..count)
            .map(|i| record(start_number - i as u64, newest - Duration::hours(i as i64)))
            .collect()
    }

    fn page(nodes: Vec<PullRequestRecord>, has_next_page: bool, cursor: &str) -> PullRequestPage {
        PullRequestPage {
            page_info: PageInfo {
                start_cursor: None,
                has_next_page,
                end_cursor: Some(cursor.to_string()),
            },
            nodes,
        }
    }

    #[tokio::test]
    async fn follows_cursor_until_short_page() {
        let source = ScriptedSource::new(vec![
            page(descending(201, 100, base()), true, "c1"),
            page(descending(101, 1, base() - Duration::days(10)), false, "c2"),
        ]);

        let records = fetch_pull_requests(&source, "api", None).await.unwrap();

        assert_eq!(source.cursors(), vec![None, Some("c1".to_string())]);
        assert_eq!(records.len(), 101);
        assert_eq!(records.first().unwrap().number, 101);
        assert_eq!(records.last().unwrap().number, 201);
    }

    #[tokio::test]
    async fn short_page_stops_even_if_more_pages_exist() {
        let source = ScriptedSource::new(vec![page(descending(50, 50, base()), true, "c1")]);

        let records = fetch_pull_requests(&source, "api", None).await.unwrap();

        assert_eq!(source.cursors().len(), 1);
        assert_eq!(records.len(), 50);
    }

    #[tokio::test]
    async fn filtered_page_below_limit_stops() {
        let source = ScriptedSource::new(vec![page(descending(100, 100, base()), true, "c1")]);
        let since = base() - Duration::hours(3);

        let records = fetch_pull_requests(&source, "api", Some(since)).await.unwrap();

        assert_eq!(source.cursors().len(), 1);
        assert_eq!(
            records.iter().map(|r| r.number).collect::<Vec<_>>(),
            vec![98, 99, 100]
        );
    }

    #[tokio::test]
    async fn since_filter_is_strict() {
        let source = ScriptedSource::new(vec![page(
            vec![record(2, base()), record(1, base() - Duration::days(1))],
            false,
            "c1",
        )]);

        let records = fetch_pull_requests(&source, "api", Some(base() - Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number, 2);
    }

    #[tokio::test]
    async fn page_failure_discards_earlier_pages() {
        let source = ScriptedSource::new(vec![page(descending(201, 100, base()), true, "c1")]);

        let err = fetch_pull_requests(&source, "api", None).await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidResponse(_)));
        assert_eq!(source.cursors().len(), 2);
    }

    #[tokio::test]
    async fn missing_end_cursor_is_an_error() {
        let mut first = page(descending(201, 100, base()), true, "c1");
        first.page_info.end_cursor = None;
        let source = ScriptedSource::new(vec![first]);

        let err = fetch_pull_requests(&source, "api", None).await.unwrap_err();

        assert_eq!(err.code(), "invalid_response");
        assert_eq!(source.cursors().len(), 1);
    }
}
