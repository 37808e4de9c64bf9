//! GitHub GraphQL adapter for the `pullRequests` connection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, FetchError};
use super::types::{GraphqlResponse, PullRequestPage};
use super::{PullRequestSource, PAGE_SIZE};
use crate::config::SyncConfig;

/// Public GitHub GraphQL endpoint.
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// HTTP timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// CLIENT
// =============================================================================

/// GraphQL client scoped to one repository owner.
#[derive(Debug, Clone)]
pub struct GithubGraphqlClient {
    client: reqwest::Client,
    endpoint: String,
    owner: String,
}

impl GithubGraphqlClient {
    /// Create against the public endpoint.
    pub fn new(token: impl Into<String>, owner: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_config(token, owner, GITHUB_GRAPHQL_URL, DEFAULT_TIMEOUT)
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, FetchError> {
        Self::with_config(
            config.token.clone(),
            config.owner.clone(),
            config.endpoint.clone(),
            config.timeout,
        )
    }

    /// Create with custom configuration.
    pub fn with_config(
        token: impl Into<String>,
        owner: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let token = token.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("four-keys/", env!("CARGO_PKG_VERSION"))),
        );

        let auth_value = HeaderValue::from_str(&format!("bearer {token}"))
            .map_err(|_| FetchError::config("Invalid API token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            owner: owner.into(),
        })
    }

    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-github-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

// =============================================================================
// QUERY
// =============================================================================

#[derive(Serialize)]
struct QueryPayload<'a> {
    query: &'a str,
}

/// GitHub's error body for non-GraphQL failures (401, 403, 5xx).
#[derive(Deserialize)]
struct RestErrorBody {
    message: Option<String>,
}

/// Quote `value` as a GraphQL string literal.
fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Build the pull request page query. `after` is omitted on the first page.
pub fn build_query(
    owner: &str,
    repository: &str,
    page_size: usize,
    after: Option<&str>,
) -> String {
    let after = after
        .map(|cursor| format!(", after: {}", string_literal(cursor)))
        .unwrap_or_default();

    format!(
        r#"query{{
  repository(name: {name}, owner: {owner}){{
    pullRequests (first: {page_size}{after}, orderBy: {{field: UPDATED_AT, direction: DESC}}) {{
      pageInfo {{
        startCursor
        hasNextPage
        endCursor
      }}
      nodes {{
        number
        author {{
          login
        }}
        headRefName
        bodyText
        merged
        mergedAt
        commits (first: 1) {{
          nodes {{
            commit {{
              committedDate
            }}
          }}
        }}
        updatedAt
      }}
    }}
  }}
}}"#,
        name = string_literal(repository),
        owner = string_literal(owner),
    )
}

// =============================================================================
// SOURCE IMPL
// =============================================================================

#[async_trait]
impl PullRequestSource for GithubGraphqlClient {
    async fn fetch_page(
        &self,
        repository: &str,
        after: Option<&str>,
    ) -> Result<PullRequestPage, FetchError> {
        let query = build_query(&self.owner, repository, PAGE_SIZE, after);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryPayload { query: &query })
            .send()
            .await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            let ctx = ErrorContext::new().with_status(status.as_u16());
            let ctx = match request_id {
                Some(id) => ctx.with_request_id(id),
                None => ctx,
            };
            let message = serde_json::from_str::<RestErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
                context: ctx,
            });
        }

        let parsed: GraphqlResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::invalid_response(format!("Invalid JSON: {e}")))?;

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            if errors
                .iter()
                .any(|e| e.error_type.as_deref() == Some("NOT_FOUND"))
            {
                return Err(FetchError::RepositoryNotFound {
                    owner: self.owner.clone(),
                    name: repository.to_string(),
                });
            }
            let message = errors
                .into_iter()
                .filter_map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::Graphql(message));
        }

        let data = parsed
            .data
            .ok_or_else(|| FetchError::invalid_response("Missing data in response"))?;

        let repository_node = data.repository.ok_or_else(|| FetchError::RepositoryNotFound {
            owner: self.owner.clone(),
            name: repository.to_string(),
        })?;

        Ok(repository_node.pull_requests)
    }
}
