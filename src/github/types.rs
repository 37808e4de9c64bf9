//! Wire types for the GitHub GraphQL pull request query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// PULL REQUEST
// =============================================================================

/// A pull request node as returned by the `pullRequests` connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    /// Unique within the repository.
    pub number: u64,
    /// `null` when the author account has been deleted.
    #[serde(default)]
    pub author: Option<Author>,
    pub head_ref_name: String,
    #[serde(default)]
    pub body_text: String,
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commits: CommitConnection,
    pub updated_at: DateTime<Utc>,
}

impl PullRequestRecord {
    pub fn author_login(&self) -> &str {
        self.author.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }

    /// Committed date of the first commit, if the query returned one.
    pub fn first_commit_date(&self) -> Option<DateTime<Utc>> {
        self.commits
            .nodes
            .first()
            .and_then(|node| node.commit.committed_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitConnection {
    #[serde(default)]
    pub nodes: Vec<CommitNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitNode {
    pub commit: Commit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(default)]
    pub committed_date: Option<DateTime<Utc>>,
}

// =============================================================================
// CONNECTION
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub start_cursor: Option<String>,
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// One page of the `pullRequests` connection, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestPage {
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<PullRequestRecord>,
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse {
    pub data: Option<ResponseData>,
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepositoryNode {
    pub pull_requests: PullRequestPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_node_with_missing_optionals() {
        let node: PullRequestRecord = serde_json::from_value(json!({
            "number": 7,
            "author": null,
            "headRefName": "feature/x",
            "bodyText": "",
            "merged": false,
            "mergedAt": null,
            "commits": { "nodes": [] },
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(node.author_login(), "");
        assert_eq!(node.merged_at, None);
        assert_eq!(node.first_commit_date(), None);
    }

    #[test]
    fn first_commit_date_reads_first_node() {
        let node: PullRequestRecord = serde_json::from_value(json!({
            "number": 1,
            "author": { "login": "octocat" },
            "headRefName": "main",
            "bodyText": "body",
            "merged": true,
            "mergedAt": "2024-01-02T00:00:00Z",
            "commits": { "nodes": [{ "commit": { "committedDate": "2024-01-01T00:00:00Z" } }] },
            "updatedAt": "2024-01-02T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(node.author_login(), "octocat");
        assert_eq!(
            node.first_commit_date(),
            Some("2024-01-01T00:00:00Z".parse().unwrap())
        );
    }
}
