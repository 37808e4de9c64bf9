//! Sync configuration, read once at process start and passed to the driver.

use std::time::Duration;

use crate::github::{DEFAULT_TIMEOUT, GITHUB_GRAPHQL_URL};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub owner: String,
    pub repositories: Vec<String>,
    pub token: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl SyncConfig {
    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from any name → value lookup.
    ///
    /// `GITHUB_REPO_NAMES` holds a JSON array of repository names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_names =
            lookup("GITHUB_REPO_NAMES").ok_or(ConfigError::Missing("GITHUB_REPO_NAMES"))?;
        let repositories = parse_repository_names(&raw_names)?;

        let owner = lookup("GITHUB_REPO_OWNER")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("GITHUB_REPO_OWNER"))?;

        let token = lookup("GITHUB_API_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("GITHUB_API_TOKEN"))?;

        let endpoint =
            lookup("GITHUB_GRAPHQL_URL").unwrap_or_else(|| GITHUB_GRAPHQL_URL.to_string());

        let timeout = match lookup("GITHUB_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::Invalid {
                    name: "GITHUB_TIMEOUT_SECONDS",
                    message: format!("{raw:?}: {e}"),
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            owner: owner.trim().to_string(),
            repositories,
            token: token.trim().to_string(),
            endpoint,
            timeout,
        })
    }

    /// Restrict the run to `names`, keeping the configured order.
    pub fn with_repositories(mut self, names: Vec<String>) -> Self {
        self.repositories = names;
        self
    }
}

fn parse_repository_names(raw: &str) -> Result<Vec<String>, ConfigError> {
    let names: Vec<String> = serde_json::from_str(raw).map_err(|e| ConfigError::Invalid {
        name: "GITHUB_REPO_NAMES",
        message: format!("expected a JSON array of strings: {e}"),
    })?;
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(ConfigError::Invalid {
            name: "GITHUB_REPO_NAMES",
            message: "no repositories listed".to_string(),
        });
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_required_values() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("GITHUB_REPO_NAMES", r#"["repo1", "repo2"]"#),
            ("GITHUB_REPO_OWNER", "testOwner"),
            ("GITHUB_API_TOKEN", "test-token"),
        ]))
        .unwrap();

        assert_eq!(config.repositories, vec!["repo1", "repo2"]);
        assert_eq!(config.owner, "testOwner");
        assert_eq!(config.token, "test-token");
        assert_eq!(config.endpoint, GITHUB_GRAPHQL_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn optional_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("GITHUB_REPO_NAMES", r#"["api"]"#),
            ("GITHUB_REPO_OWNER", "acme"),
            ("GITHUB_API_TOKEN", "t"),
            ("GITHUB_GRAPHQL_URL", "http://localhost:9999/graphql"),
            ("GITHUB_TIMEOUT_SECONDS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:9999/graphql");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_token_is_reported() {
        let err = SyncConfig::from_lookup(lookup(&[
            ("GITHUB_REPO_NAMES", r#"["api"]"#),
            ("GITHUB_REPO_OWNER", "acme"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GITHUB_API_TOKEN")));
    }

    #[test]
    fn repository_names_must_be_json_array() {
        let err = SyncConfig::from_lookup(lookup(&[
            ("GITHUB_REPO_NAMES", "api,web"),
            ("GITHUB_REPO_OWNER", "acme"),
            ("GITHUB_API_TOKEN", "t"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GITHUB_REPO_NAMES",
                ..
            }
        ));

        let err = SyncConfig::from_lookup(lookup(&[
            ("GITHUB_REPO_NAMES", "[]"),
            ("GITHUB_REPO_OWNER", "acme"),
            ("GITHUB_API_TOKEN", "t"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
