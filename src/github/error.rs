//! Error types for the GitHub fetcher.

use thiserror::Error;

/// Additional context from a failed GitHub call.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code.
    pub http_status: Option<u16>,
    /// GitHub request ID (`x-github-request-id` header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that abort a pull request fetch. No partial result survives any of them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a non-success status.
    #[error("github returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The GraphQL response carried an `errors` array.
    #[error("graphql error: {0}")]
    Graphql(String),

    /// Body was not the expected JSON shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// `data.repository` was null.
    #[error("repository not found: {owner}/{name}")]
    RepositoryNotFound { owner: String, name: String },

    /// Configuration error (bad token, bad endpoint).
    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_error",
            Self::Status { .. } => "http_status",
            Self::Graphql(_) => "graphql_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RepositoryNotFound { .. } => "repository_not_found",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Status { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}
