use thiserror::Error;

/// Structured cloud API error with a distinct `retryable` bit, so callers
/// can decide whether to back off and retry or give up.
#[derive(Debug, Error)]
pub enum CloudApiError {
    #[error("cloud api http {status}: {message}")]
    Http {
        status: reqwest::StatusCode,
        message: String,
        retryable: bool,
    },
    #[error("oauth token exchange failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cloud client closed")]
    Closed,
}

impl CloudApiError {
    pub fn retryable(&self) -> bool {
        match self {
            CloudApiError::Http { retryable, .. } => *retryable,
            CloudApiError::Auth(_) => false,
            CloudApiError::Transport(e) => e.is_timeout() || e.is_connect(),
            CloudApiError::Closed => false,
        }
    }
}
