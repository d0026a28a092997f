use thiserror::Error;

/// Errors surfaced while acquiring pages.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, timeout). Transient;
    /// retried with jittered backoff.
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The source rejected or lacked credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Session-file storage failure.
    #[error("session storage error: {0}")]
    Session(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
