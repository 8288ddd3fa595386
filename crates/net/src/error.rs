//! Relay transport error types

/// Transport result type
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures below the relay protocol: the request never produced a body
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Relay unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Classify a reqwest failure the way the logs should read it
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Unreachable(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidUrl(e.to_string())
        } else {
            TransportError::Http(e)
        }
    }
}
