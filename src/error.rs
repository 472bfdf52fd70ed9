//! Client error taxonomy.
//!
//! None of these are fatal: the poll loop logs them and keeps the previously
//! rendered state as the fallback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, step or fetch failure.  Retried on the next trigger.
    #[error("transport error: {0}")]
    Transport(String),

    /// The snapshot body is not valid JSON for the expected shape.
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// The snapshot parsed but violates the grid contract.
    #[error("snapshot schema mismatch: {0}")]
    Schema(String),

    /// An event or binding references something with no rendered counterpart.
    #[error("no rendered object for {0}")]
    Mapping(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ClientError {
    /// Parse and schema failures both mean "discard this snapshot".
    pub fn is_parse(&self) -> bool {
        matches!(self, ClientError::Parse(_) | ClientError::Schema(_))
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
