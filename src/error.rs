use thiserror::Error;

/// Errors surfaced by the recovery search.
///
/// Cancelling a search is not an error: a stopped session ends with a
/// `search-stopped` event instead.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Invalid search parameters, reported before any search starts.
    #[error("invalid configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    /// Rejected precision, division by zero or a similar arithmetic failure.
    /// Fatal for the session that raised it.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// The worker thread behind a search is gone.
    #[error("search worker {0} is no longer running")]
    WorkerDisconnected(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RecoveryError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RecoveryError::Configuration(vec![message.into()])
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        RecoveryError::Arithmetic(message.into())
    }

    pub fn parse(input: &str, reason: impl Into<String>) -> Self {
        RecoveryError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
