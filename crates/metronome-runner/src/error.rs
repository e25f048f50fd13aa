use thiserror::Error;

/// Errors raised while triggering a job's target action.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected code: {got}, wanted: {want}")]
    UnexpectedStatus { got: u16, want: u16 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
