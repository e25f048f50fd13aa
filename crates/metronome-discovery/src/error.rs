use metronome_core::CoreError;
use metronome_runner::RunnerError;
use thiserror::Error;

/// Errors raised by the discovery backends.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// `get_jobs` was handed the uninitialized timestamp sentinel.
    #[error("Zero time")]
    ZeroTime,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected code: {got}, wanted: {want}")]
    UnexpectedStatus { got: u16, want: u16 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Time parse error: {0}")]
    TimeParse(#[from] chrono::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
