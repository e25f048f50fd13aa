use thiserror::Error;

/// Errors raised by the core data model and recurrence engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The job carries a frequency code outside the known 1–7 range.
    #[error("Invalid frequency number: {0}")]
    InvalidFrequency(i32),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
