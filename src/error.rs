//! Error types for auction jobs

use thiserror::Error;

/// Errors that can occur while loading, encoding or running an auction job
///
/// Running out of rounds is not an error; see
/// [`ConvergenceStatus::BudgetExceeded`](crate::bsp::ConvergenceStatus).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An input record is missing fields or has an invalid role/edge shape
    #[error("Record parse error: {0}")]
    RecordParse(String),
    /// Node state, message or checkpoint bytes are corrupt
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub fn record(msg: impl Into<String>) -> Self {
        Self::RecordParse(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// A specialized Result type for auction operations
pub type Result<T> = std::result::Result<T, Error>;
