use thiserror::Error;

use crate::provider::ProviderError;

/// Main error type for SixDegrees
///
/// Non-fatal search results (unresolved names, no path, exhausted budget) are
/// not errors; see [`crate::connection::ConnectionOutcome`].
#[derive(Error, Debug)]
pub enum SixDegreesError {
    /// The metadata provider could not be reached, timed out, or rate-limited us
    #[error("Metadata provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Broken internal invariant (missing edge on an assembled path, panicked task)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SixDegreesError {
    /// True when retrying the same query later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SixDegreesError::ProviderUnavailable(_))
    }
}

/// Convenient Result type using SixDegreesError
pub type Result<T> = std::result::Result<T, SixDegreesError>;
