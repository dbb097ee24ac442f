//! Error types for the cursor observer.

use thiserror::Error;

/// Main error type for observer operations.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// The supplied source exposes neither push observation nor enumeration,
    /// or lacks the capability the configured mode requires.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Observer has been destroyed")]
    Destroyed,
}

/// Result type for observer operations.
pub type Result<T> = std::result::Result<T, ObserverError>;
