//! Error types for the medkit_core library.
//!
//! Expected domain outcomes (a missing record, a medicine with no stock
//! left) are not errors: repositories return `None` or `false` for them.
//! Only validation failures and store problems travel through [`Error`].

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medkit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The data directory could not be created, opened or locked
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A field failed a schema constraint
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique index rejected the write
    #[error("Duplicate value for unique field: {0}")]
    DuplicateName(String),

    /// The auth gate rejected the call
    #[error("Unauthorized")]
    Unauthorized,

    /// Raised by the request layer when an absent result fails a command
    #[error("{0}")]
    NotFound(String),
}
