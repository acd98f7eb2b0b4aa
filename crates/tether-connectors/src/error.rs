//! Typed errors for the connectors crate.

use thiserror::Error;

/// Errors reported by an external row store.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The store at `location` could not be opened.
    #[error("Can't open sqlite database {location}: {message}")]
    ConnectionFailed { location: String, message: String },

    /// The scan query could not be compiled.
    #[error("SQL error during prepare: {0}")]
    QueryFailed(String),

    /// The store reported an error while producing the next row.
    #[error("SQL error during step: {0}")]
    StepFailed(String),
}
