//! Typed errors for the scan lifecycle.

use thiserror::Error;

use tether_connectors::ConnectorError;
use tether_options::{ForeignTableId, OptionKey, OptionsError};

use crate::scan::ScanPhase;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Store(#[from] ConnectorError),

    /// Resolution succeeded but left one of the two required values unset.
    #[error("foreign table {table_id} has no \"{missing}\" option")]
    IncompleteOptions {
        table_id: ForeignTableId,
        missing: OptionKey,
    },

    #[error("cannot {operation} a scan that is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: ScanPhase,
    },
}

impl ScanError {
    /// Hint text to show with the message, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            ScanError::Options(e) => e.hint(),
            _ => None,
        }
    }
}
