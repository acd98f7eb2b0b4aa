//! Typed errors for option validation, resolution and catalog DDL.

use thiserror::Error;

use crate::catalog::{ForeignTableId, ServerId};
use crate::option::OptionContext;

#[derive(Debug, Error)]
pub enum OptionsError {
    /// Key is not registered for the context it was supplied in.
    #[error("invalid option \"{name}\"")]
    InvalidOptionName {
        name: String,
        context: OptionContext,
        valid: Vec<&'static str>,
    },

    #[error("redundant options: {name} ({value})")]
    DuplicateOption { name: String, value: String },

    #[error("a database and a table must be specified")]
    MissingOptions,

    #[error("foreign table {0} does not exist")]
    UnknownForeignTable(ForeignTableId),

    #[error("foreign server {0} does not exist")]
    UnknownServer(ServerId),

    #[error("server \"{0}\" does not exist")]
    UnknownServerName(String),

    #[error("{kind} \"{name}\" already exists")]
    DuplicateObject { kind: &'static str, name: String },

    #[error("no {kind} identifiers left")]
    IdentifiersExhausted { kind: &'static str },

    #[error("invalid catalog definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}

impl OptionsError {
    /// Hint shown alongside the message, if the error carries one.
    pub fn hint(&self) -> Option<String> {
        match self {
            OptionsError::InvalidOptionName { valid, .. } => {
                let names = if valid.is_empty() {
                    "<none>".to_string()
                } else {
                    valid.join(", ")
                };
                Some(format!("Valid options in this context are: {}", names))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_hint_lists_names() {
        let err = OptionsError::InvalidOptionName {
            name: "host".to_string(),
            context: OptionContext::Server,
            valid: vec!["database"],
        };
        assert_eq!(err.to_string(), "invalid option \"host\"");
        assert_eq!(
            err.hint().as_deref(),
            Some("Valid options in this context are: database")
        );
    }

    #[test]
    fn test_invalid_option_hint_placeholder() {
        let err = OptionsError::InvalidOptionName {
            name: "host".to_string(),
            context: OptionContext::Server,
            valid: vec![],
        };
        assert_eq!(
            err.hint().as_deref(),
            Some("Valid options in this context are: <none>")
        );
    }

    #[test]
    fn test_duplicate_option_display() {
        let err = OptionsError::DuplicateOption {
            name: "table".to_string(),
            value: "events".to_string(),
        };
        assert_eq!(err.to_string(), "redundant options: table (events)");
        assert!(err.hint().is_none());
    }
}
