//! Option validation, run before a server or table option set is committed.

use std::collections::HashSet;

use tracing::debug;

use crate::catalog::OptionDef;
use crate::error::OptionsError;
use crate::option::{is_valid_option, valid_option_names, OptionContext, OptionKey};

/// Check that every option is legal in `context` and that no recognized key
/// appears twice. Stops at the first offending entry.
pub fn validate_options(options: &[OptionDef], context: OptionContext) -> Result<(), OptionsError> {
    debug!("Validating {} option(s) for {}", options.len(), context);

    let mut seen: HashSet<OptionKey> = HashSet::new();

    for def in options {
        if !is_valid_option(&def.name, context) {
            return Err(OptionsError::InvalidOptionName {
                name: def.name.clone(),
                context,
                valid: valid_option_names(context),
            });
        }

        if let Some(key) = OptionKey::from_name(&def.name) {
            if !seen.insert(key) {
                return Err(OptionsError::DuplicateOption {
                    name: def.name.clone(),
                    value: def.value.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(name: &str, value: &str) -> OptionDef {
        OptionDef::new(name, value)
    }

    #[test]
    fn test_valid_server_options() {
        let options = vec![opt("database", "/tmp/app.db")];
        assert!(validate_options(&options, OptionContext::Server).is_ok());
    }

    #[test]
    fn test_valid_table_options() {
        let options = vec![opt("table", "events")];
        assert!(validate_options(&options, OptionContext::Table).is_ok());
    }

    #[test]
    fn test_empty_option_list() {
        assert!(validate_options(&[], OptionContext::Server).is_ok());
        assert!(validate_options(&[], OptionContext::Table).is_ok());
    }

    #[test]
    fn test_unknown_option() {
        let options = vec![opt("host", "localhost")];
        let err = validate_options(&options, OptionContext::Server).unwrap_err();
        match &err {
            OptionsError::InvalidOptionName { name, valid, .. } => {
                assert_eq!(name, "host");
                assert_eq!(valid, &vec!["database"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.hint().as_deref(),
            Some("Valid options in this context are: database")
        );
    }

    #[test]
    fn test_option_in_wrong_context() {
        let options = vec![opt("table", "events")];
        let err = validate_options(&options, OptionContext::Server).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidOptionName { ref name, .. } if name == "table"));

        let options = vec![opt("database", "/tmp/app.db")];
        let err = validate_options(&options, OptionContext::Table).unwrap_err();
        assert_eq!(
            err.hint().as_deref(),
            Some("Valid options in this context are: table")
        );
    }

    #[test]
    fn test_duplicate_option_with_different_values() {
        let options = vec![opt("table", "events"), opt("table", "audit")];
        let err = validate_options(&options, OptionContext::Table).unwrap_err();
        match err {
            OptionsError::DuplicateOption { name, value } => {
                assert_eq!(name, "table");
                assert_eq!(value, "audit");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_option_with_equal_values() {
        let options = vec![opt("database", "/tmp/app.db"), opt("database", "/tmp/app.db")];
        let err = validate_options(&options, OptionContext::Server).unwrap_err();
        assert!(matches!(err, OptionsError::DuplicateOption { .. }));
        assert_eq!(err.to_string(), "redundant options: database (/tmp/app.db)");
    }

    #[test]
    fn test_first_offending_entry_wins() {
        let options = vec![opt("table", "a"), opt("bogus", "x"), opt("table", "b")];
        let err = validate_options(&options, OptionContext::Table).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidOptionName { ref name, .. } if name == "bogus"));

        let options = vec![opt("table", "a"), opt("table", "b"), opt("bogus", "x")];
        let err = validate_options(&options, OptionContext::Table).unwrap_err();
        assert!(matches!(err, OptionsError::DuplicateOption { .. }));
    }
}
