//! Tether Options - option catalog, validation and resolution
//!
//! This crate defines which options a foreign server or foreign table may
//! carry, validates option sets before they are committed, and resolves the
//! effective connection parameters for a foreign table at scan time.

pub mod catalog;
pub mod error;
pub mod option;
pub mod resolve;
pub mod validation;

pub use catalog::{
    CatalogDefinition, CatalogLookup, ColumnDef, ForeignServer, ForeignTable, ForeignTableId,
    InMemoryCatalog, OptionDef, ServerId,
};
pub use error::OptionsError;
pub use option::{is_valid_option, valid_option_names, OptionContext, OptionDescriptor, OptionKey, VALID_OPTIONS};
pub use resolve::{merge_options, resolve_options, ResolvedConfig};
pub use validation::validate_options;
