//! Option resolution: turns a foreign table identifier into the connection
//! parameters a scan needs.

use tracing::debug;

use crate::catalog::{CatalogLookup, ForeignTableId, OptionDef};
use crate::error::OptionsError;
use crate::option::OptionKey;

/// Connection parameters merged from table and server options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub database: Option<String>,
    pub table: Option<String>,
}

impl ResolvedConfig {
    pub fn get(&self, key: OptionKey) -> Option<&str> {
        match key {
            OptionKey::Database => self.database.as_deref(),
            OptionKey::Table => self.table.as_deref(),
        }
    }
}

/// Evaluate options in order; a later entry overwrites an earlier one with
/// the same key. Unrecognized keys are skipped.
pub fn merge_options<'a, I>(options: I) -> ResolvedConfig
where
    I: IntoIterator<Item = &'a OptionDef>,
{
    let mut config = ResolvedConfig::default();
    for def in options {
        match OptionKey::from_name(&def.name) {
            Some(OptionKey::Database) => config.database = Some(def.value.clone()),
            Some(OptionKey::Table) => config.table = Some(def.value.clone()),
            None => {}
        }
    }
    config
}

/// Resolve the options of `table_id`: table options first, then the owning
/// server's options, so server values win on collision.
///
/// Only fails when neither `database` nor `table` is set. A config with just
/// one of them resolves successfully.
pub fn resolve_options(
    catalog: &dyn CatalogLookup,
    table_id: ForeignTableId,
) -> Result<ResolvedConfig, OptionsError> {
    let table = catalog.foreign_table(table_id)?;
    let server = catalog.foreign_server(table.server)?;

    debug!(
        "Resolving options for foreign table '{}' on server '{}'",
        table.name, server.name
    );

    let config = merge_options(table.options.iter().chain(server.options.iter()));

    // TODO: reject configs where only one of the two is present once callers
    // stop relying on partially configured tables resolving.
    if config.database.is_none() && config.table.is_none() {
        return Err(OptionsError::MissingOptions);
    }

    Ok(config)
}
