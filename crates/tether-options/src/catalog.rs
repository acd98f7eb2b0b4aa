//! Foreign server and foreign table metadata.
//!
//! [`CatalogLookup`] is the read side the option resolver consumes.
//! [`InMemoryCatalog`] is a small catalog store whose DDL methods run
//! [`validate_options`] before anything is committed, so every option set it
//! hands back has already passed validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OptionsError;
use crate::option::OptionContext;
use crate::validation::validate_options;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(pub u32);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignTableId(pub u32);

impl fmt::Display for ForeignTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw `name 'value'` option entry. Lists of these keep duplicates so the
/// validator can reject them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDef {
    pub name: String,
    pub value: String,
}

impl OptionDef {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A declared column of a foreign table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// SQL type name, e.g. `integer` or `text`.
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignServer {
    pub id: ServerId,
    pub name: String,
    pub options: Vec<OptionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignTable {
    pub id: ForeignTableId,
    pub name: String,
    pub server: ServerId,
    pub columns: Vec<ColumnDef>,
    pub options: Vec<OptionDef>,
}

/// Read access to catalog metadata, keyed by object identifier.
pub trait CatalogLookup: Send + Sync {
    fn foreign_table(&self, id: ForeignTableId) -> Result<ForeignTable, OptionsError>;

    fn foreign_server(&self, id: ServerId) -> Result<ForeignServer, OptionsError>;
}

/// Catalog store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    servers: Vec<ForeignServer>,
    tables: Vec<ForeignTable>,
}

/// Identifier for the object created after `existing` others; ids start at 1.
fn next_id(kind: &'static str, existing: usize) -> Result<u32, OptionsError> {
    existing
        .checked_add(1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(OptionsError::IdentifiersExhausted { kind })
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `CREATE SERVER name OPTIONS (...)`
    pub fn create_server(
        &mut self,
        name: &str,
        options: Vec<OptionDef>,
    ) -> Result<ServerId, OptionsError> {
        validate_options(&options, OptionContext::Server)?;
        if self.server_id(name).is_some() {
            return Err(OptionsError::DuplicateObject {
                kind: "server",
                name: name.to_string(),
            });
        }

        let id = ServerId(next_id("server", self.servers.len())?);
        self.servers.push(ForeignServer {
            id,
            name: name.to_string(),
            options,
        });
        info!("Created foreign server '{}' ({})", name, id);
        Ok(id)
    }

    /// `CREATE FOREIGN TABLE name (columns) SERVER server OPTIONS (...)`
    pub fn create_foreign_table(
        &mut self,
        name: &str,
        server: &str,
        columns: Vec<ColumnDef>,
        options: Vec<OptionDef>,
    ) -> Result<ForeignTableId, OptionsError> {
        validate_options(&options, OptionContext::Table)?;
        let server = self
            .server_id(server)
            .ok_or_else(|| OptionsError::UnknownServerName(server.to_string()))?;
        if self.table_id(name).is_some() {
            return Err(OptionsError::DuplicateObject {
                kind: "foreign table",
                name: name.to_string(),
            });
        }

        let id = ForeignTableId(next_id("foreign table", self.tables.len())?);
        self.tables.push(ForeignTable {
            id,
            name: name.to_string(),
            server,
            columns,
            options,
        });
        info!("Created foreign table '{}' ({}) on server {}", name, id, server);
        Ok(id)
    }

    /// `ALTER SERVER ... OPTIONS (...)`; replaces the whole option set.
    pub fn alter_server_options(
        &mut self,
        id: ServerId,
        options: Vec<OptionDef>,
    ) -> Result<(), OptionsError> {
        validate_options(&options, OptionContext::Server)?;
        let server = self
            .servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(OptionsError::UnknownServer(id))?;
        server.options = options;
        info!("Altered options of foreign server '{}'", server.name);
        Ok(())
    }

    /// `ALTER FOREIGN TABLE ... OPTIONS (...)`; replaces the whole option set.
    pub fn alter_table_options(
        &mut self,
        id: ForeignTableId,
        options: Vec<OptionDef>,
    ) -> Result<(), OptionsError> {
        validate_options(&options, OptionContext::Table)?;
        let table = self
            .tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(OptionsError::UnknownForeignTable(id))?;
        table.options = options;
        info!("Altered options of foreign table '{}'", table.name);
        Ok(())
    }

    pub fn server_id(&self, name: &str) -> Option<ServerId> {
        self.servers.iter().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn table_id(&self, name: &str) -> Option<ForeignTableId> {
        self.tables.iter().find(|t| t.name == name).map(|t| t.id)
    }

    pub fn servers(&self) -> &[ForeignServer] {
        &self.servers
    }

    pub fn tables(&self) -> &[ForeignTable] {
        &self.tables
    }

    /// Replay a definition through the DDL methods, servers first.
    pub fn from_definition(definition: CatalogDefinition) -> Result<Self, OptionsError> {
        let mut catalog = Self::new();
        for server in definition.servers {
            catalog.create_server(&server.name, server.options)?;
        }
        for table in definition.tables {
            catalog.create_foreign_table(&table.name, &table.server, table.columns, table.options)?;
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let definition: CatalogDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn foreign_table(&self, id: ForeignTableId) -> Result<ForeignTable, OptionsError> {
        self.tables
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(OptionsError::UnknownForeignTable(id))
    }

    fn foreign_server(&self, id: ServerId) -> Result<ForeignServer, OptionsError> {
        self.servers
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(OptionsError::UnknownServer(id))
    }
}

// ---------------------------------------------------------------------------
// Serialized definition
// ---------------------------------------------------------------------------

/// A catalog as written in a JSON definition file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default)]
    pub servers: Vec<ServerDefinition>,
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub name: String,
    #[serde(default)]
    pub options: Vec<OptionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub server: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub options: Vec<OptionDef>,
}
