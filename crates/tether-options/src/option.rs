//! Registry of the option keys a foreign server or foreign table may carry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of catalog object an option is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionContext {
    /// `CREATE SERVER ... OPTIONS (...)`
    Server,
    /// `CREATE FOREIGN TABLE ... OPTIONS (...)`
    Table,
}

impl fmt::Display for OptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionContext::Server => write!(f, "foreign server"),
            OptionContext::Table => write!(f, "foreign table"),
        }
    }
}

/// Option keys understood by the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    /// Address of the external store (a filesystem path for SQLite).
    Database,
    /// Name of the table to read, substituted verbatim into the scan query.
    Table,
}

impl OptionKey {
    pub const ALL: [OptionKey; 2] = [OptionKey::Database, OptionKey::Table];

    pub const fn name(self) -> &'static str {
        match self {
            OptionKey::Database => "database",
            OptionKey::Table => "table",
        }
    }

    /// The only context this key may appear in.
    pub const fn context(self) -> OptionContext {
        match self {
            OptionKey::Database => OptionContext::Server,
            OptionKey::Table => OptionContext::Table,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One registered (name, context) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub context: OptionContext,
}

impl OptionDescriptor {
    pub const fn of(key: OptionKey) -> Self {
        Self {
            name: key.name(),
            context: key.context(),
        }
    }
}

/// Every valid option, in registration order. Hint text lists names in this
/// order.
pub const VALID_OPTIONS: &[OptionDescriptor] = &[
    // Connection options
    OptionDescriptor::of(OptionKey::Database),
    // Table options
    OptionDescriptor::of(OptionKey::Table),
];

/// Returns `true` if `name` is a registered option for `context`.
pub fn is_valid_option(name: &str, context: OptionContext) -> bool {
    VALID_OPTIONS
        .iter()
        .any(|opt| opt.context == context && opt.name == name)
}

/// Names of the options legal in `context`, in registration order.
pub fn valid_option_names(context: OptionContext) -> Vec<&'static str> {
    VALID_OPTIONS
        .iter()
        .filter(|opt| opt.context == context)
        .map(|opt| opt.name)
        .collect()
}
