//! Tether Connectors - external row store clients
//!
//! This crate provides the narrow, synchronous client contract the scan
//! controller drives, plus its implementations:
//! - SQLite (native library, one connection per scan)
//! - In-memory tables

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::ConnectorError;
pub use memory::{MemoryStore, MemoryTable};
pub use sqlite::{SqliteConnection, SqliteCursor, SqliteStore};

/// Outcome of advancing a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A row is available through the column accessors.
    Row,
    /// The result set is exhausted.
    Done,
}

/// Opens connections to an external row store.
///
/// Every call blocks until the store answers. Connections and cursors stay on
/// the thread that opened them.
pub trait StoreClient: Send + Sync {
    type Connection: StoreConnection;

    /// Open a connection to the store at `location`. A failed open leaves
    /// nothing behind for the caller to release.
    fn open(&self, location: &str) -> Result<Self::Connection, ConnectorError>;
}

/// An open connection. Dropping it closes the connection.
pub trait StoreConnection {
    type Cursor: StoreCursor;

    /// Compile `query` into a cursor positioned before the first row.
    fn prepare(&mut self, query: &str) -> Result<Self::Cursor, ConnectorError>;

    /// Close the connection. Equivalent to dropping it.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// A live position in a query result. Dropping it finalizes the cursor.
pub trait StoreCursor {
    fn step(&mut self) -> Result<Step, ConnectorError>;

    /// Number of columns in the current row.
    fn column_count(&self) -> usize;

    /// Text of column `index` in the current row; `None` for SQL NULL.
    fn column_text(&self, index: usize) -> Option<String>;

    /// Finalize the cursor. Equivalent to dropping it.
    fn finalize(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
