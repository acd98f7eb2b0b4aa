//! SQLite store client.
//!
//! A connection is a shared `rusqlite::Connection`; a cursor owns a clone of
//! it together with the prepared statement and the live result rows. Dropping
//! the cursor resets and finalizes the statement, and the database closes once
//! both the cursor and the connection are gone.

use std::fmt;
use std::rc::Rc;

use ouroboros::self_referencing;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Rows, Statement};
use tracing::debug;

use crate::error::ConnectorError;
use crate::{Step, StoreClient, StoreConnection, StoreCursor};

/// Opens SQLite database files, one connection per call.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore {
    flags: OpenFlags,
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteStore {
    /// Read-write, creating the file if it does not exist.
    pub fn new() -> Self {
        Self {
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// Read-only; opening a missing file fails.
    pub fn read_only() -> Self {
        Self {
            flags: OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    pub fn with_flags(flags: OpenFlags) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }
}

impl StoreClient for SqliteStore {
    type Connection = SqliteConnection;

    fn open(&self, location: &str) -> Result<SqliteConnection, ConnectorError> {
        let connection = Connection::open_with_flags(location, self.flags).map_err(|e| {
            ConnectorError::ConnectionFailed {
                location: location.to_string(),
                message: store_message(e),
            }
        })?;

        debug!("Opened sqlite database {}", location);
        Ok(SqliteConnection {
            connection: Rc::new(connection),
            location: location.to_string(),
        })
    }
}

/// The text SQLite reported, without rusqlite's decoration.
fn store_message(error: rusqlite::Error) -> String {
    match error {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message,
        rusqlite::Error::SqlInputError { msg, .. } => msg,
        other => other.to_string(),
    }
}

/// An open SQLite database.
pub struct SqliteConnection {
    connection: Rc<Connection>,
    location: String,
}

impl SqliteConnection {
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("location", &self.location)
            .finish()
    }
}

impl StoreConnection for SqliteConnection {
    type Cursor = SqliteCursor;

    fn prepare(&mut self, query: &str) -> Result<SqliteCursor, ConnectorError> {
        if query.trim().is_empty() {
            return Err(ConnectorError::QueryFailed("query contains no statement".to_string()));
        }

        let live = LiveQuery::try_new(
            Rc::clone(&self.connection),
            |connection| connection.prepare(query),
            |statement| Ok(statement.raw_query()),
        )
        .map_err(|e| ConnectorError::QueryFailed(store_message(e)))?;

        debug!("Prepared query on {}: {}", self.location, query);
        Ok(SqliteCursor {
            live,
            current: Vec::new(),
            state: CursorState::Open,
        })
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        debug!("Closed sqlite database {}", self.location);
    }
}

#[self_referencing]
struct LiveQuery {
    connection: Rc<Connection>,
    #[borrows(connection)]
    #[not_covariant]
    statement: Statement<'this>,
    #[borrows(mut statement)]
    #[not_covariant]
    rows: Rows<'this>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    Open,
    Done,
    /// Holds the store's message; every later step repeats it.
    Failed(String),
}

/// A prepared SQLite statement being stepped through.
pub struct SqliteCursor {
    live: LiveQuery,
    current: Vec<Option<String>>,
    state: CursorState,
}

impl fmt::Debug for SqliteCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCursor")
            .field("state", &self.state)
            .field("columns", &self.current.len())
            .finish()
    }
}

impl StoreCursor for SqliteCursor {
    fn step(&mut self) -> Result<Step, ConnectorError> {
        // A finished or failed statement is never stepped again; SQLite would
        // reset it and replay rows.
        match &self.state {
            CursorState::Open => {}
            CursorState::Done => return Ok(Step::Done),
            CursorState::Failed(message) => return Err(ConnectorError::StepFailed(message.clone())),
        }

        let next = self.live.with_rows_mut(|rows| match rows.next()? {
            Some(row) => {
                let statement: &Statement<'_> = row.as_ref();
                (0..statement.column_count())
                    .map(|i| row.get_ref(i).map(value_text))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(Some)
            }
            None => Ok(None),
        });

        match next {
            Ok(Some(values)) => {
                self.current = values;
                Ok(Step::Row)
            }
            Ok(None) => {
                self.current.clear();
                self.state = CursorState::Done;
                Ok(Step::Done)
            }
            Err(e) => {
                let message = store_message(e);
                self.current.clear();
                self.state = CursorState::Failed(message.clone());
                Err(ConnectorError::StepFailed(message))
            }
        }
    }

    fn column_count(&self) -> usize {
        self.current.len()
    }

    fn column_text(&self, index: usize) -> Option<String> {
        self.current.get(index).cloned().flatten()
    }
}

/// Render a column value the way SQLite's text conversion would.
fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(format!("{:?}", f)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
