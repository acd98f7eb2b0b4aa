//! In-memory store client.
//!
//! Holds named databases of text tables and answers `SELECT * FROM <table>`
//! queries. Live connections and cursors are counted so callers can check
//! that every handle a scan acquired was released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::ConnectorError;
use crate::{Step, StoreClient, StoreConnection, StoreCursor};

/// Rows of text values, NULL as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    pub rows: Vec<Vec<Option<String>>>,
    /// Stepping onto this row index fails with the given message.
    pub failure: Option<(usize, String)>,
}

impl MemoryTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            rows,
            failure: None,
        }
    }

    /// Fail the step that would reach row `index`.
    pub fn failing_at(mut self, index: usize, message: &str) -> Self {
        self.failure = Some((index, message.to_string()));
        self
    }

    /// Build from non-null string rows.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
            failure: None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicUsize,
    cursors: AtomicUsize,
    opened: AtomicUsize,
}

/// A store whose databases live in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: Arc<HashMap<String, HashMap<String, Arc<MemoryTable>>>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `table` to database `location`, creating the database if needed.
    /// Must be called before the store is shared.
    pub fn with_table(mut self, location: &str, name: &str, table: MemoryTable) -> Self {
        let databases = Arc::make_mut(&mut self.databases);
        databases
            .entry(location.to_string())
            .or_default()
            .insert(name.to_string(), Arc::new(table));
        self
    }

    /// Connections currently open.
    pub fn open_connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Cursors not yet finalized.
    pub fn open_cursors(&self) -> usize {
        self.counters.cursors.load(Ordering::SeqCst)
    }

    /// Connections opened over the store's lifetime.
    pub fn total_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }
}

impl StoreClient for MemoryStore {
    type Connection = MemoryConnection;

    fn open(&self, location: &str) -> Result<MemoryConnection, ConnectorError> {
        let tables = self.databases.get(location).cloned().ok_or_else(|| {
            ConnectorError::ConnectionFailed {
                location: location.to_string(),
                message: "no such database".to_string(),
            }
        })?;

        self.counters.connections.fetch_add(1, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Opened memory database {}", location);

        Ok(MemoryConnection {
            tables,
            counters: Arc::clone(&self.counters),
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    tables: HashMap<String, Arc<MemoryTable>>,
    counters: Arc<Counters>,
}

impl StoreConnection for MemoryConnection {
    type Cursor = MemoryCursor;

    fn prepare(&mut self, query: &str) -> Result<MemoryCursor, ConnectorError> {
        let name = query
            .strip_prefix("SELECT * FROM ")
            .ok_or_else(|| ConnectorError::QueryFailed(format!("unsupported query: {}", query)))?;

        let table = self
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectorError::QueryFailed(format!("no such table: {}", name)))?;

        self.counters.cursors.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryCursor {
            table,
            position: None,
            counters: Arc::clone(&self.counters),
        })
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.counters.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    table: Arc<MemoryTable>,
    /// Index of the current row; `None` before the first step.
    position: Option<usize>,
    counters: Arc<Counters>,
}

impl MemoryCursor {
    fn current(&self) -> Option<&Vec<Option<String>>> {
        self.position.and_then(|i| self.table.rows.get(i))
    }
}

impl StoreCursor for MemoryCursor {
    fn step(&mut self) -> Result<Step, ConnectorError> {
        let next = self.position.map_or(0, |i| (i + 1).min(self.table.rows.len()));
        if let Some((index, message)) = &self.table.failure {
            if next == *index {
                // The statement resets after a failed step.
                self.position = None;
                return Err(ConnectorError::StepFailed(message.clone()));
            }
        }
        self.position = Some(next);
        if next < self.table.rows.len() {
            Ok(Step::Row)
        } else {
            Ok(Step::Done)
        }
    }

    fn column_count(&self) -> usize {
        self.current().map_or(0, Vec::len)
    }

    fn column_text(&self, index: usize) -> Option<String> {
        self.current().and_then(|row| row.get(index).cloned().flatten())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.counters.cursors.fetch_sub(1, Ordering::SeqCst);
    }
}
