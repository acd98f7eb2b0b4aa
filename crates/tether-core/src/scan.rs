//! Scan lifecycle for one foreign table scan.
//!
//! A [`ScanController`] walks a foreign table identifier through option
//! resolution, connection, lazy query preparation and row-by-row reads:
//!
//! ```text
//! Unopened --begin--> Prepared --iterate--> Streaming --iterate(end)--> Exhausted
//!     \_______________________\___________________\_____________________\--end--> Closed
//!                          Prepared/Streaming --iterate(step error)--> Failed
//! ```
//!
//! A failed scan keeps its connection and cursor but yields no more rows;
//! `rescan` restarts it from the first row and `end` releases it.
//!
//! The controller owns its connection and cursor. They are released by
//! [`ForeignScan::end`], and by `Drop` if `end` is never reached.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use tether_connectors::{Step, StoreClient, StoreConnection, StoreCursor};
use tether_options::{resolve_options, CatalogLookup, ForeignTableId, OptionKey, ResolvedConfig};

use crate::error::ScanError;
use crate::row::Row;

type CursorOf<S> = <<S as StoreClient>::Connection as StoreConnection>::Cursor;

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Unopened,
    /// Connected, query text built, nothing prepared yet.
    Prepared,
    Streaming,
    Exhausted,
    /// A step failed; only `rescan` or `end` move on from here.
    Failed,
    Closed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Unopened => "unopened",
            ScanPhase::Prepared => "prepared",
            ScanPhase::Streaming => "streaming",
            ScanPhase::Exhausted => "exhausted",
            ScanPhase::Failed => "failed",
            ScanPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Executor flags handed over by the host at scan start. Carried for logging
/// only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFlags(pub u32);

/// The four calls a host engine makes to read a foreign table.
pub trait ForeignScan {
    fn begin(&mut self, table_id: ForeignTableId, flags: ScanFlags) -> Result<(), ScanError>;

    /// Next row, or `None` once the result is exhausted (and on every call
    /// after that). After a failed step every call is rejected until
    /// `rescan` or `end`.
    fn iterate(&mut self) -> Result<Option<Row>, ScanError>;

    /// Restart the scan; the next `iterate` returns the first row again.
    fn rescan(&mut self);

    /// Release everything the scan holds. Never fails and may be repeated.
    fn end(&mut self);
}

/// The fixed scan query. The table name is inserted as given, without
/// quoting or escaping.
pub fn build_scan_query(table: &str) -> String {
    format!("SELECT * FROM {}", table)
}

/// Resources held by an active scan. The cursor is declared first so it is
/// finalized before its connection is closed.
struct ScanState<C: StoreConnection> {
    cursor: Option<C::Cursor>,
    connection: Option<C>,
    query: Option<String>,
}

impl<C: StoreConnection> ScanState<C> {
    fn empty() -> Self {
        Self {
            cursor: None,
            connection: None,
            query: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.connection.is_none() && self.query.is_none()
    }

    fn release(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            cursor.finalize();
        }
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.query = None;
    }
}

/// Drives one scan of one foreign table.
pub struct ScanController<S: StoreClient> {
    store: Arc<S>,
    catalog: Arc<dyn CatalogLookup>,
    table_id: Option<ForeignTableId>,
    phase: ScanPhase,
    state: ScanState<S::Connection>,
}

impl<S: StoreClient> fmt::Debug for ScanController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanController")
            .field("table_id", &self.table_id)
            .field("phase", &self.phase)
            .field("query", &self.state.query)
            .finish()
    }
}

impl<S: StoreClient> ScanController<S> {
    pub fn new(store: Arc<S>, catalog: Arc<dyn CatalogLookup>) -> Self {
        Self {
            store,
            catalog,
            table_id: None,
            phase: ScanPhase::Unopened,
            state: ScanState::empty(),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn table_id(&self) -> Option<ForeignTableId> {
        self.table_id
    }

    /// Query text built at `begin`, until the scan is ended.
    pub fn query(&self) -> Option<&str> {
        self.state.query.as_deref()
    }

    /// `true` once no connection, cursor or query text is held.
    pub fn is_released(&self) -> bool {
        self.state.is_empty()
    }

    fn invalid(&self, operation: &'static str) -> ScanError {
        ScanError::InvalidState {
            operation,
            phase: self.phase,
        }
    }

    /// The open cursor, preparing the query on first use. A failed prepare
    /// closes the connection and the scan.
    fn cursor(&mut self) -> Result<&mut CursorOf<S>, ScanError> {
        if self.state.cursor.is_none() {
            let phase = self.phase;
            let (Some(connection), Some(query)) =
                (self.state.connection.as_mut(), self.state.query.as_deref())
            else {
                return Err(ScanError::InvalidState {
                    operation: "iterate",
                    phase,
                });
            };

            debug!("Preparing scan query: {}", query);
            match connection.prepare(query) {
                Ok(cursor) => self.state.cursor = Some(cursor),
                Err(e) => {
                    self.state.release();
                    self.phase = ScanPhase::Closed;
                    return Err(e.into());
                }
            }
        }

        let phase = self.phase;
        self.state.cursor.as_mut().ok_or(ScanError::InvalidState {
            operation: "iterate",
            phase,
        })
    }
}

fn required(
    config: &ResolvedConfig,
    table_id: ForeignTableId,
    key: OptionKey,
) -> Result<String, ScanError> {
    config
        .get(key)
        .map(str::to_string)
        .ok_or(ScanError::IncompleteOptions {
            table_id,
            missing: key,
        })
}

impl<S: StoreClient> ForeignScan for ScanController<S> {
    fn begin(&mut self, table_id: ForeignTableId, flags: ScanFlags) -> Result<(), ScanError> {
        if self.phase != ScanPhase::Unopened {
            return Err(self.invalid("begin"));
        }
        debug!("Beginning foreign scan of table {} (flags {:#x})", table_id, flags.0);

        let config = resolve_options(self.catalog.as_ref(), table_id)?;
        let database = required(&config, table_id, OptionKey::Database)?;
        let table = required(&config, table_id, OptionKey::Table)?;

        let connection = self.store.open(&database)?;

        self.table_id = Some(table_id);
        self.state.connection = Some(connection);
        self.state.query = Some(build_scan_query(&table));
        self.phase = ScanPhase::Prepared;
        Ok(())
    }

    fn iterate(&mut self) -> Result<Option<Row>, ScanError> {
        match self.phase {
            ScanPhase::Prepared | ScanPhase::Streaming => {}
            ScanPhase::Exhausted => return Ok(None),
            ScanPhase::Unopened | ScanPhase::Failed | ScanPhase::Closed => {
                return Err(self.invalid("iterate"))
            }
        }

        let cursor = self.cursor()?;
        let step = match cursor.step() {
            Ok(step) => step,
            Err(e) => {
                debug!("Foreign scan of table {:?} failed: {}", self.table_id, e);
                self.phase = ScanPhase::Failed;
                return Err(e.into());
            }
        };
        match step {
            Step::Row => {
                let values = (0..cursor.column_count())
                    .map(|i| cursor.column_text(i))
                    .collect();
                self.phase = ScanPhase::Streaming;
                Ok(Some(Row::new(values)))
            }
            Step::Done => {
                debug!("Foreign scan of table {:?} exhausted", self.table_id);
                self.phase = ScanPhase::Exhausted;
                Ok(None)
            }
        }
    }

    fn rescan(&mut self) {
        match self.phase {
            ScanPhase::Prepared
            | ScanPhase::Streaming
            | ScanPhase::Exhausted
            | ScanPhase::Failed => {
                debug!("Rescanning foreign table {:?}", self.table_id);
                if let Some(cursor) = self.state.cursor.take() {
                    cursor.finalize();
                }
                self.phase = ScanPhase::Prepared;
            }
            ScanPhase::Unopened | ScanPhase::Closed => {}
        }
    }

    fn end(&mut self) {
        debug!("Ending foreign scan of table {:?}", self.table_id);
        self.state.release();
        self.phase = ScanPhase::Closed;
    }
}

impl<S: StoreClient> Drop for ScanController<S> {
    fn drop(&mut self) {
        if self.state.connection.is_some() {
            warn!(
                "Foreign scan of table {:?} dropped without end(), releasing its connection",
                self.table_id
            );
        }
        self.state.release();
    }
}
