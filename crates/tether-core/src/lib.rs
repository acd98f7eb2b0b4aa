//! Tether Core - foreign table scans and the DataFusion host adapter
//!
//! This crate drives the scan lifecycle of a foreign table against an
//! external row store and exposes foreign tables to DataFusion queries.

pub mod engine;
pub mod error;
pub mod planner;
pub mod row;
pub mod scan;
pub mod table;
pub mod tuple;
pub mod wrapper;

pub use engine::QueryEngine;
pub use error::ScanError;
pub use planner::{PathCost, RelSize, ScanClauses};
pub use row::Row;
pub use scan::{build_scan_query, ForeignScan, ScanController, ScanFlags, ScanPhase};
pub use table::{register_foreign_tables, ForeignScanExec, ForeignTableProvider, DEFAULT_BATCH_SIZE};
pub use tuple::{declared_type_to_arrow, rows_to_record_batch, schema_from_columns, TupleError};
pub use wrapper::ForeignDataWrapper;
