//! End-to-end scans of a SQLite database file through the scan controller
//! and the DataFusion adapter.

use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray};
use rusqlite::{params, Connection};
use tempfile::TempDir;

use tether_connectors::{ConnectorError, SqliteStore};
use tether_core::{ForeignDataWrapper, ForeignScan, QueryEngine, ScanError, ScanFlags, ScanPhase};
use tether_options::{CatalogLookup, ColumnDef, ForeignTableId, InMemoryCatalog, OptionDef};

struct Fixture {
    _dir: TempDir,
    path: String,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db").to_string_lossy().into_owned();
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE events (id INTEGER, kind TEXT);
         INSERT INTO events VALUES (1, 'login'), (2, NULL), (3, 'logout');
         CREATE TABLE nums (x INTEGER);
         CREATE VIEW magnitudes AS SELECT abs(x) AS m FROM nums;",
    )
    .unwrap();
    conn.execute("INSERT INTO nums VALUES (?1)", params![1i64]).unwrap();
    conn.execute("INSERT INTO nums VALUES (?1)", params![i64::MIN]).unwrap();
    Fixture { _dir: dir, path }
}

fn catalog(path: &str, table: &str) -> (Arc<InMemoryCatalog>, ForeignTableId) {
    let mut catalog = InMemoryCatalog::new();
    catalog
        .create_server("app", vec![OptionDef::new("database", path)])
        .unwrap();
    let id = catalog
        .create_foreign_table(
            "remote",
            "app",
            vec![ColumnDef::new("id", "bigint"), ColumnDef::new("kind", "text")],
            vec![OptionDef::new("table", table)],
        )
        .unwrap();
    (Arc::new(catalog), id)
}

fn wrapper(catalog: &Arc<InMemoryCatalog>) -> ForeignDataWrapper<SqliteStore> {
    ForeignDataWrapper::new(
        Arc::new(SqliteStore::new()),
        Arc::clone(catalog) as Arc<dyn CatalogLookup>,
    )
}

#[test]
fn scan_reads_every_row_as_text() {
    let fx = fixture();
    let (catalog, id) = catalog(&fx.path, "events");
    let fdw = wrapper(&catalog);

    let mut scan = fdw.begin_scan(id, ScanFlags::default()).unwrap();
    assert_eq!(scan.query(), Some("SELECT * FROM events"));

    let mut rows = Vec::new();
    while let Some(row) = scan.iterate().unwrap() {
        rows.push(row);
    }
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 2));
    assert_eq!(rows[0].get(0), Some("1"));
    assert_eq!(rows[0].get(1), Some("login"));
    assert_eq!(rows[1].get(1), None);
    assert_eq!(rows[2].get(1), Some("logout"));

    assert_eq!(scan.iterate().unwrap(), None);
    scan.end();
    assert!(scan.is_released());
}

#[test]
fn scan_of_missing_table_fails_at_first_iterate() {
    let fx = fixture();
    let (catalog, id) = catalog(&fx.path, "audit");
    let fdw = wrapper(&catalog);

    let mut scan = fdw.begin_scan(id, ScanFlags::default()).unwrap();
    let err = scan.iterate().unwrap_err();
    match err {
        ScanError::Store(ConnectorError::QueryFailed(message)) => {
            assert!(message.contains("no such table"), "{}", message)
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(scan.phase(), ScanPhase::Closed);
    scan.end();
}

#[test]
fn step_error_surfaces_after_earlier_rows() {
    let fx = fixture();
    let (catalog, id) = catalog(&fx.path, "magnitudes");
    let fdw = wrapper(&catalog);

    let mut scan = fdw.begin_scan(id, ScanFlags::default()).unwrap();
    let first = scan.iterate().unwrap().unwrap();
    assert_eq!(first.get(0), Some("1"));

    let err = scan.iterate().unwrap_err();
    assert!(matches!(err, ScanError::Store(ConnectorError::StepFailed(_))));
    assert!(err.to_string().starts_with("SQL error during step"));
    assert_eq!(scan.phase(), ScanPhase::Failed);

    for _ in 0..3 {
        match scan.iterate() {
            Ok(Some(row)) => panic!("row replayed after step error: {:?}", row),
            Ok(None) => panic!("failed scan reported as exhausted"),
            Err(e) => assert!(matches!(e, ScanError::InvalidState { .. }), "{}", e),
        }
    }

    scan.end();
    scan.end();
    assert!(scan.is_released());
}

#[test]
fn rescan_after_step_error_reads_from_first_row() {
    let fx = fixture();
    let (catalog, id) = catalog(&fx.path, "magnitudes");
    let fdw = wrapper(&catalog);

    let mut scan = fdw.begin_scan(id, ScanFlags::default()).unwrap();
    scan.iterate().unwrap();
    scan.iterate().unwrap_err();

    scan.rescan();
    assert_eq!(scan.phase(), ScanPhase::Prepared);
    assert_eq!(scan.iterate().unwrap().unwrap().get(0), Some("1"));
    assert!(matches!(
        scan.iterate().unwrap_err(),
        ScanError::Store(ConnectorError::StepFailed(_))
    ));
    scan.end();
}

#[test]
fn open_failure_reports_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("app.db");
    let (catalog, id) = catalog(&path.to_string_lossy(), "events");
    let fdw = wrapper(&catalog);

    let err = fdw.begin_scan(id, ScanFlags::default()).unwrap_err();
    assert!(err.to_string().starts_with("Can't open sqlite database"));
}

#[test]
fn rescan_restarts_sqlite_cursor() {
    let fx = fixture();
    let (catalog, id) = catalog(&fx.path, "events");
    let fdw = wrapper(&catalog);

    let mut scan = fdw.begin_scan(id, ScanFlags::default()).unwrap();
    scan.iterate().unwrap();
    scan.iterate().unwrap();
    scan.rescan();
    assert_eq!(scan.iterate().unwrap().unwrap().get(0), Some("1"));
    scan.end();
}

#[tokio::test]
async fn datafusion_query_over_sqlite() {
    let fx = fixture();
    let (catalog, _) = catalog(&fx.path, "events");
    let fdw = Arc::new(wrapper(&catalog));

    let engine = QueryEngine::with_batch_size(2);
    engine.register_catalog(fdw, &catalog).unwrap();

    let batches = engine
        .collect("SELECT id, kind FROM remote WHERE id <> 2 ORDER BY id DESC")
        .await
        .unwrap();
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 2);
    let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(ids.value(0), 3);
    assert_eq!(ids.value(1), 1);
    let kinds = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(kinds.value(0), "logout");

    let batches = engine
        .collect("SELECT kind FROM remote WHERE kind IS NULL")
        .await
        .unwrap();
    let nulls: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(nulls, 1);
    assert!(batches.iter().all(|b| b.column(0).null_count() == b.num_rows()));
}
