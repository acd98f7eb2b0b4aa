//! Tether CLI - validate foreign table catalogs and scan SQLite through them

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_connectors::SqliteStore;
use tether_core::{ForeignDataWrapper, ForeignScan, QueryEngine, ScanError, ScanFlags};
use tether_options::{CatalogLookup, InMemoryCatalog, OptionsError};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Read SQLite tables as foreign tables")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Open databases read-only (overrides TETHER_READ_ONLY)
    #[arg(long, global = true)]
    read_only: bool,

    /// Rows per batch for queries (overrides TETHER_BATCH_SIZE)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a catalog definition file
    Validate {
        /// Path to the catalog JSON file
        catalog: PathBuf,
    },

    /// Scan one foreign table and print its rows
    Scan {
        /// Path to the catalog JSON file
        catalog: PathBuf,

        /// Foreign table name
        table: String,
    },

    /// Run a SQL query over every foreign table in the catalog
    Query {
        /// Path to the catalog JSON file
        catalog: PathBuf,

        /// SQL text
        sql: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CliConfig::from_env()?.with_overrides(cli.batch_size, cli.read_only);

    match cli.command {
        Commands::Validate { catalog } => {
            validate_catalog_file(&catalog)?;
        }
        Commands::Scan { catalog, table } => {
            scan_table(&catalog, &table, &config)?;
        }
        Commands::Query { catalog, sql } => {
            run_query(&catalog, &sql, &config).await?;
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    info!("Loading catalog from {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {:?}", path))?;
    InMemoryCatalog::from_json(&content).map_err(|e| {
        report_options_error(&e);
        anyhow::Error::new(e).context(format!("Catalog {:?} was rejected", path))
    })
}

fn report_options_error(error: &OptionsError) {
    eprintln!("Validation error: {}", error);
    if let Some(hint) = error.hint() {
        eprintln!("  Hint: {}", hint);
    }
}

fn report_scan_error(error: &ScanError) {
    eprintln!("Scan error: {}", error);
    if let Some(hint) = error.hint() {
        eprintln!("  Hint: {}", hint);
    }
}

fn store_for(config: &CliConfig) -> SqliteStore {
    if config.read_only {
        SqliteStore::read_only()
    } else {
        SqliteStore::new()
    }
}

fn validate_catalog_file(path: &Path) -> Result<()> {
    let catalog = load_catalog(path)?;

    println!("Catalog is valid!");
    println!("  Servers: {}", catalog.servers().len());
    for server in catalog.servers() {
        println!("    {} ({} option(s))", server.name, server.options.len());
    }
    println!("  Foreign tables: {}", catalog.tables().len());
    for table in catalog.tables() {
        println!(
            "    {} ({} column(s), {} option(s))",
            table.name,
            table.columns.len(),
            table.options.len()
        );
    }
    Ok(())
}

fn scan_table(path: &Path, table: &str, config: &CliConfig) -> Result<()> {
    let catalog = load_catalog(path)?;
    let table_id = catalog
        .table_id(table)
        .with_context(|| format!("No foreign table named '{}' in {:?}", table, path))?;

    let catalog: Arc<dyn CatalogLookup> = Arc::new(catalog);
    let fdw = ForeignDataWrapper::new(Arc::new(store_for(config)), catalog);

    let mut scan = fdw
        .begin_scan(table_id, ScanFlags::default())
        .inspect_err(report_scan_error)?;
    if let Some(query) = scan.query() {
        println!("-- {}", query);
    }

    let mut count = 0usize;
    loop {
        match scan.iterate() {
            Ok(Some(row)) => {
                let line = row
                    .values()
                    .iter()
                    .map(|v| v.as_deref().unwrap_or("NULL"))
                    .collect::<Vec<_>>()
                    .join("\t");
                println!("{}", line);
                count += 1;
            }
            Ok(None) => break,
            Err(e) => {
                report_scan_error(&e);
                scan.end();
                return Err(e.into());
            }
        }
    }
    scan.end();

    info!("Scanned {} row(s) from '{}'", count, table);
    Ok(())
}

async fn run_query(path: &Path, sql: &str, config: &CliConfig) -> Result<()> {
    let catalog = Arc::new(load_catalog(path)?);
    let lookup: Arc<dyn CatalogLookup> = Arc::clone(&catalog) as Arc<dyn CatalogLookup>;
    let fdw = Arc::new(ForeignDataWrapper::new(Arc::new(store_for(config)), lookup));

    let engine = QueryEngine::with_batch_size(config.batch_size);
    engine.register_catalog(fdw, &catalog)?;

    engine
        .sql(sql)
        .await
        .context("Failed to plan query")?
        .show()
        .await
        .context("Query failed")?;
    Ok(())
}
