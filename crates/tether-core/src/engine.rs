//! Query engine over registered foreign tables, built on DataFusion

use std::sync::Arc;

use datafusion::arrow::array::RecordBatch;
use datafusion::error::Result as DFResult;
use datafusion::prelude::*;
use tracing::info;

use tether_connectors::StoreClient;
use tether_options::InMemoryCatalog;

use crate::table::{register_foreign_tables, DEFAULT_BATCH_SIZE};
use crate::wrapper::ForeignDataWrapper;

/// Wraps a DataFusion `SessionContext` whose tables are foreign tables.
pub struct QueryEngine {
    ctx: SessionContext,
    batch_size: usize,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            ctx: SessionContext::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Register every table of `catalog`, read through `wrapper`.
    pub fn register_catalog<S: StoreClient + 'static>(
        &self,
        wrapper: Arc<ForeignDataWrapper<S>>,
        catalog: &InMemoryCatalog,
    ) -> DFResult<usize> {
        let count = register_foreign_tables(&self.ctx, wrapper, catalog, self.batch_size)?;
        info!("QueryEngine registered {} foreign table(s)", count);
        Ok(count)
    }

    pub async fn sql(&self, query: &str) -> DFResult<DataFrame> {
        self.ctx.sql(query).await
    }

    /// Run `query` to completion.
    pub async fn collect(&self, query: &str) -> DFResult<Vec<RecordBatch>> {
        self.sql(query).await?.collect().await
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}
