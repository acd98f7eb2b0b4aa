//! DataFusion adapter for foreign tables.
//!
//! `ForeignTableProvider` exposes one catalog table to a `SessionContext`.
//! Its `scan()` returns a `ForeignScanExec`, a lazy single-partition leaf
//! plan. On the first poll of its output stream one blocking thread is
//! spawned; it runs the whole scan lifecycle and sends batches back over a
//! bounded channel. Store handles never leave that thread.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::catalog::Session;
use datafusion::datasource::TableProvider;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::logical_expr::{TableProviderFilterPushDown, TableType};
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::{RecordBatchReceiverStreamBuilder, RecordBatchStreamAdapter};
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties,
    SendableRecordBatchStream,
};
use datafusion::prelude::{Expr, SessionContext};
use futures::StreamExt;
use tracing::{debug, info};

use tether_connectors::StoreClient;
use tether_options::{ForeignTable, ForeignTableId, InMemoryCatalog};

use crate::row::Row;
use crate::scan::{ForeignScan, ScanController, ScanFlags};
use crate::tuple::{rows_to_record_batch, schema_from_columns};
use crate::wrapper::ForeignDataWrapper;

/// Rows per record batch when no size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Batches buffered between the scan thread and the consumer.
const CHANNEL_CAPACITY: usize = 2;

/// A DataFusion `TableProvider` backed by one foreign table.
pub struct ForeignTableProvider<S: StoreClient> {
    wrapper: Arc<ForeignDataWrapper<S>>,
    table_id: ForeignTableId,
    name: String,
    schema: SchemaRef,
    batch_size: usize,
}

impl<S: StoreClient> fmt::Debug for ForeignTableProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignTableProvider")
            .field("table_id", &self.table_id)
            .field("name", &self.name)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl<S: StoreClient + 'static> ForeignTableProvider<S> {
    pub fn new(wrapper: Arc<ForeignDataWrapper<S>>, table: &ForeignTable, batch_size: usize) -> Self {
        Self {
            wrapper,
            table_id: table.id,
            name: table.name.clone(),
            schema: schema_from_columns(&table.columns),
            batch_size: batch_size.max(1),
        }
    }

    pub fn table_id(&self) -> ForeignTableId {
        self.table_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl<S: StoreClient + 'static> TableProvider for ForeignTableProvider<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DFResult<Vec<TableProviderFilterPushDown>> {
        let clauses = self.wrapper.plan_scan(self.table_id, filters.to_vec());
        let mut pushdown = vec![TableProviderFilterPushDown::Unsupported; clauses.local.len()];
        pushdown.extend(clauses.remote.iter().map(|_| TableProviderFilterPushDown::Exact));
        Ok(pushdown)
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        _limit: Option<usize>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        let size = self.wrapper.rel_size(self.table_id);
        let cost = self.wrapper.path_cost(size);
        debug!(
            "Scanning foreign table '{}' (rows={}, total_cost={})",
            self.name, size.rows, cost.total_cost
        );

        Ok(Arc::new(ForeignScanExec::try_new(
            Arc::clone(&self.wrapper),
            self.table_id,
            self.name.clone(),
            Arc::clone(&self.schema),
            projection.cloned(),
            self.batch_size,
        )?))
    }
}

/// A lazy leaf `ExecutionPlan` that reads one foreign table in a single
/// partition. No scan is begun until the returned stream is polled.
pub struct ForeignScanExec<S: StoreClient> {
    wrapper: Arc<ForeignDataWrapper<S>>,
    table_id: ForeignTableId,
    table_name: String,
    table_schema: SchemaRef,
    projection: Option<Vec<usize>>,
    projected_schema: SchemaRef,
    batch_size: usize,
    properties: PlanProperties,
}

impl<S: StoreClient> fmt::Debug for ForeignScanExec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignScanExec")
            .field("table_id", &self.table_id)
            .field("table_name", &self.table_name)
            .field("projection", &self.projection)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl<S: StoreClient + 'static> ForeignScanExec<S> {
    pub fn try_new(
        wrapper: Arc<ForeignDataWrapper<S>>,
        table_id: ForeignTableId,
        table_name: String,
        table_schema: SchemaRef,
        projection: Option<Vec<usize>>,
        batch_size: usize,
    ) -> DFResult<Self> {
        let projected_schema = match &projection {
            Some(indices) => Arc::new(table_schema.project(indices)?),
            None => Arc::clone(&table_schema),
        };
        let properties = PlanProperties::new(
            EquivalenceProperties::new(Arc::clone(&projected_schema)),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Incremental,
            Boundedness::Bounded,
        );
        Ok(Self {
            wrapper,
            table_id,
            table_name,
            table_schema,
            projection,
            projected_schema,
            batch_size: batch_size.max(1),
            properties,
        })
    }

    pub fn table_id(&self) -> ForeignTableId {
        self.table_id
    }
}

impl<S: StoreClient + 'static> ExecutionPlan for ForeignScanExec<S> {
    fn name(&self) -> &str {
        "ForeignScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        if children.is_empty() {
            Ok(self)
        } else {
            Err(DataFusionError::Internal(
                "ForeignScanExec is a leaf node and cannot have children".to_string(),
            ))
        }
    }

    fn execute(
        &self,
        partition: usize,
        _context: Arc<TaskContext>,
    ) -> DFResult<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "ForeignScanExec only supports partition 0, got {}",
                partition
            )));
        }

        let job = ScanJob {
            wrapper: Arc::clone(&self.wrapper),
            table_id: self.table_id,
            table_schema: Arc::clone(&self.table_schema),
            projection: self.projection.clone(),
            batch_size: self.batch_size,
        };
        let schema = Arc::clone(&self.projected_schema);

        let stream = futures::stream::once(async move { job.spawn(schema) }).flatten();
        Ok(Box::pin(RecordBatchStreamAdapter::new(
            Arc::clone(&self.projected_schema),
            stream,
        )))
    }
}

impl<S: StoreClient> DisplayAs for ForeignScanExec<S> {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ForeignScanExec: table={}, batch_size={}",
            self.table_name, self.batch_size
        )?;
        if let Some(indices) = &self.projection {
            write!(f, ", projection={:?}", indices)?;
        }
        Ok(())
    }
}

/// Everything one executing partition needs before its scan thread starts.
struct ScanJob<S: StoreClient> {
    wrapper: Arc<ForeignDataWrapper<S>>,
    table_id: ForeignTableId,
    table_schema: SchemaRef,
    projection: Option<Vec<usize>>,
    batch_size: usize,
}

impl<S: StoreClient + 'static> ScanJob<S> {
    /// Start the scan thread. The returned stream ends when the scan is
    /// exhausted or after its first error.
    fn spawn(self, schema: SchemaRef) -> SendableRecordBatchStream {
        let mut builder = RecordBatchReceiverStreamBuilder::new(schema, CHANNEL_CAPACITY);
        let tx = builder.tx();
        builder.spawn_blocking(move || {
            let table_id = self.table_id;
            let mut task = ScanTask {
                job: self,
                scan: None,
                finished: false,
            };
            while let Some(batch) = task.next_batch().transpose() {
                if tx.blocking_send(batch).is_err() {
                    debug!("Foreign scan of table {} lost its consumer", table_id);
                    break;
                }
            }
            Ok(())
        });
        builder.build()
    }
}

/// State carried across batches on the scan thread.
struct ScanTask<S: StoreClient> {
    job: ScanJob<S>,
    scan: Option<ScanController<S>>,
    finished: bool,
}

impl<S: StoreClient> ScanTask<S> {
    /// Pull up to `batch_size` rows. Blocks on the store.
    fn next_batch(&mut self) -> DFResult<Option<RecordBatch>> {
        if self.finished {
            return Ok(None);
        }

        if self.scan.is_none() {
            match self.job.wrapper.begin_scan(self.job.table_id, ScanFlags::default()) {
                Ok(scan) => self.scan = Some(scan),
                Err(e) => return Err(self.fail(e)),
            }
        }
        let Some(scan) = self.scan.as_mut() else {
            return Ok(None);
        };

        let mut rows: Vec<Row> = Vec::with_capacity(self.job.batch_size);
        let mut exhausted = false;
        while rows.len() < self.job.batch_size {
            match scan.iterate() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        if exhausted {
            self.finish();
            if rows.is_empty() {
                return Ok(None);
            }
        }

        let batch = rows_to_record_batch(&rows, Arc::clone(&self.job.table_schema))
            .map_err(|e| self.fail(e))?;
        let batch = match &self.job.projection {
            Some(indices) => batch.project(indices)?,
            None => batch,
        };
        Ok(Some(batch))
    }

    fn finish(&mut self) {
        if let Some(mut scan) = self.scan.take() {
            scan.end();
        }
        self.finished = true;
    }

    fn fail<E>(&mut self, error: E) -> DataFusionError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.finish();
        DataFusionError::External(Box::new(error))
    }
}

impl<S: StoreClient> Drop for ScanTask<S> {
    fn drop(&mut self) {
        if self.scan.is_some() {
            debug!("Foreign scan of table {} cancelled", self.job.table_id);
        }
        self.finish();
    }
}

/// Register every foreign table in `catalog` with `ctx` under its own name.
/// Returns the number of tables registered.
pub fn register_foreign_tables<S: StoreClient + 'static>(
    ctx: &SessionContext,
    wrapper: Arc<ForeignDataWrapper<S>>,
    catalog: &InMemoryCatalog,
    batch_size: usize,
) -> DFResult<usize> {
    for table in catalog.tables() {
        let provider = ForeignTableProvider::new(Arc::clone(&wrapper), table, batch_size);
        ctx.register_table(table.name.as_str(), Arc::new(provider))?;
        info!("Registered foreign table '{}' ({})", table.name, table.id);
    }
    Ok(catalog.tables().len())
}
