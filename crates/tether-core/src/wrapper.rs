//! The wrapper handler: the entry points a host engine calls, bound to one
//! store client and one catalog.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use tether_connectors::StoreClient;
use tether_options::{validate_options, CatalogLookup, ForeignTableId, OptionContext, OptionDef, OptionsError};

use crate::error::ScanError;
use crate::planner::{self, PathCost, RelSize, ScanClauses};
use crate::scan::{ForeignScan, ScanController, ScanFlags};

pub struct ForeignDataWrapper<S: StoreClient> {
    store: Arc<S>,
    catalog: Arc<dyn CatalogLookup>,
}

impl<S: StoreClient> fmt::Debug for ForeignDataWrapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignDataWrapper").finish_non_exhaustive()
    }
}

impl<S: StoreClient> ForeignDataWrapper<S> {
    pub fn new(store: Arc<S>, catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogLookup> {
        &self.catalog
    }

    /// Validator entry point, called for every create/alter of a server or
    /// foreign table before its options are stored.
    pub fn validator(&self, options: &[OptionDef], context: OptionContext) -> Result<(), OptionsError> {
        validate_options(options, context)
    }

    pub fn rel_size(&self, table_id: ForeignTableId) -> RelSize {
        debug!("Estimating size of foreign table {}", table_id);
        planner::estimate_rel_size()
    }

    pub fn path_cost(&self, size: RelSize) -> PathCost {
        planner::estimate_path_cost(size)
    }

    pub fn plan_scan<Q>(&self, table_id: ForeignTableId, clauses: Vec<Q>) -> ScanClauses<Q> {
        debug!("Planning scan of foreign table {} with {} clause(s)", table_id, clauses.len());
        planner::split_scan_clauses(clauses)
    }

    /// A fresh controller, not yet begun.
    pub fn scan(&self) -> ScanController<S> {
        ScanController::new(Arc::clone(&self.store), Arc::clone(&self.catalog))
    }

    /// A controller that has already run `begin` for `table_id`.
    pub fn begin_scan(&self, table_id: ForeignTableId, flags: ScanFlags) -> Result<ScanController<S>, ScanError> {
        let mut scan = self.scan();
        scan.begin(table_id, flags)?;
        Ok(scan)
    }
}
