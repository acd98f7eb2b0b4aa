//! Planner hooks. The wrapper does no estimation and pushes nothing down:
//! every relation is sized at zero rows, every path costs nothing to start,
//! and every scan clause stays with the host for local evaluation.

/// Estimated size of a foreign relation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelSize {
    pub rows: f64,
}

/// Cost of the single scan path offered for a foreign relation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathCost {
    pub startup_cost: f64,
    pub total_cost: f64,
}

/// Scan clauses split between the host and the external store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanClauses<Q> {
    /// Evaluated by the host on every returned row.
    pub local: Vec<Q>,
    /// Sent to the external store. Always empty.
    pub remote: Vec<Q>,
}

pub fn estimate_rel_size() -> RelSize {
    RelSize { rows: 0.0 }
}

pub fn estimate_path_cost(size: RelSize) -> PathCost {
    let startup_cost = 0.0;
    PathCost {
        startup_cost,
        total_cost: startup_cost + size.rows,
    }
}

pub fn split_scan_clauses<Q>(clauses: Vec<Q>) -> ScanClauses<Q> {
    ScanClauses {
        local: clauses,
        remote: Vec::new(),
    }
}
