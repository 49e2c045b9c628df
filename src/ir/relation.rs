//! Intermediate (logical) relational operators (§3, §4.3, §4.5, §4.7).
//!
//! These are the nodes C5 rewrites and C6/C7 lower; the physical step
//! counterparts produced by C7 live in [`crate::step`].

use crate::ir::expression::ScalarExpression;
use crate::resolution::VariableId;
use std::sync::Arc;

/// How a join treats rows from each side that have no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

/// A column produced by `scan`/`find`/`project`/`aggregate`, binding a
/// result variable to the value computed for it. `source_name` names the
/// underlying table column for `scan`/`find`/`index_scan` outputs, letting
/// the scan rewriter line up key columns against the provider's index
/// metadata; it is `None` for computed `project`/`aggregate` columns.
#[derive(Debug, Clone)]
pub struct Column {
    pub variable: VariableId,
    pub value: Arc<ScalarExpression>,
    pub source_name: Option<Arc<str>>,
}

impl Column {
    pub fn computed(variable: VariableId, value: Arc<ScalarExpression>) -> Self {
        Column {
            variable,
            value,
            source_name: None,
        }
    }

    pub fn table_column(variable: VariableId, value: Arc<ScalarExpression>, name: Arc<str>) -> Self {
        Column {
            variable,
            value,
            source_name: Some(name),
        }
    }
}

/// A single grouping/aggregation column pair: the result variable and the
/// aggregation expression that computes it.
#[derive(Debug, Clone)]
pub struct AggregateColumn {
    pub variable: VariableId,
    pub aggregation: Arc<ScalarExpression>,
}

/// A sort key used by `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub variable: VariableId,
    pub direction: SortDirection,
}

/// An endpoint used by a range scan, mirroring the range hint bound kinds
/// from §3/§4.4.
#[derive(Debug, Clone)]
pub enum RangeEndpoint {
    Infinity,
    Inclusive(Arc<ScalarExpression>),
    Exclusive(Arc<ScalarExpression>),
}

/// The operator kind. Every operator is also given input/output port wiring
/// by the owning [`crate::ir::graph::Graph`]; this enum only carries the
/// operator-specific payload.
#[derive(Debug, Clone)]
pub enum RelationOp {
    /// Full-table scan against the default index. Rewritten by C5 into
    /// `Find`/`IndexScan` once a concrete index is selected.
    Scan {
        table: Arc<str>,
        columns: Vec<Column>,
    },
    /// A point lookup against a chosen unique index.
    Find {
        index: Arc<str>,
        key: Vec<Arc<ScalarExpression>>,
        columns: Vec<Column>,
    },
    /// A ranged scan against a chosen ordered index.
    IndexScan {
        index: Arc<str>,
        lower: RangeEndpoint,
        upper: RangeEndpoint,
        columns: Vec<Column>,
    },
    Filter {
        condition: Arc<ScalarExpression>,
    },
    Project {
        columns: Vec<Column>,
    },
    Join {
        kind: JoinKind,
        condition: Arc<ScalarExpression>,
    },
    /// A join rewritten by C5 into an index-driven point lookup on the
    /// probe side.
    JoinFind {
        kind: JoinKind,
        index: Arc<str>,
        key: Vec<Arc<ScalarExpression>>,
        residual: Option<Arc<ScalarExpression>>,
    },
    /// A join rewritten by C5 into an index-driven ranged scan on the
    /// probe side.
    JoinScan {
        kind: JoinKind,
        index: Arc<str>,
        lower: RangeEndpoint,
        upper: RangeEndpoint,
        residual: Option<Arc<ScalarExpression>>,
    },
    Aggregate {
        keys: Vec<VariableId>,
        columns: Vec<AggregateColumn>,
        /// Whether every aggregation in `columns` supports incremental
        /// (partial, then combine) evaluation — drives the C7 lowering
        /// choice between the `aggregate` exchange and plain `group`.
        incremental: bool,
    },
    Distinct {
        columns: Vec<VariableId>,
    },
    Limit {
        count: u64,
        group_keys: Vec<VariableId>,
        sort_keys: Vec<SortKey>,
    },
    Union {
        distinct: bool,
    },
    Intersection,
    Difference,
    Values {
        columns: Vec<VariableId>,
        rows: Vec<Vec<Arc<ScalarExpression>>>,
    },
    Write {
        table: Arc<str>,
        targets: Vec<VariableId>,
        sources: Vec<Arc<ScalarExpression>>,
    },
    /// A marker preserved until the variable rewrite completes, then
    /// erased (§4.8).
    Escape,
}

impl RelationOp {
    /// The variables this operator itself declares (its `define` set
    /// contribution for C6 liveness), independent of the operators
    /// upstream.
    pub fn defined_variables(&self) -> Vec<VariableId> {
        match self {
            RelationOp::Scan { columns, .. }
            | RelationOp::Find { columns, .. }
            | RelationOp::IndexScan { columns, .. }
            | RelationOp::Project { columns } => {
                columns.iter().map(|c| c.variable).collect()
            }
            RelationOp::Aggregate { columns, .. } => {
                columns.iter().map(|c| c.variable).collect()
            }
            RelationOp::Values { columns, .. } => columns.clone(),
            RelationOp::JoinFind { .. }
            | RelationOp::JoinScan { .. }
            | RelationOp::Join { .. }
            | RelationOp::Filter { .. }
            | RelationOp::Distinct { .. }
            | RelationOp::Limit { .. }
            | RelationOp::Union { .. }
            | RelationOp::Intersection
            | RelationOp::Difference
            | RelationOp::Write { .. }
            | RelationOp::Escape => Vec::new(),
        }
    }

    /// True if the condition/predicate of this operator must be boolean
    /// (§4.3 relational operator constraints).
    pub fn requires_boolean_condition(&self) -> bool {
        matches!(
            self,
            RelationOp::Filter { .. } | RelationOp::Join { .. }
        )
    }

    pub fn is_scan_like(&self) -> bool {
        matches!(
            self,
            RelationOp::Scan { .. } | RelationOp::Find { .. } | RelationOp::IndexScan { .. }
        )
    }
}
