//! Join rewrite (§4.5): turn an intermediate join into an index-driven
//! `join_find`/`join_scan` on whichever side carries the matching index,
//! respecting outer-join semantics.

use crate::ir::expression::{BinaryOp, ExpressionKind};
use crate::ir::graph::{Graph, NodeId};
use crate::ir::relation::{JoinKind, RangeEndpoint, RelationOp};
use crate::provider::{IndexKind, IndexEstimator, StorageProvider};
use crate::resolution::VariableId;
use std::sync::Arc;

use super::RewriteOptions;

/// Which side of a join is still eligible for find/scan replacement given
/// its kind. `left_outer` only allows rewriting the right (inner) side;
/// `full_outer` allows none.
fn eligible_probe_side(kind: JoinKind) -> EligibleSide {
    match kind {
        JoinKind::Inner => EligibleSide::Either,
        JoinKind::LeftOuter => EligibleSide::RightOnly,
        JoinKind::FullOuter => EligibleSide::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EligibleSide {
    Either,
    RightOnly,
    None,
}

/// An equality conjunct `left_var = right_expr` (or the mirror) extracted
/// from a join condition.
struct Equality {
    probe_variable: VariableId,
    build_key_column: Arc<str>,
}

/// Does an "interference" operator (a `distinct`, for example) sit between
/// the scan and the join on the consumed side, forbidding replacement
/// because it would change the row multiset reaching the join?
fn has_interference(graph: &Graph, from: NodeId, to: NodeId) -> bool {
    let mut current = from;
    while current != to {
        let node = match graph.get(current) {
            Some(n) => n,
            None => return true,
        };
        match &node.op {
            RelationOp::Filter { .. } | RelationOp::Project { .. } | RelationOp::Scan { .. } => {}
            _ if current == from => {}
            _ => return true,
        }
        if node.outputs.len() != 1 {
            return true;
        }
        current = node.outputs[0];
    }
    false
}

fn extract_equalities(
    condition: &crate::ir::expression::ScalarExpression,
    build_columns: &[Arc<str>],
    build_vars: &[VariableId],
) -> Vec<Equality> {
    let mut out = Vec::new();
    for conjunct in crate::predicate::decompose_conjunctions(&Arc::new(condition.clone())) {
        if let ExpressionKind::Binary {
            op: BinaryOp::Equal,
            left,
            right,
        } = &conjunct.kind
        {
            let pair = match (&left.kind, &right.kind) {
                (ExpressionKind::VariableReference(a), ExpressionKind::VariableReference(b)) => {
                    Some((*a, *b))
                }
                _ => None,
            };
            if let Some((a, b)) = pair {
                if let Some(pos) = build_vars.iter().position(|v| *v == b) {
                    out.push(Equality {
                        probe_variable: a,
                        build_key_column: build_columns[pos].clone(),
                    });
                } else if let Some(pos) = build_vars.iter().position(|v| *v == a) {
                    out.push(Equality {
                        probe_variable: b,
                        build_key_column: build_columns[pos].clone(),
                    });
                }
            }
        }
    }
    out
}

/// Rewrite every eligible intermediate join in `graph` into `join_find` or
/// `join_scan`.
pub fn rewrite_joins(
    graph: &mut Graph,
    provider: &dyn StorageProvider,
    _estimator: &dyn IndexEstimator,
    options: RewriteOptions,
) {
    let join_ids: Vec<NodeId> = graph
        .node_ids()
        .filter(|id| matches!(graph.get(*id).map(|n| &n.op), Some(RelationOp::Join { .. })))
        .collect();

    for join_id in join_ids {
        rewrite_one_join(graph, join_id, provider, options);
    }
}

fn rewrite_one_join(
    graph: &mut Graph,
    join_id: NodeId,
    provider: &dyn StorageProvider,
    options: RewriteOptions,
) {
    let (kind, condition) = match graph.get(join_id).map(|n| n.op.clone()) {
        Some(RelationOp::Join { kind, condition }) => (kind, condition),
        _ => return,
    };
    let eligible = eligible_probe_side(kind);
    if eligible == EligibleSide::None {
        return;
    }

    let inputs = match graph.get(join_id) {
        Some(n) if n.inputs.len() == 2 => n.inputs.clone(),
        _ => return,
    };
    let (_left, right) = (inputs[0], inputs[1]);

    // Only the right (probe) side is attempted: this mirrors the common
    // build=left/probe=right join layout and is always a subset of what
    // `left_outer` permits.
    let try_side = |graph: &Graph, build_side: NodeId| -> Option<(Arc<str>, Vec<Arc<str>>, Vec<VariableId>)> {
        let build_table = match graph.get(build_side).map(|n| n.op.clone())? {
            RelationOp::Scan { table, columns } => (table, columns),
            _ => return None,
        };
        let (table, columns) = build_table;
        let names: Vec<Arc<str>> = columns
            .iter()
            .filter_map(|c| c.source_name.clone())
            .collect();
        let vars: Vec<VariableId> = columns
            .iter()
            .filter(|c| c.source_name.is_some())
            .map(|c| c.variable)
            .collect();
        Some((table, names, vars))
    };

    if has_interference(graph, right, join_id) {
        return;
    }

    if let Some((table, names, vars)) = try_side(graph, right) {
        let equalities = extract_equalities(condition.as_ref(), &names, &vars);
        if equalities.is_empty() {
            return;
        }
        let unique_index = find_covering_index(provider, &table, &equalities, true);
        if let Some(index) = unique_index {
            let key = equalities
                .iter()
                .map(|e| {
                    Arc::new(crate::ir::expression::ScalarExpression::new(
                        crate::resolution::NodeId(0),
                        ExpressionKind::VariableReference(e.probe_variable),
                    ))
                })
                .collect();
            let _ = graph.replace_op(
                join_id,
                RelationOp::JoinFind {
                    kind,
                    index: index.name,
                    key,
                    residual: None,
                },
            );
            return;
        }
        if options.enable_join_scan && kind != JoinKind::FullOuter {
            if let Some(index) = find_covering_index(provider, &table, &equalities, false) {
                let _ = graph.replace_op(
                    join_id,
                    RelationOp::JoinScan {
                        kind,
                        index: index.name,
                        lower: RangeEndpoint::Infinity,
                        upper: RangeEndpoint::Infinity,
                        residual: None,
                    },
                );
            }
        }
    }
}

fn find_covering_index(
    provider: &dyn StorageProvider,
    table: &str,
    equalities: &[Equality],
    unique_only: bool,
) -> Option<crate::provider::Index> {
    let mut found = None;
    provider.each_index(&mut |index| {
        if found.is_some() || index.table.as_ref() != table {
            return;
        }
        if unique_only && !matches!(index.kind, IndexKind::Primary | IndexKind::Unique) {
            return;
        }
        let covers = index
            .key_columns
            .iter()
            .all(|col| equalities.iter().any(|e| &e.build_key_column == col));
        if covers {
            found = Some(index.clone());
        }
    });
    found
}
