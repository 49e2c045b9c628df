//! Scan rewrite (§4.5): turn a default-index scan into a `find` or
//! `index_scan` against a concrete secondary index, guided by the
//! injected index estimator.

use crate::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
use crate::ir::graph::{Graph, NodeId};
use crate::ir::relation::{Column, RangeEndpoint, RelationOp};
use crate::predicate::range::{Bound, BoundValue, RangeHintMap};
use crate::predicate::Simplified;
use crate::provider::{IndexEstimate, IndexEstimator, KeyRange, StorageProvider};
use crate::resolution::{NodeId as ExprNodeId, VariableId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

use super::{RewriteOptions, ScoredCandidate};

/// Walk downstream from `scan` through a linear chain of filters whose
/// conjuncts don't touch the key columns already decided, collecting every
/// conjunct encountered so it can be matched against candidate index keys.
fn collect_downstream_conjuncts(
    graph: &Graph,
    scan: NodeId,
) -> Vec<Arc<crate::ir::expression::ScalarExpression>> {
    let mut conjuncts = Vec::new();
    let mut current = scan;
    loop {
        let node = match graph.get(current) {
            Some(n) => n,
            None => break,
        };
        if node.outputs.len() != 1 {
            break;
        }
        let next = node.outputs[0];
        let next_node = match graph.get(next) {
            Some(n) => n,
            None => break,
        };
        if next_node.inputs.len() != 1 {
            break;
        }
        match &next_node.op {
            RelationOp::Filter { condition } => {
                conjuncts.extend(crate::predicate::decompose_conjunctions(condition));
                current = next;
            }
            RelationOp::Project { .. } => {
                current = next;
            }
            _ => break,
        }
    }
    conjuncts
}

/// Build a range hint per key column from the collected conjuncts. Only
/// simple `column {op} immediate` comparisons on a `scan` output variable
/// are recognised; anything else is left as a residual conjunct. The third
/// element maps each constrained variable back to the original conjunct(s)
/// that contributed its bound, so a chosen index's key range can later be
/// traced back to the filter conjuncts it subsumes.
fn build_range_hints(
    conjuncts: &[Arc<ScalarExpression>],
) -> (
    RangeHintMap,
    Vec<VariableId>,
    HashMap<VariableId, Vec<Arc<ScalarExpression>>>,
) {
    let mut hints = RangeHintMap::new();
    let mut equality_bound = Vec::new();
    let mut provenance: HashMap<VariableId, Vec<Arc<ScalarExpression>>> = HashMap::new();
    for conjunct in conjuncts {
        if let ExpressionKind::Binary { op, left, right } = &conjunct.kind {
            let (var, value) = match (&left.kind, &right.kind) {
                (ExpressionKind::VariableReference(v), _) => (Some(*v), right.clone()),
                (_, ExpressionKind::VariableReference(v)) => (Some(*v), left.clone()),
                _ => (None, left.clone()),
            };
            let Some(var) = var else { continue };
            let bound_value = BoundValue::Immediate(value);
            let matched = match op {
                BinaryOp::Equal => {
                    hints.intersect_lower(var, Bound::Inclusive(bound_value.clone()));
                    hints.intersect_upper(var, Bound::Inclusive(bound_value));
                    equality_bound.push(var);
                    true
                }
                BinaryOp::LessThan => {
                    hints.intersect_upper(var, Bound::Exclusive(bound_value));
                    true
                }
                BinaryOp::LessThanOrEqual => {
                    hints.intersect_upper(var, Bound::Inclusive(bound_value));
                    true
                }
                BinaryOp::GreaterThan => {
                    hints.intersect_lower(var, Bound::Exclusive(bound_value));
                    true
                }
                BinaryOp::GreaterThanOrEqual => {
                    hints.intersect_lower(var, Bound::Inclusive(bound_value));
                    true
                }
                _ => false,
            };
            if matched {
                provenance.entry(var).or_default().push(conjunct.clone());
            }
        }
    }
    (hints, equality_bound, provenance)
}

fn bound_to_endpoint(bound: &Bound) -> RangeEndpoint {
    match bound {
        Bound::Infinity => RangeEndpoint::Infinity,
        Bound::Inclusive(BoundValue::Immediate(e)) => RangeEndpoint::Inclusive(e.clone()),
        Bound::Exclusive(BoundValue::Immediate(e)) => RangeEndpoint::Exclusive(e.clone()),
        // A variable-valued endpoint can't be expressed as a literal range
        // bound without further binding resolution; treat as unbounded.
        Bound::Inclusive(BoundValue::Variable(_)) | Bound::Exclusive(BoundValue::Variable(_)) => {
            RangeEndpoint::Infinity
        }
    }
}

/// Rewrite every eligible scan in `graph` into a `find` or `index_scan`.
pub fn rewrite_scans(
    graph: &mut Graph,
    provider: &dyn StorageProvider,
    estimator: &dyn IndexEstimator,
    _options: RewriteOptions,
) {
    let candidates: Vec<NodeId> = graph
        .node_ids()
        .filter(|id| matches!(graph.get(*id).map(|n| &n.op), Some(RelationOp::Scan { .. })))
        .collect();

    for scan_id in candidates {
        rewrite_one_scan(graph, scan_id, provider, estimator);
    }
}

fn rewrite_one_scan(
    graph: &mut Graph,
    scan_id: NodeId,
    provider: &dyn StorageProvider,
    estimator: &dyn IndexEstimator,
) {
    let (table_name, columns) = match graph.get(scan_id).map(|n| n.op.clone()) {
        Some(RelationOp::Scan { table, columns }) => (table, columns),
        _ => return,
    };

    let conjuncts = collect_downstream_conjuncts(graph, scan_id);
    let (hints, equality_vars, provenance) = build_range_hints(&conjuncts);

    let mut scored = Vec::new();
    provider.each_index(&mut |index| {
        if index.table.as_ref() != table_name.as_ref() {
            return;
        }
        let key_ranges: Vec<KeyRange> = index
            .key_columns
            .iter()
            .filter_map(|col_name| {
                let var = columns
                    .iter()
                    .find(|c| c.source_name.as_deref() == Some(col_name.as_ref()))
                    .map(|c| c.variable)?;
                let entry = hints.get(var)?;
                Some(KeyRange {
                    column: col_name.clone(),
                    lower: bound_to_endpoint(&entry.lower),
                    upper: bound_to_endpoint(&entry.upper),
                })
            })
            .collect();
        let estimate = estimator.estimate(index, &key_ranges, conjuncts.len(), false);
        trace!(index = %index.name, score = estimate.score, row_count = estimate.row_count, "scored scan candidate");
        scored.push(ScoredCandidate {
            index: index.clone(),
            estimate,
            key_ranges,
        });
    });

    let best = scored
        .iter()
        .map(|c| (&c.index, c.estimate))
        .collect::<Vec<_>>();
    let chosen = crate::provider::select_best_index(&best).cloned();

    let Some(chosen) = chosen else { return };
    let candidate = scored.iter().find(|c| c.index.name == chosen.name).unwrap();

    let all_keys_equal = chosen
        .key_columns
        .iter()
        .all(|col_name| {
            columns
                .iter()
                .find(|c| c.source_name.as_deref() == Some(col_name.as_ref()))
                .map(|c| equality_vars.contains(&c.variable))
                .unwrap_or(false)
        });

    let (new_op, subsumed_vars): (RelationOp, Vec<VariableId>) =
        if all_keys_equal && chosen.kind != crate::provider::IndexKind::Ordered {
            let key = candidate
                .key_ranges
                .iter()
                .map(|kr| match &kr.lower {
                    RangeEndpoint::Inclusive(e) => e.clone(),
                    _ => unreachable!("equality bound is always inclusive"),
                })
                .collect();
            let subsumed = chosen
                .key_columns
                .iter()
                .filter_map(|col_name| {
                    columns
                        .iter()
                        .find(|c| c.source_name.as_deref() == Some(col_name.as_ref()))
                        .map(|c| c.variable)
                })
                .collect();
            (
                RelationOp::Find {
                    index: chosen.name.clone(),
                    key,
                    columns: remap_columns(&columns, &chosen),
                },
                subsumed,
            )
        } else {
            let lower = candidate
                .key_ranges
                .first()
                .map(|kr| kr.lower.clone())
                .unwrap_or(RangeEndpoint::Infinity);
            let upper = candidate
                .key_ranges
                .first()
                .map(|kr| kr.upper.clone())
                .unwrap_or(RangeEndpoint::Infinity);
            let subsumed = candidate
                .key_ranges
                .first()
                .and_then(|kr| {
                    columns
                        .iter()
                        .find(|c| c.source_name.as_deref() == Some(kr.column.as_ref()))
                        .map(|c| c.variable)
                })
                .into_iter()
                .collect();
            (
                RelationOp::IndexScan {
                    index: chosen.name.clone(),
                    lower,
                    upper,
                    columns: remap_columns(&columns, &chosen),
                },
                subsumed,
            )
        };

    let _ = graph.replace_op(scan_id, new_op);

    let subsumed_ids: HashSet<ExprNodeId> = subsumed_vars
        .iter()
        .flat_map(|v| provenance.get(v).cloned().unwrap_or_default())
        .map(|c| c.id)
        .collect();
    if !subsumed_ids.is_empty() {
        subsume_filter_conjuncts(graph, scan_id, &subsumed_ids);
    }
}

/// Walk downstream from the rewritten scan through its linear filter/project
/// chain, stripping any conjunct whose id is in `subsumed` — it's already
/// enforced by the chosen index's key/range and would otherwise be
/// evaluated a second time for every row (§4.5 step 4). A filter left with
/// no remaining conjuncts collapses to `true` and simplifies away on the
/// next resolve pass.
fn subsume_filter_conjuncts(graph: &mut Graph, start: NodeId, subsumed: &HashSet<ExprNodeId>) {
    let mut current = start;
    loop {
        let node = match graph.get(current) {
            Some(n) => n,
            None => break,
        };
        if node.outputs.len() != 1 {
            break;
        }
        let next = node.outputs[0];
        let next_node = match graph.get(next) {
            Some(n) => n,
            None => break,
        };
        if next_node.inputs.len() != 1 {
            break;
        }
        match &next_node.op {
            RelationOp::Filter { condition } => {
                let remaining: Vec<_> = crate::predicate::decompose_conjunctions(condition)
                    .into_iter()
                    .filter(|c| !subsumed.contains(&c.id))
                    .collect();
                let rebuilt = rebuild_conjunction(condition.id, remaining);
                let new_condition = match crate::predicate::simplify(&rebuilt) {
                    Simplified::ConstantTrue => bool_literal(condition.id, true),
                    Simplified::ConstantFalse => bool_literal(condition.id, false),
                    _ => rebuilt,
                };
                let _ = graph.replace_op(next, RelationOp::Filter { condition: new_condition });
                current = next;
            }
            RelationOp::Project { .. } => current = next,
            _ => break,
        }
    }
}

fn rebuild_conjunction(id: ExprNodeId, terms: Vec<Arc<ScalarExpression>>) -> Arc<ScalarExpression> {
    let Some(first) = terms.first().cloned() else {
        return bool_literal(id, true);
    };
    terms
        .into_iter()
        .skip(1)
        .fold(first, |acc, t| {
            Arc::new(ScalarExpression::new(
                id,
                ExpressionKind::Binary {
                    op: BinaryOp::And,
                    left: acc,
                    right: t,
                },
            ))
        })
}

fn bool_literal(id: ExprNodeId, value: bool) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(id, ExpressionKind::Literal(Literal::Boolean(value))))
}

fn remap_columns(columns: &[Column], _index: &crate::provider::Index) -> Vec<Column> {
    columns.to_vec()
}
