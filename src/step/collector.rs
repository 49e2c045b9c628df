//! Exchange step collector (C7): sweeps the rewritten intermediate graph
//! and lowers each remaining operator into its §4.8 physical counterpart.

use crate::ir::graph::{Graph, NodeId as OpId};
use crate::ir::relation::{JoinKind, RelationOp};
use tracing::debug;

use super::{Exchange, PhysicalOp, StepGraph, StepId, StepKind};

/// Lower every operator in `graph`, in dependency order, into `steps`.
/// Returns the step id that produces the same rows as the graph's final
/// operator, for callers that need to attach a terminal sink.
pub fn collect_steps(graph: &Graph, steps: &mut StepGraph) -> Vec<(OpId, StepId)> {
    let mut mapping = Vec::new();
    for op_id in graph.node_ids() {
        let node = graph.get(op_id).unwrap();
        let step = lower_operator(&node.op, steps);
        debug!(op = op_id.0, "lowered operator to physical step");
        mapping.push((op_id, step));
    }
    mapping
}

fn lower_operator(op: &RelationOp, steps: &mut StepGraph) -> StepId {
    match op {
        RelationOp::Join { kind, condition } => lower_cogroup_join(*kind, condition.clone(), steps),
        RelationOp::JoinFind { kind, index, .. } => {
            let broadcast = steps.insert(StepKind::Exchange(Exchange::Broadcast));
            let probe = steps.insert(StepKind::Physical(PhysicalOp::JoinFind {
                kind: *kind,
                index: index.clone(),
            }));
            steps.connect(broadcast, probe);
            probe
        }
        RelationOp::JoinScan { kind, index, .. } => {
            let broadcast = steps.insert(StepKind::Exchange(Exchange::Broadcast));
            let probe = steps.insert(StepKind::Physical(PhysicalOp::JoinScan {
                kind: *kind,
                index: index.clone(),
            }));
            steps.connect(broadcast, probe);
            probe
        }
        RelationOp::Aggregate {
            keys,
            columns,
            incremental,
        } => {
            if *incremental {
                let exchange = steps.insert(StepKind::Exchange(Exchange::Aggregate {
                    keys: keys.clone(),
                    partial_aggregators: columns
                        .iter()
                        .map(|_| std::sync::Arc::from("partial"))
                        .collect(),
                }));
                let take = steps.insert(StepKind::Physical(PhysicalOp::TakeGroup {
                    exchange,
                }));
                steps.connect(exchange, take);
                let flatten = steps.insert(StepKind::Physical(PhysicalOp::Flatten));
                steps.connect(take, flatten);
                flatten
            } else {
                let exchange = steps.insert(StepKind::Exchange(Exchange::Group {
                    keys: keys.clone(),
                    sort_keys: Vec::new(),
                    limit: None,
                    equivalence: false,
                }));
                let take = steps.insert(StepKind::Physical(PhysicalOp::TakeGroup {
                    exchange,
                }));
                steps.connect(exchange, take);
                let agg = steps.insert(StepKind::Physical(PhysicalOp::AggregateGroup {
                    columns: columns.iter().map(|c| c.variable).collect(),
                }));
                steps.connect(take, agg);
                agg
            }
        }
        RelationOp::Distinct { columns } => {
            let exchange = steps.insert(StepKind::Exchange(Exchange::Group {
                keys: columns.clone(),
                sort_keys: Vec::new(),
                limit: Some(1),
                equivalence: true,
            }));
            let take = steps.insert(StepKind::Physical(PhysicalOp::TakeGroup { exchange }));
            steps.connect(exchange, take);
            let flatten = steps.insert(StepKind::Physical(PhysicalOp::Flatten));
            steps.connect(take, flatten);
            flatten
        }
        RelationOp::Limit {
            count,
            group_keys,
            sort_keys,
        } => {
            if group_keys.is_empty() && sort_keys.is_empty() {
                let exchange = steps.insert(StepKind::Exchange(Exchange::Forward {
                    limit: Some(*count),
                }));
                let take = steps.insert(StepKind::Physical(PhysicalOp::TakeFlat { exchange }));
                steps.connect(exchange, take);
                take
            } else {
                let exchange = steps.insert(StepKind::Exchange(Exchange::Group {
                    keys: group_keys.clone(),
                    sort_keys: sort_keys.iter().map(|s| s.variable).collect(),
                    limit: Some(*count),
                    equivalence: false,
                }));
                let take = steps.insert(StepKind::Physical(PhysicalOp::TakeGroup { exchange }));
                steps.connect(exchange, take);
                let flatten = steps.insert(StepKind::Physical(PhysicalOp::Flatten));
                steps.connect(take, flatten);
                flatten
            }
        }
        RelationOp::Union { distinct } => {
            if *distinct {
                lower_distinct_union(steps)
            } else {
                let exchange = steps.insert(StepKind::Exchange(Exchange::Forward { limit: None }));
                let take = steps.insert(StepKind::Physical(PhysicalOp::TakeFlat { exchange }));
                steps.connect(exchange, take);
                take
            }
        }
        RelationOp::Intersection => lower_cogroup_pair(PhysicalOp::Intersection, steps),
        RelationOp::Difference => lower_cogroup_pair(PhysicalOp::Difference, steps),
        RelationOp::Escape => {
            // Preserved operators are erased by the time C7 runs; a
            // leftover one lowers to a no-op forward.
            steps.insert(StepKind::Exchange(Exchange::Forward { limit: None }))
        }
        RelationOp::Scan { .. }
        | RelationOp::Find { .. }
        | RelationOp::IndexScan { .. }
        | RelationOp::Filter { .. }
        | RelationOp::Project { .. }
        | RelationOp::Values { .. }
        | RelationOp::Write { .. } => {
            // Source/sink-like operators pass straight through as a
            // forward exchange; they carry no grouping semantics of their
            // own to lower.
            steps.insert(StepKind::Exchange(Exchange::Forward { limit: None }))
        }
    }
}

fn lower_cogroup_join(
    kind: JoinKind,
    condition: std::sync::Arc<crate::ir::expression::ScalarExpression>,
    steps: &mut StepGraph,
) -> StepId {
    let left_group = steps.insert(StepKind::Exchange(Exchange::Group {
        keys: Vec::new(),
        sort_keys: Vec::new(),
        limit: None,
        equivalence: false,
    }));
    let right_group = steps.insert(StepKind::Exchange(Exchange::Group {
        keys: Vec::new(),
        sort_keys: Vec::new(),
        limit: None,
        equivalence: false,
    }));
    let cogroup = steps.insert(StepKind::Physical(PhysicalOp::TakeCogroup {
        left: left_group,
        right: right_group,
    }));
    steps.connect(left_group, cogroup);
    steps.connect(right_group, cogroup);
    let join = steps.insert(StepKind::Physical(PhysicalOp::JoinGroup { kind, condition }));
    steps.connect(cogroup, join);
    join
}

fn lower_cogroup_pair(op: PhysicalOp, steps: &mut StepGraph) -> StepId {
    let left_group = steps.insert(StepKind::Exchange(Exchange::Group {
        keys: Vec::new(),
        sort_keys: Vec::new(),
        limit: None,
        equivalence: false,
    }));
    let right_group = steps.insert(StepKind::Exchange(Exchange::Group {
        keys: Vec::new(),
        sort_keys: Vec::new(),
        limit: None,
        equivalence: false,
    }));
    let cogroup = steps.insert(StepKind::Physical(PhysicalOp::TakeCogroup {
        left: left_group,
        right: right_group,
    }));
    steps.connect(left_group, cogroup);
    steps.connect(right_group, cogroup);
    let physical = steps.insert(StepKind::Physical(op));
    steps.connect(cogroup, physical);
    physical
}

fn lower_distinct_union(steps: &mut StepGraph) -> StepId {
    let exchange = steps.insert(StepKind::Exchange(Exchange::Group {
        keys: Vec::new(),
        sort_keys: Vec::new(),
        limit: Some(1),
        equivalence: true,
    }));
    let offer_left = steps.insert(StepKind::Physical(PhysicalOp::Offer {
        exchange,
        source: crate::resolution::VariableId(0),
    }));
    let offer_right = steps.insert(StepKind::Physical(PhysicalOp::Offer {
        exchange,
        source: crate::resolution::VariableId(0),
    }));
    steps.connect(offer_left, exchange);
    steps.connect(offer_right, exchange);
    let take = steps.insert(StepKind::Physical(PhysicalOp::TakeGroup { exchange }));
    steps.connect(exchange, take);
    let flatten = steps.insert(StepKind::Physical(PhysicalOp::Flatten));
    steps.connect(take, flatten);
    flatten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expression::{ExpressionKind, Literal, ScalarExpression};
    use crate::ir::relation::AggregateColumn;
    use crate::resolution::{NodeId as ExprNodeId, VariableId};
    use std::sync::Arc;

    #[test]
    fn non_incremental_aggregate_lowers_to_group_then_aggregate_group() {
        let mut graph = Graph::new();
        graph.insert(RelationOp::Aggregate {
            keys: vec![VariableId(1)],
            columns: vec![AggregateColumn {
                variable: VariableId(2),
                aggregation: Arc::new(ScalarExpression::new(
                    ExprNodeId(1),
                    ExpressionKind::Literal(Literal::Int(0)),
                )),
            }],
            incremental: false,
        });
        let mut steps = StepGraph::new();
        collect_steps(&graph, &mut steps);
        assert!(steps.step_count() >= 3);
    }

    #[test]
    fn distinct_lowers_to_equivalence_group() {
        let mut graph = Graph::new();
        graph.insert(RelationOp::Distinct {
            columns: vec![VariableId(1)],
        });
        let mut steps = StepGraph::new();
        let mapping = collect_steps(&graph, &mut steps);
        assert_eq!(mapping.len(), 1);
        assert!(steps.step_count() >= 3);
    }

    #[test]
    fn limit_with_no_keys_lowers_to_plain_forward() {
        let mut graph = Graph::new();
        graph.insert(RelationOp::Limit {
            count: 10,
            group_keys: vec![],
            sort_keys: vec![],
        });
        let mut steps = StepGraph::new();
        collect_steps(&graph, &mut steps);
        assert_eq!(steps.step_count(), 2);
    }
}
