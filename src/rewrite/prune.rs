//! Stream column pruning (§4.x): drop stream-variable columns that no
//! downstream consumer ever reads, so blocks/liveness and the step
//! collector never carry dead columns through the rest of the pipeline.
//! Mirrors the original analyzer's redundant-stream-variable removal, with
//! `scan`/`find`/`index_scan`/`project`/`aggregate` as the column-defining
//! operators subject to pruning and everything else passed through.

use crate::ir::graph::{Graph, NodeId};
use crate::ir::relation::{AggregateColumn, Column, RangeEndpoint, RelationOp};
use crate::resolution::VariableId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Prune every `Scan`/`Find`/`IndexScan`/`Project`/`Aggregate` node's column
/// list down to the variables some downstream consumer actually needs,
/// propagating demand backward from the graph's sinks. A node with no
/// consumer (the graph's own output) keeps every column it defines — there
/// is nothing downstream to tell us otherwise.
pub fn prune_unused_columns(graph: &mut Graph) {
    let order = reverse_topo_order(graph);
    let mut required: HashMap<NodeId, HashSet<VariableId>> = HashMap::new();
    let mut rewrites: Vec<(NodeId, RelationOp)> = Vec::new();

    for id in &order {
        let Some(node) = graph.get(*id) else { continue };
        let consumers_required: HashSet<VariableId> = node
            .outputs
            .iter()
            .flat_map(|o| required.get(o).cloned().unwrap_or_default())
            .collect();
        let is_sink = node.outputs.is_empty();
        let (new_op, own_required) = prune_node(&node.op, &consumers_required, is_sink);
        required.insert(*id, own_required);
        rewrites.push((*id, new_op));
    }

    for (id, op) in rewrites {
        let _ = graph.replace_op(id, op);
    }
}

/// Post-order traversal over each node's `outputs` edges: a node is only
/// pushed once every consumer reachable from it has already been visited,
/// so reading this order left to right processes sinks before their
/// ancestors.
fn reverse_topo_order(graph: &Graph) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for start in graph.node_ids() {
        visit(graph, start, &mut visited, &mut order);
    }
    order
}

fn visit(graph: &Graph, id: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
    if !visited.insert(id) {
        return;
    }
    if let Some(node) = graph.get(id) {
        for &next in &node.outputs {
            visit(graph, next, visited, order);
        }
    }
    order.push(id);
}

fn prune_node(
    op: &RelationOp,
    consumers_required: &HashSet<VariableId>,
    is_sink: bool,
) -> (RelationOp, HashSet<VariableId>) {
    match op {
        RelationOp::Scan { table, columns } => {
            let (kept, required) = prune_columns(columns, consumers_required, is_sink);
            (
                RelationOp::Scan {
                    table: table.clone(),
                    columns: kept,
                },
                required,
            )
        }
        RelationOp::Find { index, key, columns } => {
            let (kept, mut required) = prune_columns(columns, consumers_required, is_sink);
            for k in key {
                required.extend(k.variable_references());
            }
            (
                RelationOp::Find {
                    index: index.clone(),
                    key: key.clone(),
                    columns: kept,
                },
                required,
            )
        }
        RelationOp::IndexScan {
            index,
            lower,
            upper,
            columns,
        } => {
            let (kept, mut required) = prune_columns(columns, consumers_required, is_sink);
            for endpoint in [lower, upper] {
                if let Some(e) = endpoint_expr(endpoint) {
                    required.extend(e.variable_references());
                }
            }
            (
                RelationOp::IndexScan {
                    index: index.clone(),
                    lower: lower.clone(),
                    upper: upper.clone(),
                    columns: kept,
                },
                required,
            )
        }
        RelationOp::Project { columns } => {
            let (kept, required) = prune_columns(columns, consumers_required, is_sink);
            (RelationOp::Project { columns: kept }, required)
        }
        RelationOp::Aggregate {
            keys,
            columns,
            incremental,
        } => {
            let defined: HashSet<VariableId> = columns.iter().map(|c| c.variable).collect();
            let needed_defined: HashSet<VariableId> = if is_sink {
                defined
            } else {
                columns
                    .iter()
                    .map(|c| c.variable)
                    .filter(|v| consumers_required.contains(v))
                    .collect()
            };
            let kept: Vec<AggregateColumn> = columns
                .iter()
                .filter(|c| needed_defined.contains(&c.variable))
                .cloned()
                .collect();
            let mut required: HashSet<VariableId> = keys.iter().copied().collect();
            for c in &kept {
                required.extend(c.aggregation.variable_references());
            }
            (
                RelationOp::Aggregate {
                    keys: keys.clone(),
                    columns: kept,
                    incremental: *incremental,
                },
                required,
            )
        }
        other => (
            other.clone(),
            passthrough_required(other, consumers_required),
        ),
    }
}

fn endpoint_expr(endpoint: &RangeEndpoint) -> Option<&Arc<crate::ir::expression::ScalarExpression>> {
    match endpoint {
        RangeEndpoint::Infinity => None,
        RangeEndpoint::Inclusive(e) | RangeEndpoint::Exclusive(e) => Some(e),
    }
}

/// Every non-column-defining operator passes whatever its consumers need
/// straight through to its own inputs, adding in whatever it reads itself.
fn passthrough_required(
    op: &RelationOp,
    consumers_required: &HashSet<VariableId>,
) -> HashSet<VariableId> {
    let mut required = consumers_required.clone();
    required.extend(crate::block::used_variables(op));
    required
}

/// Fixed-point column pruning shared by `scan`/`find`/`index_scan`/
/// `project`: start from the variables needed from above (or, for a sink,
/// every column this node defines), then pull in whatever each surviving
/// column's own value expression references — including references to
/// other columns defined by this same node (`project` chaining onto its
/// own earlier columns). Returns the pruned column list and the set of
/// variables it still needs from its own inputs.
fn prune_columns(
    columns: &[Column],
    consumers_required: &HashSet<VariableId>,
    is_sink: bool,
) -> (Vec<Column>, HashSet<VariableId>) {
    let defined: HashSet<VariableId> = columns.iter().map(|c| c.variable).collect();
    let mut needed: HashSet<VariableId> = if is_sink {
        defined.clone()
    } else {
        consumers_required.clone()
    };

    loop {
        let mut changed = false;
        for c in columns {
            if needed.contains(&c.variable) {
                for v in c.value.variable_references() {
                    if needed.insert(v) {
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    let kept: Vec<Column> = columns
        .iter()
        .filter(|c| needed.contains(&c.variable))
        .cloned()
        .collect();

    let refs: HashSet<VariableId> = kept
        .iter()
        .flat_map(|c| c.value.variable_references())
        .collect();
    let required_from_above: HashSet<VariableId> = refs.difference(&defined).copied().collect();

    (kept, required_from_above)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
    use crate::resolution::NodeId as ExprNodeId;

    fn var_ref(id: u64, var: u64) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            ExprNodeId(id),
            ExpressionKind::VariableReference(VariableId(var)),
        ))
    }

    fn int_lit(id: u64, value: i64) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            ExprNodeId(id),
            ExpressionKind::Literal(Literal::Int(value)),
        ))
    }

    fn add(id: u64, left: Arc<ScalarExpression>, right: Arc<ScalarExpression>) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            ExprNodeId(id),
            ExpressionKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            },
        ))
    }

    #[test]
    fn scan_feeding_a_narrower_project_drops_unread_columns() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t0"),
            columns: vec![
                Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("c0")),
                Column::table_column(VariableId(2), var_ref(2, 2), Arc::from("c1")),
                Column::table_column(VariableId(3), var_ref(3, 3), Arc::from("c2")),
            ],
        });
        let project = graph.insert(RelationOp::Project {
            columns: vec![Column::computed(VariableId(10), var_ref(10, 2))],
        });
        graph.connect(scan, project).unwrap();

        prune_unused_columns(&mut graph);

        let RelationOp::Scan { columns, .. } = &graph.get(scan).unwrap().op else {
            panic!("expected scan");
        };
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].variable, VariableId(2));
    }

    #[test]
    fn project_chain_keeps_only_columns_reachable_from_the_sink() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t0"),
            columns: vec![
                Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("c0")),
                Column::table_column(VariableId(2), var_ref(2, 2), Arc::from("c1")),
                Column::table_column(VariableId(3), var_ref(3, 3), Arc::from("c2")),
            ],
        });
        // x0 = c0 + 1 (dead: nothing downstream references x0)
        // x1 = c1 + 2
        // x2 = c2 + x1
        // x3 = 3
        let project = graph.insert(RelationOp::Project {
            columns: vec![
                Column::computed(VariableId(20), add(20, var_ref(21, 1), int_lit(22, 1))),
                Column::computed(VariableId(23), add(23, var_ref(24, 2), int_lit(25, 2))),
                Column::computed(
                    VariableId(26),
                    add(26, var_ref(27, 3), var_ref(28, 23)),
                ),
                Column::computed(VariableId(29), int_lit(29, 3)),
            ],
        });
        // the terminal consumer only reads x2 and x3
        let sink = graph.insert(RelationOp::Project {
            columns: vec![
                Column::computed(VariableId(40), var_ref(40, 26)),
                Column::computed(VariableId(41), var_ref(41, 29)),
            ],
        });
        graph.connect(scan, project).unwrap();
        graph.connect(project, sink).unwrap();

        prune_unused_columns(&mut graph);

        let RelationOp::Scan { columns, .. } = &graph.get(scan).unwrap().op else {
            panic!("expected scan");
        };
        let scan_vars: HashSet<_> = columns.iter().map(|c| c.variable).collect();
        assert_eq!(scan_vars, HashSet::from([VariableId(2), VariableId(3)]));

        let RelationOp::Project { columns, .. } = &graph.get(project).unwrap().op else {
            panic!("expected project");
        };
        let project_vars: HashSet<_> = columns.iter().map(|c| c.variable).collect();
        assert_eq!(
            project_vars,
            HashSet::from([VariableId(23), VariableId(26), VariableId(29)])
        );
    }

    #[test]
    fn aggregate_drops_unread_aggregations_but_keeps_group_keys() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t0"),
            columns: vec![
                Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("c0")),
                Column::table_column(VariableId(2), var_ref(2, 2), Arc::from("c1")),
                Column::table_column(VariableId(3), var_ref(3, 3), Arc::from("c2")),
            ],
        });
        let aggregate = graph.insert(RelationOp::Aggregate {
            keys: vec![VariableId(1)],
            columns: vec![
                AggregateColumn {
                    variable: VariableId(50),
                    aggregation: var_ref(50, 2),
                },
                AggregateColumn {
                    variable: VariableId(51),
                    aggregation: var_ref(51, 3),
                },
            ],
            incremental: true,
        });
        let sink = graph.insert(RelationOp::Project {
            columns: vec![Column::computed(VariableId(60), var_ref(60, 51))],
        });
        graph.connect(scan, aggregate).unwrap();
        graph.connect(aggregate, sink).unwrap();

        prune_unused_columns(&mut graph);

        let RelationOp::Aggregate { columns, keys, .. } = &graph.get(aggregate).unwrap().op else {
            panic!("expected aggregate");
        };
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].variable, VariableId(51));
        assert_eq!(keys, &vec![VariableId(1)]);

        let RelationOp::Scan { columns, .. } = &graph.get(scan).unwrap().op else {
            panic!("expected scan");
        };
        let scan_vars: HashSet<_> = columns.iter().map(|c| c.variable).collect();
        assert_eq!(scan_vars, HashSet::from([VariableId(1), VariableId(3)]));
    }

    #[test]
    fn terminal_project_keeps_every_column_it_defines() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t0"),
            columns: vec![Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("c0"))],
        });
        let project = graph.insert(RelationOp::Project {
            columns: vec![Column::computed(VariableId(10), var_ref(10, 1))],
        });
        graph.connect(scan, project).unwrap();

        prune_unused_columns(&mut graph);

        let RelationOp::Project { columns, .. } = &graph.get(project).unwrap().op else {
            panic!("expected project");
        };
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].variable, VariableId(10));
    }
}
