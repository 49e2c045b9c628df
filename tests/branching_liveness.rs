//! A scan feeding two independent downstream consumers (fan-out):
//! verifies the variable used only on one branch is killed there and the
//! scan's own block is distinct from both.

use std::sync::Arc;
use yugawara::block::build_blocks;
use yugawara::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
use yugawara::ir::graph::Graph;
use yugawara::ir::relation::{Column, RelationOp};
use yugawara::resolution::{NodeId, VariableId};

fn var_ref(id: u64, v: u64) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(
        NodeId(id),
        ExpressionKind::VariableReference(VariableId(v)),
    ))
}

fn lit(id: u64, n: i64) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(
        NodeId(id),
        ExpressionKind::Literal(Literal::Int(n)),
    ))
}

#[test]
fn variable_used_on_only_one_branch_is_killed_there() {
    let mut graph = Graph::new();
    let scan = graph.insert(RelationOp::Scan {
        table: Arc::from("accounts"),
        columns: vec![Column::table_column(
            VariableId(1),
            var_ref(1, 1),
            Arc::from("balance"),
        )],
    });
    let left = graph.insert(RelationOp::Filter {
        condition: Arc::new(ScalarExpression::new(
            NodeId(2),
            ExpressionKind::Binary {
                op: BinaryOp::GreaterThan,
                left: var_ref(3, 1),
                right: lit(4, 0),
            },
        )),
    });
    let right = graph.insert(RelationOp::Distinct { columns: vec![] });
    graph.connect(scan, left).unwrap();
    graph.connect(scan, right).unwrap();

    let blocks = build_blocks(&graph);

    let scan_block = blocks.owner_of(scan).unwrap();
    let left_block = blocks.owner_of(left).unwrap();
    let right_block = blocks.owner_of(right).unwrap();
    assert_ne!(scan_block, left_block);
    assert_ne!(scan_block, right_block);
    assert_ne!(left_block, right_block);

    let left_b = blocks.get(left_block).unwrap();
    assert!(left_b.r#use.contains(&VariableId(1)));
    assert!(!left_b.kill.contains(&VariableId(1)));

    let right_b = blocks.get(right_block).unwrap();
    assert!(!right_b.r#use.contains(&VariableId(1)));
    assert!(right_b.kill.contains(&VariableId(1)));
}

#[test]
fn variable_dead_on_arrival_is_killed_at_its_own_definition() {
    let mut graph = Graph::new();
    let scan = graph.insert(RelationOp::Scan {
        table: Arc::from("accounts"),
        columns: vec![
            Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("balance")),
            Column::computed(VariableId(2), lit(2, 0)),
        ],
    });
    let project = graph.insert(RelationOp::Project {
        columns: vec![Column::computed(VariableId(3), var_ref(3, 1))],
    });
    graph.connect(scan, project).unwrap();

    let blocks = build_blocks(&graph);
    let block_id = blocks.owner_of(scan).unwrap();
    assert_eq!(block_id, blocks.owner_of(project).unwrap());

    let block = blocks.get(block_id).unwrap();
    assert!(block.define.contains(&VariableId(2)));
    assert!(!block.r#use.contains(&VariableId(2)));
    assert!(block.kill.contains(&VariableId(2)));
}

#[test]
fn block_count_never_exceeds_node_count_on_fan_out() {
    let mut graph = Graph::new();
    let scan = graph.insert(RelationOp::Scan {
        table: Arc::from("t"),
        columns: vec![Column::computed(VariableId(1), lit(1, 1))],
    });
    let a = graph.insert(RelationOp::Filter {
        condition: lit(2, 1),
    });
    let b = graph.insert(RelationOp::Filter {
        condition: lit(3, 1),
    });
    let c = graph.insert(RelationOp::Distinct { columns: vec![] });
    graph.connect(scan, a).unwrap();
    graph.connect(scan, b).unwrap();
    graph.connect(a, c).unwrap();
    graph.connect(b, c).unwrap();

    let blocks = build_blocks(&graph);
    assert!(blocks.block_count() <= graph.node_count());
    assert!(graph.is_branch_point(c));
}
