//! Join-to-`join_find` rewrite against an injected unique index.

use std::sync::Arc;
use yugawara::ir::expression::{BinaryOp, ExpressionKind, ScalarExpression};
use yugawara::ir::graph::Graph;
use yugawara::ir::relation::{Column, JoinKind, RelationOp};
use yugawara::provider::{
    ConfigurableStorageProvider, Index, IndexEstimate, IndexEstimator, IndexKind,
    InMemoryStorageProvider, KeyRange, Table,
};
use yugawara::resolution::{NodeId, VariableId};
use yugawara::rewrite::{join::rewrite_joins, RewriteOptions};
use yugawara::types::Type;

struct FlatEstimator;
impl IndexEstimator for FlatEstimator {
    fn estimate(
        &self,
        _index: &Index,
        _key_ranges: &[KeyRange],
        _residual: usize,
        _ordered: bool,
    ) -> IndexEstimate {
        IndexEstimate {
            row_count: 1,
            score: 1.0,
            index_only: false,
        }
    }
}

fn var_ref(id: u64, v: u64) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(
        NodeId(id),
        ExpressionKind::VariableReference(VariableId(v)),
    ))
}

#[test]
fn inner_join_rewrites_to_join_find_against_unique_index() {
    let provider = InMemoryStorageProvider::new();
    provider
        .add_relation(
            Table {
                name: Arc::from("orders"),
                columns: vec![(Arc::from("customer_id"), Type::Int4)],
            },
            false,
        )
        .unwrap();
    provider
        .add_index(
            Index {
                name: Arc::from("orders_by_customer"),
                table: Arc::from("orders"),
                kind: IndexKind::Unique,
                key_columns: vec![Arc::from("customer_id")],
                index_only: false,
            },
            false,
        )
        .unwrap();

    let mut graph = Graph::new();
    let left = graph.insert(RelationOp::Scan {
        table: Arc::from("customers"),
        columns: vec![Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("id"))],
    });
    let right = graph.insert(RelationOp::Scan {
        table: Arc::from("orders"),
        columns: vec![Column::table_column(
            VariableId(2),
            var_ref(2, 2),
            Arc::from("customer_id"),
        )],
    });
    let join = graph.insert(RelationOp::Join {
        kind: JoinKind::Inner,
        condition: Arc::new(ScalarExpression::new(
            NodeId(3),
            ExpressionKind::Binary {
                op: BinaryOp::Equal,
                left: var_ref(4, 1),
                right: var_ref(5, 2),
            },
        )),
    });
    graph.connect(left, join).unwrap();
    graph.connect(right, join).unwrap();

    rewrite_joins(&mut graph, &provider, &FlatEstimator, RewriteOptions::default());

    assert!(matches!(graph.get(join).unwrap().op, RelationOp::JoinFind { .. }));
}

#[test]
fn full_outer_join_is_never_rewritten() {
    let provider = InMemoryStorageProvider::new();
    provider
        .add_index(
            Index {
                name: Arc::from("orders_by_customer"),
                table: Arc::from("orders"),
                kind: IndexKind::Unique,
                key_columns: vec![Arc::from("customer_id")],
                index_only: false,
            },
            false,
        )
        .unwrap();

    let mut graph = Graph::new();
    let left = graph.insert(RelationOp::Scan {
        table: Arc::from("customers"),
        columns: vec![Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("id"))],
    });
    let right = graph.insert(RelationOp::Scan {
        table: Arc::from("orders"),
        columns: vec![Column::table_column(
            VariableId(2),
            var_ref(2, 2),
            Arc::from("customer_id"),
        )],
    });
    let join = graph.insert(RelationOp::Join {
        kind: JoinKind::FullOuter,
        condition: Arc::new(ScalarExpression::new(
            NodeId(3),
            ExpressionKind::Binary {
                op: BinaryOp::Equal,
                left: var_ref(4, 1),
                right: var_ref(5, 2),
            },
        )),
    });
    graph.connect(left, join).unwrap();
    graph.connect(right, join).unwrap();

    rewrite_joins(&mut graph, &provider, &FlatEstimator, RewriteOptions::default());

    assert!(matches!(graph.get(join).unwrap().op, RelationOp::Join { .. }));
}
