//! Scan-to-`find`/`index_scan` rewrite against an in-memory storage
//! provider and a deterministic index estimator.

use std::sync::Arc;
use yugawara::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
use yugawara::ir::graph::Graph;
use yugawara::ir::relation::{Column, RelationOp};
use yugawara::provider::{
    ConfigurableStorageProvider, Index, IndexEstimate, IndexEstimator, IndexKind,
    InMemoryStorageProvider, KeyRange, Table,
};
use yugawara::resolution::{NodeId, VariableId};
use yugawara::rewrite::{scan::rewrite_scans, RewriteOptions};
use yugawara::types::Type;

struct PreferPrimary;
impl IndexEstimator for PreferPrimary {
    fn estimate(
        &self,
        index: &Index,
        _key_ranges: &[KeyRange],
        _residual: usize,
        _ordered: bool,
    ) -> IndexEstimate {
        match index.kind {
            IndexKind::Primary => IndexEstimate {
                row_count: 1,
                score: 100.0,
                index_only: false,
            },
            _ => IndexEstimate {
                row_count: 1000,
                score: 1.0,
                index_only: false,
            },
        }
    }
}

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
fn equality_on_primary_key_becomes_a_point_lookup() {
    let provider = InMemoryStorageProvider::new();
    provider
        .add_relation(
            Table {
                name: Arc::from("accounts"),
                columns: vec![(Arc::from("id"), Type::Int4)],
            },
            false,
        )
        .unwrap();
    provider
        .add_index(
            Index {
                name: Arc::from("accounts_pk"),
                table: Arc::from("accounts"),
                kind: IndexKind::Primary,
                key_columns: vec![Arc::from("id")],
                index_only: false,
            },
            false,
        )
        .unwrap();

    let mut graph = Graph::new();
    let scan = graph.insert(RelationOp::Scan {
        table: Arc::from("accounts"),
        columns: vec![Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("id"))],
    });
    let filter = graph.insert(RelationOp::Filter {
        condition: Arc::new(ScalarExpression::new(
            NodeId(2),
            ExpressionKind::Binary {
                op: BinaryOp::Equal,
                left: var_ref(3, 1),
                right: lit(4, 42),
            },
        )),
    });
    graph.connect(scan, filter).unwrap();

    rewrite_scans(&mut graph, &provider, &PreferPrimary, RewriteOptions::default());

    assert!(matches!(graph.get(scan).unwrap().op, RelationOp::Find { .. }));

    match &graph.get(filter).unwrap().op {
        RelationOp::Filter { condition } => {
            assert!(matches!(
                condition.kind,
                ExpressionKind::Literal(Literal::Boolean(true))
            ));
        }
        other => panic!("expected filter to survive as a no-op, got {other:?}"),
    }
}

#[test]
fn range_predicate_becomes_an_index_scan() {
    let provider = InMemoryStorageProvider::new();
    provider
        .add_relation(
            Table {
                name: Arc::from("events"),
                columns: vec![(Arc::from("ts"), Type::Int8)],
            },
            false,
        )
        .unwrap();
    provider
        .add_index(
            Index {
                name: Arc::from("events_by_ts"),
                table: Arc::from("events"),
                kind: IndexKind::Ordered,
                key_columns: vec![Arc::from("ts")],
                index_only: false,
            },
            false,
        )
        .unwrap();

    let mut graph = Graph::new();
    let scan = graph.insert(RelationOp::Scan {
        table: Arc::from("events"),
        columns: vec![Column::table_column(VariableId(1), var_ref(1, 1), Arc::from("ts"))],
    });
    let filter = graph.insert(RelationOp::Filter {
        condition: Arc::new(ScalarExpression::new(
            NodeId(2),
            ExpressionKind::Binary {
                op: BinaryOp::GreaterThanOrEqual,
                left: var_ref(3, 1),
                right: lit(4, 1000),
            },
        )),
    });
    graph.connect(scan, filter).unwrap();

    struct OnlyOrdered;
    impl IndexEstimator for OnlyOrdered {
        fn estimate(
            &self,
            _index: &Index,
            _key_ranges: &[KeyRange],
            _residual: usize,
            _ordered: bool,
        ) -> IndexEstimate {
            IndexEstimate {
                row_count: 50,
                score: 5.0,
                index_only: false,
            }
        }
    }

    rewrite_scans(&mut graph, &provider, &OnlyOrdered, RewriteOptions::default());

    assert!(matches!(
        graph.get(scan).unwrap().op,
        RelationOp::IndexScan { .. }
    ));
}
