//! `yugawara-inspect`: runs `driver::inspect` against an in-memory storage
//! provider and prints the resolved types, for ad-hoc debugging of a
//! hand-built operator graph. Not a query language front end — building
//! the graph is left to library callers.

use tracing_subscriber::EnvFilter;
use yugawara::ir::expression::{ExpressionKind, Literal, ScalarExpression};
use yugawara::ir::graph::Graph;
use yugawara::ir::relation::{Column, RelationOp};
use yugawara::provider::InMemoryStorageProvider;
use yugawara::resolution::{NodeId, VariableId};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let provider = InMemoryStorageProvider::new();
    let mut graph = Graph::new();
    graph.insert(RelationOp::Scan {
        table: std::sync::Arc::from("example"),
        columns: vec![Column::computed(
            VariableId(1),
            std::sync::Arc::new(ScalarExpression::new(
                NodeId(1),
                ExpressionKind::Literal(Literal::Int(1)),
            )),
        )],
    });

    struct ZeroEstimator;
    impl yugawara::provider::IndexEstimator for ZeroEstimator {
        fn estimate(
            &self,
            _index: &yugawara::provider::Index,
            _key_ranges: &[yugawara::provider::KeyRange],
            _residual: usize,
            _ordered: bool,
        ) -> yugawara::provider::IndexEstimate {
            yugawara::provider::IndexEstimate {
                row_count: 0,
                score: 0.0,
                index_only: false,
            }
        }
    }
    let estimator = ZeroEstimator;

    let options = yugawara::CompilerOptions {
        storage_provider: &provider,
        index_estimator: &estimator,
        runtime_features: yugawara::driver::RuntimeFeatures::default(),
        join_scan_enabled: true,
        allow_unresolved: true,
    };

    match yugawara::inspect(&options, &graph) {
        Ok(info) => {
            println!("plan {} compiled at {}", info.plan_id, info.compiled_at);
            println!(
                "resolved variable 1: {:?}",
                info.type_of_variable(VariableId(1))
            );
        }
        Err(diagnostics) => {
            for d in &diagnostics {
                match d.to_json() {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("{d}"),
                }
            }
            std::process::exit(1);
        }
    }
}
