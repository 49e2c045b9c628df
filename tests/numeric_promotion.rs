//! End-to-end numeric promotion through the analyzer: a binary expression
//! over mixed integer/decimal/float operands resolves to the promoted
//! type, not either operand's original type.

use std::sync::Arc;
use yugawara::analyzer::Analyzer;
use yugawara::diagnostics::DiagnosticSink;
use yugawara::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
use yugawara::resolution::{ExpressionMapping, NodeId, VariableId, VariableMapping, VariableResolution};
use yugawara::types::Type;

fn lit_int(id: u64, n: i64) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(
        NodeId(id),
        ExpressionKind::Literal(Literal::Int(n)),
    ))
}

#[test]
fn int_plus_decimal_column_promotes_to_decimal() {
    let mut variables = VariableMapping::new();
    variables.bind(
        VariableId(1),
        VariableResolution::TableColumn {
            table: Arc::from("ledger"),
            column: Arc::from("amount"),
            r#type: Type::decimal(Some(10), Some(2)).unwrap(),
        },
        false,
    );
    let mut expressions = ExpressionMapping::new();
    let mut diagnostics = DiagnosticSink::new();
    let mut analyzer = Analyzer {
        variables: &mut variables,
        expressions: &mut expressions,
        diagnostics: &mut diagnostics,
        allow_unresolved: false,
    };

    let column_ref = Arc::new(ScalarExpression::new(
        NodeId(2),
        ExpressionKind::VariableReference(VariableId(1)),
    ));
    let expr = ScalarExpression::new(
        NodeId(3),
        ExpressionKind::Binary {
            op: BinaryOp::Add,
            left: lit_int(4, 7),
            right: column_ref,
        },
    );

    let resolved = analyzer.resolve_scalar(&expr);
    assert_eq!(resolved, Type::decimal(Some(10), Some(2)).unwrap());
    assert!(!diagnostics.has_errors());
}

#[test]
fn int8_and_float4_promote_to_float8() {
    let mut variables = VariableMapping::new();
    let mut expressions = ExpressionMapping::new();
    let mut diagnostics = DiagnosticSink::new();
    let mut analyzer = Analyzer {
        variables: &mut variables,
        expressions: &mut expressions,
        diagnostics: &mut diagnostics,
        allow_unresolved: false,
    };

    let expr = ScalarExpression::new(
        NodeId(1),
        ExpressionKind::Cast {
            target: Type::Float4,
            operand: lit_int(2, 9_000_000_000),
        },
    );
    let float_side = analyzer.resolve_scalar(&expr);
    assert_eq!(float_side, Type::Float4);

    let mixed = ScalarExpression::new(
        NodeId(3),
        ExpressionKind::Binary {
            op: BinaryOp::Add,
            left: Arc::new(expr),
            right: lit_int(4, 1),
        },
    );
    let resolved = analyzer.resolve_scalar(&mixed);
    assert_eq!(resolved, Type::Float8);
}
