//! Disjunction-to-range widening: a column compared against several
//! immediates in an OR chain collapses to the covering interval, and a
//! mismatched variable/immediate pair across branches widens to infinity.

use std::sync::Arc;
use yugawara::ir::expression::{ExpressionKind, Literal, ScalarExpression};
use yugawara::predicate::decompose_disjunction_into_range;
use yugawara::predicate::range::{Bound, BoundValue};
use yugawara::predicate::RangeBranch;
use yugawara::resolution::{NodeId, VariableId};
use yugawara::ir::expression::BinaryOp;

fn imm(id: u64, n: i64) -> BoundValue {
    BoundValue::Immediate(Arc::new(ScalarExpression::new(
        NodeId(id),
        ExpressionKind::Literal(Literal::Int(n)),
    )))
}

#[test]
fn three_way_or_on_equality_widens_to_covering_interval() {
    let branches = vec![
        RangeBranch {
            variable: VariableId(1),
            bound: imm(1, 5),
            op: BinaryOp::Equal,
        },
        RangeBranch {
            variable: VariableId(1),
            bound: imm(2, 10),
            op: BinaryOp::Equal,
        },
        RangeBranch {
            variable: VariableId(1),
            bound: imm(3, 1),
            op: BinaryOp::Equal,
        },
    ];
    let (variable, lower, upper) = decompose_disjunction_into_range(&branches).unwrap();
    assert_eq!(variable, VariableId(1));
    assert_eq!(lower, Bound::Inclusive(imm(4, 1)));
    assert_eq!(upper, Bound::Inclusive(imm(5, 10)));
}

#[test]
fn mismatched_variable_across_branches_is_rejected() {
    let branches = vec![
        RangeBranch {
            variable: VariableId(1),
            bound: imm(1, 5),
            op: BinaryOp::LessThanOrEqual,
        },
        RangeBranch {
            variable: VariableId(2),
            bound: imm(2, 10),
            op: BinaryOp::LessThanOrEqual,
        },
    ];
    assert!(decompose_disjunction_into_range(&branches).is_none());
}

#[test]
fn variable_endpoint_mixed_with_immediate_widens_to_infinity() {
    let branches = vec![
        RangeBranch {
            variable: VariableId(1),
            bound: imm(1, 5),
            op: BinaryOp::GreaterThanOrEqual,
        },
        RangeBranch {
            variable: VariableId(1),
            bound: BoundValue::Variable(VariableId(9)),
            op: BinaryOp::GreaterThanOrEqual,
        },
    ];
    let (_, lower, _upper) = decompose_disjunction_into_range(&branches).unwrap();
    assert_eq!(lower, Bound::Infinity);
}
