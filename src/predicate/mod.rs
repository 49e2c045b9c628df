//! Predicate toolkit (C4): conjunction decomposition, three-valued
//! simplification, local-variable inlining, and disjunction-to-range
//! widening.

pub mod range;

use crate::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression, UnaryOp};
use crate::resolution::{NodeId, VariableId};
use range::{Bound, BoundValue, RangeHintMap};
use std::collections::HashMap;
use std::sync::Arc;

/// The three-valued-logic outcome of [`simplify`]. `NotSure` means the
/// expression could not be reduced to a constant at all (e.g. it contains
/// a variable whose value isn't known at rewrite time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplified {
    ConstantTrue,
    ConstantFalse,
    ConstantUnknown,
    ConstantTrueOrUnknown,
    ConstantFalseOrUnknown,
    NotSure,
}

impl Simplified {
    fn not(self) -> Simplified {
        match self {
            Simplified::ConstantTrue => Simplified::ConstantFalse,
            Simplified::ConstantFalse => Simplified::ConstantTrue,
            Simplified::ConstantUnknown => Simplified::ConstantUnknown,
            Simplified::ConstantTrueOrUnknown => Simplified::ConstantFalseOrUnknown,
            Simplified::ConstantFalseOrUnknown => Simplified::ConstantTrueOrUnknown,
            Simplified::NotSure => Simplified::NotSure,
        }
    }

    fn and(self, other: Simplified) -> Simplified {
        use Simplified::*;
        match (self, other) {
            (ConstantFalse, _) | (_, ConstantFalse) => ConstantFalse,
            (ConstantTrue, x) | (x, ConstantTrue) => x,
            (ConstantUnknown, NotSure) | (NotSure, ConstantUnknown) => ConstantFalseOrUnknown,
            (ConstantUnknown, ConstantUnknown) => ConstantUnknown,
            (NotSure, NotSure) => NotSure,
            (ConstantUnknown, ConstantTrueOrUnknown)
            | (ConstantTrueOrUnknown, ConstantUnknown) => ConstantUnknown,
            (ConstantUnknown, ConstantFalseOrUnknown)
            | (ConstantFalseOrUnknown, ConstantUnknown) => ConstantFalseOrUnknown,
            (ConstantTrueOrUnknown, ConstantTrueOrUnknown) => ConstantTrueOrUnknown,
            (ConstantFalseOrUnknown, _) | (_, ConstantFalseOrUnknown) => ConstantFalseOrUnknown,
            (ConstantTrueOrUnknown, NotSure) | (NotSure, ConstantTrueOrUnknown) => NotSure,
        }
    }

    fn or(self, other: Simplified) -> Simplified {
        use Simplified::*;
        match (self, other) {
            (ConstantTrue, _) | (_, ConstantTrue) => ConstantTrue,
            (ConstantFalse, x) | (x, ConstantFalse) => x,
            (ConstantUnknown, NotSure) | (NotSure, ConstantUnknown) => ConstantTrueOrUnknown,
            (ConstantUnknown, ConstantUnknown) => ConstantUnknown,
            (NotSure, NotSure) => NotSure,
            (ConstantUnknown, ConstantFalseOrUnknown)
            | (ConstantFalseOrUnknown, ConstantUnknown) => ConstantUnknown,
            (ConstantUnknown, ConstantTrueOrUnknown)
            | (ConstantTrueOrUnknown, ConstantUnknown) => ConstantTrueOrUnknown,
            (ConstantFalseOrUnknown, ConstantFalseOrUnknown) => ConstantFalseOrUnknown,
            (ConstantTrueOrUnknown, _) | (_, ConstantTrueOrUnknown) => ConstantTrueOrUnknown,
            (ConstantFalseOrUnknown, NotSure) | (NotSure, ConstantFalseOrUnknown) => NotSure,
        }
    }
}

/// `decompose_conjunctions`: flatten a tree of `AND` into a sequence,
/// preserving source order.
pub fn decompose_conjunctions(expr: &Arc<ScalarExpression>) -> Vec<Arc<ScalarExpression>> {
    let mut out = Vec::new();
    flatten(expr, &mut out);
    out
}

fn flatten(expr: &Arc<ScalarExpression>, out: &mut Vec<Arc<ScalarExpression>>) {
    match &expr.kind {
        ExpressionKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            flatten(left, out);
            flatten(right, out);
        }
        ExpressionKind::Conjunction(terms) => {
            for t in terms {
                flatten(t, out);
            }
        }
        _ => out.push(expr.clone()),
    }
}

/// `simplify_predicate`: evaluate a three-valued-logic expression.
/// Expressions that aren't AND/OR/NOT/IS-* at the top, or that reference a
/// variable, reduce to [`Simplified::NotSure`].
pub fn simplify(expr: &ScalarExpression) -> Simplified {
    match &expr.kind {
        ExpressionKind::Literal(Literal::Boolean(true)) => Simplified::ConstantTrue,
        ExpressionKind::Literal(Literal::Boolean(false)) => Simplified::ConstantFalse,
        ExpressionKind::Literal(Literal::Null) => Simplified::ConstantUnknown,
        ExpressionKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => simplify(left).and(simplify(right)),
        ExpressionKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => simplify(left).or(simplify(right)),
        ExpressionKind::Conjunction(terms) => terms
            .iter()
            .map(|t| simplify(t))
            .fold(Simplified::ConstantTrue, Simplified::and),
        ExpressionKind::Disjunction(terms) => terms
            .iter()
            .map(|t| simplify(t))
            .fold(Simplified::ConstantFalse, Simplified::or),
        ExpressionKind::Unary { op, operand } => simplify_unary(*op, simplify(operand)),
        _ => Simplified::NotSure,
    }
}

fn simplify_unary(op: UnaryOp, operand: Simplified) -> Simplified {
    use Simplified::*;
    match op {
        UnaryOp::Not => operand.not(),
        UnaryOp::IsNull => match operand {
            ConstantTrue | ConstantFalse => ConstantFalse,
            ConstantUnknown => ConstantTrue,
            NotSure => NotSure,
            ConstantTrueOrUnknown | ConstantFalseOrUnknown => NotSure,
        },
        UnaryOp::IsTrue => match operand {
            ConstantTrue => ConstantTrue,
            ConstantFalse | ConstantUnknown => ConstantFalse,
            ConstantTrueOrUnknown | ConstantFalseOrUnknown | NotSure => NotSure,
        },
        UnaryOp::IsFalse => match operand {
            ConstantFalse => ConstantTrue,
            ConstantTrue | ConstantUnknown => ConstantFalse,
            ConstantTrueOrUnknown | ConstantFalseOrUnknown | NotSure => NotSure,
        },
        UnaryOp::IsUnknown => match operand {
            ConstantUnknown => ConstantTrue,
            ConstantTrue | ConstantFalse => ConstantFalse,
            ConstantTrueOrUnknown | ConstantFalseOrUnknown | NotSure => NotSure,
        },
        UnaryOp::Negate => NotSure,
    }
}

/// `inline_local_variables`: replace every `variable_reference(var)` in
/// `expr` with a deep clone of `substitution[var]`, recursing through
/// nested `let`s (shadowing is preserved: a `let` that rebinds `var`
/// blocks substitution inside its own body).
pub fn inline_local_variables(
    expr: &Arc<ScalarExpression>,
    substitution: &HashMap<VariableId, Arc<ScalarExpression>>,
) -> Arc<ScalarExpression> {
    match &expr.kind {
        ExpressionKind::VariableReference(v) => substitution
            .get(v)
            .cloned()
            .unwrap_or_else(|| expr.clone()),
        ExpressionKind::Literal(_) => expr.clone(),
        ExpressionKind::Unary { op, operand } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Unary {
                op: *op,
                operand: inline_local_variables(operand, substitution),
            },
        )),
        ExpressionKind::Binary { op, left, right } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Binary {
                op: *op,
                left: inline_local_variables(left, substitution),
                right: inline_local_variables(right, substitution),
            },
        )),
        ExpressionKind::Conjunction(terms) => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Conjunction(
                terms
                    .iter()
                    .map(|t| inline_local_variables(t, substitution))
                    .collect(),
            ),
        )),
        ExpressionKind::Disjunction(terms) => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Disjunction(
                terms
                    .iter()
                    .map(|t| inline_local_variables(t, substitution))
                    .collect(),
            ),
        )),
        ExpressionKind::Cast { target, operand } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Cast {
                target: target.clone(),
                operand: inline_local_variables(operand, substitution),
            },
        )),
        ExpressionKind::FunctionCall {
            function,
            arguments,
        } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::FunctionCall {
                function: function.clone(),
                arguments: arguments
                    .iter()
                    .map(|a| inline_local_variables(a, substitution))
                    .collect(),
            },
        )),
        ExpressionKind::AggregationCall {
            aggregation,
            arguments,
            distinct,
        } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::AggregationCall {
                aggregation: aggregation.clone(),
                arguments: arguments
                    .iter()
                    .map(|a| inline_local_variables(a, substitution))
                    .collect(),
                distinct: *distinct,
            },
        )),
        ExpressionKind::Let { bindings, body } => {
            // A binding that rebinds a substituted variable shadows it for
            // the remainder of this `let`'s scope.
            let mut narrowed = substitution.clone();
            let new_bindings: Vec<_> = bindings
                .iter()
                .map(|b| {
                    let value = inline_local_variables(&b.value, &narrowed);
                    narrowed.remove(&b.variable);
                    crate::ir::expression::LetBinding {
                        variable: b.variable,
                        value,
                    }
                })
                .collect();
            Arc::new(ScalarExpression::new(
                expr.id,
                ExpressionKind::Let {
                    bindings: new_bindings,
                    body: inline_local_variables(body, &narrowed),
                },
            ))
        }
    }
}

/// `collect_local_variables`: for every `let` whose declarator is
/// side-effect-free and referenced at most once in the body, inline it and
/// drop the binding. Applied to a single expression tree; relational
/// operators apply this to each of their embedded scalar expressions.
pub fn collect_local_variables(expr: &Arc<ScalarExpression>) -> Arc<ScalarExpression> {
    match &expr.kind {
        ExpressionKind::Let { bindings, body } => {
            let mut kept = Vec::new();
            let mut substitution = HashMap::new();
            for binding in bindings {
                let value = collect_local_variables(&binding.value);
                let uses = body.variable_references();
                let use_count = uses.iter().filter(|v| **v == binding.variable).count();
                if value.is_side_effect_free() && use_count <= 1 {
                    substitution.insert(binding.variable, value);
                } else {
                    kept.push(crate::ir::expression::LetBinding {
                        variable: binding.variable,
                        value,
                    });
                }
            }
            let inlined_body = if substitution.is_empty() {
                collect_local_variables(body)
            } else {
                collect_local_variables(&inline_local_variables(body, &substitution))
            };
            if kept.is_empty() {
                inlined_body
            } else {
                Arc::new(ScalarExpression::new(
                    expr.id,
                    ExpressionKind::Let {
                        bindings: kept,
                        body: inlined_body,
                    },
                ))
            }
        }
        ExpressionKind::Unary { op, operand } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Unary {
                op: *op,
                operand: collect_local_variables(operand),
            },
        )),
        ExpressionKind::Binary { op, left, right } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Binary {
                op: *op,
                left: collect_local_variables(left),
                right: collect_local_variables(right),
            },
        )),
        ExpressionKind::Conjunction(terms) => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Conjunction(terms.iter().map(collect_local_variables).collect()),
        )),
        ExpressionKind::Disjunction(terms) => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Disjunction(terms.iter().map(collect_local_variables).collect()),
        )),
        _ => expr.clone(),
    }
}

/// A single branch of a widened disjunction: `column {<=,<,=,>,>=} bound`.
#[derive(Debug, Clone)]
pub struct RangeBranch {
    pub variable: VariableId,
    pub bound: BoundValue,
    pub op: BinaryOp,
}

/// `decompose_disjunction_into_range`: given branches that each constrain
/// the same variable, compute the covering interval. Mixing a variable
/// endpoint with an immediate endpoint across branches widens that side to
/// `infinity` (handled by [`RangeHintMap::union_lower`]/`union_upper`).
pub fn decompose_disjunction_into_range(branches: &[RangeBranch]) -> Option<(VariableId, Bound, Bound)> {
    let variable = branches.first()?.variable;
    if branches.iter().any(|b| b.variable != variable) {
        return None;
    }
    let mut map = RangeHintMap::new();
    for branch in branches {
        match branch.op {
            BinaryOp::LessThan => map.union_upper(variable, Bound::Exclusive(branch.bound.clone())),
            BinaryOp::LessThanOrEqual => {
                map.union_upper(variable, Bound::Inclusive(branch.bound.clone()))
            }
            BinaryOp::GreaterThan => {
                map.union_lower(variable, Bound::Exclusive(branch.bound.clone()))
            }
            BinaryOp::GreaterThanOrEqual => {
                map.union_lower(variable, Bound::Inclusive(branch.bound.clone()))
            }
            BinaryOp::Equal => {
                map.union_lower(variable, Bound::Inclusive(branch.bound.clone()));
                map.union_upper(variable, Bound::Inclusive(branch.bound.clone()));
            }
            _ => return None,
        }
    }
    let entry = map.get(variable)?.clone();
    Some((variable, entry.lower, entry.upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expression::Literal;

    fn lit_bool(id: u64, b: bool) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            NodeId(id),
            ExpressionKind::Literal(Literal::Boolean(b)),
        ))
    }

    fn and(id: u64, l: Arc<ScalarExpression>, r: Arc<ScalarExpression>) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            NodeId(id),
            ExpressionKind::Binary {
                op: BinaryOp::And,
                left: l,
                right: r,
            },
        ))
    }

    #[test]
    fn decompose_flattens_nested_and() {
        let expr = and(1, lit_bool(2, true), and(3, lit_bool(4, false), lit_bool(5, true)));
        let terms = decompose_conjunctions(&expr);
        assert_eq!(terms.len(), 3);
    }

    #[test]
    fn and_truth_table_shortcuts() {
        assert_eq!(
            Simplified::ConstantFalse.and(Simplified::NotSure),
            Simplified::ConstantFalse
        );
        assert_eq!(
            Simplified::ConstantTrue.and(Simplified::NotSure),
            Simplified::NotSure
        );
    }

    #[test]
    fn not_flips_true_and_false_but_keeps_unknown() {
        assert_eq!(Simplified::ConstantTrue.not(), Simplified::ConstantFalse);
        assert_eq!(
            Simplified::ConstantUnknown.not(),
            Simplified::ConstantUnknown
        );
        assert_eq!(Simplified::NotSure.not(), Simplified::NotSure);
    }

    #[test]
    fn simplify_is_idempotent_on_constant_and() {
        let expr = and(1, lit_bool(2, true), lit_bool(3, false));
        let once = simplify(&expr);
        assert_eq!(once, Simplified::ConstantFalse);
    }

    #[test]
    fn inline_replaces_variable_reference() {
        let mut sub = HashMap::new();
        sub.insert(VariableId(1), lit_bool(10, true));
        let expr = Arc::new(ScalarExpression::new(
            NodeId(1),
            ExpressionKind::VariableReference(VariableId(1)),
        ));
        let inlined = inline_local_variables(&expr, &sub);
        assert!(matches!(
            inlined.kind,
            ExpressionKind::Literal(Literal::Boolean(true))
        ));
    }

    #[test]
    fn decompose_disjunction_computes_covering_interval() {
        let imm = |v: i64| {
            BoundValue::Immediate(Arc::new(ScalarExpression::new(
                NodeId(0),
                ExpressionKind::Literal(Literal::Int(v)),
            )))
        };
        let branches = vec![
            RangeBranch {
                variable: VariableId(1),
                bound: imm(5),
                op: BinaryOp::LessThanOrEqual,
            },
            RangeBranch {
                variable: VariableId(1),
                bound: imm(10),
                op: BinaryOp::LessThanOrEqual,
            },
        ];
        let (_, _lower, upper) = decompose_disjunction_into_range(&branches).unwrap();
        assert_eq!(upper, Bound::Inclusive(imm(10)));
    }
}
