//! Scalar expression trees (§3, §4.3). Owned by the surrounding operator
//! graph's arena; identified by [`NodeId`] for the expression mapping.

use crate::resolution::{DeclarationRef, NodeId, VariableId};
use std::sync::Arc;

/// A literal scalar value. Kept deliberately small — the analyzer only
/// needs to know enough to classify the literal's type, not to evaluate it.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Decimal(Arc<str>),
    Float(f64),
    Character(Arc<str>),
    Octet(Arc<[u8]>),
}

/// Binary comparison and logical operators recognised by the predicate
/// toolkit (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Unary operators, including the three-valued predicates §4.4 simplifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsTrue,
    IsFalse,
    IsUnknown,
    Negate,
}

/// A `let` binding: `name := value` visible to `body`. Bound variables are
/// [`VariableId`]s allocated by the binding layer (§6), not by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub variable: VariableId,
    pub value: Arc<ScalarExpression>,
}

/// A scalar expression tree node. Every node carries its own [`NodeId`] so
/// the expression mapping (C2) can record its resolved type independently
/// of its position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarExpression {
    pub id: NodeId,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    VariableReference(VariableId),
    Unary {
        op: UnaryOp,
        operand: Arc<ScalarExpression>,
    },
    Binary {
        op: BinaryOp,
        left: Arc<ScalarExpression>,
        right: Arc<ScalarExpression>,
    },
    /// A conjunction or disjunction flattened to `n` terms by
    /// [`crate::predicate::decompose_conjunctions`]; constructed only by
    /// that rewrite, never by a producer of the initial tree.
    Conjunction(Vec<Arc<ScalarExpression>>),
    Disjunction(Vec<Arc<ScalarExpression>>),
    Cast {
        target: crate::types::Type,
        operand: Arc<ScalarExpression>,
    },
    FunctionCall {
        function: DeclarationRef,
        arguments: Vec<Arc<ScalarExpression>>,
    },
    AggregationCall {
        aggregation: DeclarationRef,
        arguments: Vec<Arc<ScalarExpression>>,
        distinct: bool,
    },
    Let {
        bindings: Vec<LetBinding>,
        body: Arc<ScalarExpression>,
    },
}

impl ScalarExpression {
    pub fn new(id: NodeId, kind: ExpressionKind) -> Self {
        ScalarExpression { id, kind }
    }

    /// Free variable references read directly by this node, stopping at
    /// nested `let` bodies only insofar as the caller wants shadowing
    /// respected — used by the predicate toolkit's single-use check.
    pub fn variable_references(&self) -> Vec<VariableId> {
        let mut out = Vec::new();
        self.collect_variable_references(&mut out);
        out
    }

    fn collect_variable_references(&self, out: &mut Vec<VariableId>) {
        match &self.kind {
            ExpressionKind::Literal(_) => {}
            ExpressionKind::VariableReference(v) => out.push(*v),
            ExpressionKind::Unary { operand, .. } => operand.collect_variable_references(out),
            ExpressionKind::Binary { left, right, .. } => {
                left.collect_variable_references(out);
                right.collect_variable_references(out);
            }
            ExpressionKind::Conjunction(terms) | ExpressionKind::Disjunction(terms) => {
                for t in terms {
                    t.collect_variable_references(out);
                }
            }
            ExpressionKind::Cast { operand, .. } => operand.collect_variable_references(out),
            ExpressionKind::FunctionCall { arguments, .. }
            | ExpressionKind::AggregationCall { arguments, .. } => {
                for a in arguments {
                    a.collect_variable_references(out);
                }
            }
            ExpressionKind::Let { bindings, body } => {
                for b in bindings {
                    b.value.collect_variable_references(out);
                }
                body.collect_variable_references(out);
            }
        }
    }

    /// True if evaluating this expression cannot observe or mutate state
    /// beyond its own result — required for a `let` declarator to be
    /// eligible for inlining (§4.4).
    pub fn is_side_effect_free(&self) -> bool {
        match &self.kind {
            ExpressionKind::AggregationCall { .. } => false,
            ExpressionKind::Literal(_) | ExpressionKind::VariableReference(_) => true,
            ExpressionKind::Unary { operand, .. } => operand.is_side_effect_free(),
            ExpressionKind::Binary { left, right, .. } => {
                left.is_side_effect_free() && right.is_side_effect_free()
            }
            ExpressionKind::Conjunction(terms) | ExpressionKind::Disjunction(terms) => {
                terms.iter().all(|t| t.is_side_effect_free())
            }
            ExpressionKind::Cast { operand, .. } => operand.is_side_effect_free(),
            ExpressionKind::FunctionCall { arguments, .. } => {
                arguments.iter().all(|a| a.is_side_effect_free())
            }
            ExpressionKind::Let { bindings, body } => {
                bindings.iter().all(|b| b.value.is_side_effect_free()) && body.is_side_effect_free()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: u64, v: u64) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            NodeId(id),
            ExpressionKind::VariableReference(VariableId(v)),
        ))
    }

    #[test]
    fn variable_references_walk_binary_tree() {
        let expr = ScalarExpression::new(
            NodeId(10),
            ExpressionKind::Binary {
                op: BinaryOp::Equal,
                left: leaf(1, 100),
                right: leaf(2, 200),
            },
        );
        let refs = expr.variable_references();
        assert_eq!(refs, vec![VariableId(100), VariableId(200)]);
    }

    #[test]
    fn aggregation_calls_are_not_side_effect_free() {
        let expr = ScalarExpression::new(
            NodeId(1),
            ExpressionKind::AggregationCall {
                aggregation: DeclarationRef(Arc::from("count")),
                arguments: vec![],
                distinct: false,
            },
        );
        assert!(!expr.is_side_effect_free());
    }

    #[test]
    fn literals_and_references_are_side_effect_free() {
        assert!(leaf(1, 1).is_side_effect_free());
        let lit = ScalarExpression::new(NodeId(2), ExpressionKind::Literal(Literal::Int(3)));
        assert!(lit.is_side_effect_free());
    }
}
