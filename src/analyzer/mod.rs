//! Expression analyzer (C3): resolves scalar expression and relational
//! operator types, recording results into the C2 mappings and reporting
//! diagnostics for ill-formed input without aborting the walk.

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::ir::expression::{ExpressionKind, ScalarExpression};
use crate::ir::graph::{Graph, NodeId as GraphNodeId};
use crate::ir::relation::RelationOp;
use crate::resolution::{
    ExpressionMapping, ExpressionResolution, NodeId, VariableMapping, VariableResolution,
};
use crate::types::conversion::{is_assignment_convertible, unify, Convertibility};
use crate::types::Type;

/// Resolves scalar expressions and relational operators, accumulating
/// resolutions into the supplied mappings and diagnostics into the sink.
pub struct Analyzer<'a> {
    pub variables: &'a mut VariableMapping,
    pub expressions: &'a mut ExpressionMapping,
    pub diagnostics: &'a mut DiagnosticSink,
    /// §4.3: "if `allow_unresolved=false`, emit `unresolved_variable`; if
    /// true, propagate pending."
    pub allow_unresolved: bool,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        variables: &'a mut VariableMapping,
        expressions: &'a mut ExpressionMapping,
        diagnostics: &'a mut DiagnosticSink,
        allow_unresolved: bool,
    ) -> Self {
        Analyzer {
            variables,
            expressions,
            diagnostics,
            allow_unresolved,
        }
    }

    /// `resolve(scalar)`: returns the result type; every sub-node's type is
    /// recorded in the expression mapping along the way.
    pub fn resolve_scalar(&mut self, expr: &ScalarExpression) -> Type {
        let ty = self.resolve_scalar_kind(expr);
        self.expressions.bind(
            expr.id,
            ExpressionResolution::of(ty.clone()),
            true,
        );
        ty
    }

    fn resolve_scalar_kind(&mut self, expr: &ScalarExpression) -> Type {
        match &expr.kind {
            ExpressionKind::Literal(lit) => literal_type(lit),
            ExpressionKind::VariableReference(v) => self.resolve_variable_reference(*v),
            ExpressionKind::Unary { op, operand } => {
                let operand_ty = self.resolve_scalar(operand);
                self.resolve_unary(*op, &operand_ty, expr)
            }
            ExpressionKind::Binary { op, left, right } => {
                let l = self.resolve_scalar(left);
                let r = self.resolve_scalar(right);
                self.resolve_binary(*op, &l, &r, expr)
            }
            ExpressionKind::Conjunction(terms) | ExpressionKind::Disjunction(terms) => {
                let mut any_stop = false;
                for t in terms {
                    let t_ty = self.resolve_scalar(t);
                    if !t_ty.is_stop() && t_ty != Type::Boolean && t_ty != Type::Unknown {
                        self.diagnostics.report(Diagnostic::new(
                            DiagnosticCode::TypeMismatch,
                            "AND/OR terms must be boolean",
                        ));
                    }
                    any_stop |= t_ty.is_stop();
                }
                if any_stop {
                    Type::pending()
                } else {
                    Type::Boolean
                }
            }
            ExpressionKind::Cast { target, operand } => {
                let operand_ty = self.resolve_scalar(operand);
                if operand_ty.is_stop() {
                    return Type::pending();
                }
                match crate::types::conversion::is_cast_convertible(&operand_ty, target) {
                    Convertibility::No => {
                        self.diagnostics.report(Diagnostic::new(
                            DiagnosticCode::InvalidCast,
                            format!("cannot cast {operand_ty:?} to {target:?}"),
                        ));
                        Type::error()
                    }
                    _ => target.clone(),
                }
            }
            ExpressionKind::FunctionCall { arguments, .. } => {
                let arg_types: Vec<Type> =
                    arguments.iter().map(|a| self.resolve_scalar(a)).collect();
                if arg_types.iter().any(Type::is_stop) {
                    Type::pending()
                } else {
                    // Return type is owned by the function provider (§6);
                    // the core only needs a well-formed placeholder here.
                    Type::Unknown
                }
            }
            ExpressionKind::AggregationCall { arguments, .. } => {
                let arg_types: Vec<Type> =
                    arguments.iter().map(|a| self.resolve_scalar(a)).collect();
                if arg_types.iter().any(Type::is_stop) {
                    Type::pending()
                } else {
                    Type::Unknown
                }
            }
            ExpressionKind::Let { bindings, body } => {
                for binding in bindings {
                    let ty = self.resolve_scalar(&binding.value);
                    self.variables
                        .bind(binding.variable, VariableResolution::Unknown(ty), true);
                }
                self.resolve_scalar(body)
            }
        }
    }

    fn resolve_variable_reference(&mut self, v: crate::resolution::VariableId) -> Type {
        match self.variables.find(v) {
            Some(res) => res.resolved_type().cloned().unwrap_or(Type::pending()),
            None => {
                if self.allow_unresolved {
                    Type::pending()
                } else {
                    self.diagnostics.report(Diagnostic::new(
                        DiagnosticCode::UnknownIdentifier,
                        format!("unresolved variable {v:?}"),
                    ));
                    Type::error()
                }
            }
        }
    }

    fn resolve_unary(
        &mut self,
        op: crate::ir::expression::UnaryOp,
        operand: &Type,
        _expr: &ScalarExpression,
    ) -> Type {
        use crate::ir::expression::UnaryOp;
        if operand.is_stop() {
            return Type::pending();
        }
        match op {
            UnaryOp::Not | UnaryOp::IsTrue | UnaryOp::IsFalse | UnaryOp::IsUnknown => {
                Type::Boolean
            }
            UnaryOp::IsNull => Type::Boolean,
            UnaryOp::Negate => crate::types::conversion::unary_promote(operand),
        }
    }

    fn resolve_binary(
        &mut self,
        op: crate::ir::expression::BinaryOp,
        left: &Type,
        right: &Type,
        _expr: &ScalarExpression,
    ) -> Type {
        use crate::ir::expression::BinaryOp;
        if left.is_stop() || right.is_stop() {
            return Type::pending();
        }
        match op {
            BinaryOp::And | BinaryOp::Or => Type::Boolean,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => Type::Boolean,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                let promoted = crate::types::conversion::binary_promote(left, right);
                if promoted.is_error() {
                    self.diagnostics.report(Diagnostic::new(
                        DiagnosticCode::TypeMismatch,
                        format!("incompatible operand types {left:?} and {right:?}"),
                    ));
                }
                promoted
            }
        }
    }

    /// `resolve(relation, validate, recursive)`. If `recursive`, walks
    /// upstream operators first.
    pub fn resolve_relation(
        &mut self,
        graph: &Graph,
        node: GraphNodeId,
        validate: bool,
        recursive: bool,
    ) {
        if recursive {
            if let Some(n) = graph.get(node) {
                let upstream: Vec<_> = n.inputs.clone();
                for up in upstream {
                    self.resolve_relation(graph, up, validate, true);
                }
            }
        }
        let op = match graph.get(node) {
            Some(n) => n.op.clone(),
            None => return,
        };
        self.resolve_operator(&op, validate);
    }

    fn resolve_operator(&mut self, op: &RelationOp, validate: bool) {
        match op {
            RelationOp::Filter { condition } => {
                let ty = self.resolve_scalar(condition);
                if validate && !ty.is_stop() && ty != Type::Boolean {
                    self.diagnostics.report(Diagnostic::new(
                        DiagnosticCode::TypeMismatch,
                        "filter condition must be boolean",
                    ));
                }
            }
            RelationOp::Join { condition, .. } => {
                let ty = self.resolve_scalar(condition);
                if validate && !ty.is_stop() && ty != Type::Boolean {
                    self.diagnostics.report(Diagnostic::new(
                        DiagnosticCode::TypeMismatch,
                        "join condition must be boolean",
                    ));
                }
            }
            RelationOp::Scan { columns, .. }
            | RelationOp::Find { columns, .. }
            | RelationOp::IndexScan { columns, .. }
            | RelationOp::Project { columns } => {
                for c in columns {
                    let ty = self.resolve_scalar(&c.value);
                    self.variables
                        .bind(c.variable, VariableResolution::Unknown(ty), true);
                }
            }
            RelationOp::Aggregate { columns, .. } => {
                for c in columns {
                    let ty = self.resolve_scalar(&c.aggregation);
                    self.variables
                        .bind(c.variable, VariableResolution::Unknown(ty), true);
                }
            }
            RelationOp::Values { columns, rows } => {
                if validate {
                    for row in rows {
                        if row.len() != columns.len() {
                            self.diagnostics.report(Diagnostic::new(
                                DiagnosticCode::MalformedPredicate,
                                format!(
                                    "values row has {} elements, expected {}",
                                    row.len(),
                                    columns.len()
                                ),
                            ));
                        }
                    }
                }
                for (i, &var) in columns.iter().enumerate() {
                    let types: Vec<Type> = rows
                        .iter()
                        .filter_map(|r| r.get(i))
                        .map(|e| self.resolve_scalar(e))
                        .collect();
                    let unified = unify(&types);
                    self.variables
                        .bind(var, VariableResolution::Unknown(unified), true);
                }
            }
            RelationOp::Write {
                targets, sources, ..
            } => {
                for (target, source) in targets.iter().zip(sources) {
                    let source_ty = self.resolve_scalar(source);
                    if validate {
                        if let Some(existing) = self.variables.find(*target) {
                            if let Some(target_ty) = existing.resolved_type() {
                                if is_assignment_convertible(&source_ty, target_ty)
                                    == Convertibility::No
                                {
                                    self.diagnostics.report(Diagnostic::new(
                                        DiagnosticCode::TypeMismatch,
                                        "write source not assignable to target column",
                                    ));
                                }
                            }
                        }
                    }
                }
            }
            RelationOp::JoinFind { key, residual, .. } => {
                for k in key {
                    self.resolve_scalar(k);
                }
                if let Some(r) = residual {
                    self.resolve_scalar(r);
                }
            }
            RelationOp::JoinScan {
                lower,
                upper,
                residual,
                ..
            } => {
                self.resolve_range_endpoint(lower);
                self.resolve_range_endpoint(upper);
                if let Some(r) = residual {
                    self.resolve_scalar(r);
                }
            }
            RelationOp::Distinct { .. }
            | RelationOp::Limit { .. }
            | RelationOp::Union { .. }
            | RelationOp::Intersection
            | RelationOp::Difference
            | RelationOp::Escape => {}
        }
    }

    fn resolve_range_endpoint(&mut self, endpoint: &crate::ir::relation::RangeEndpoint) {
        use crate::ir::relation::RangeEndpoint;
        match endpoint {
            RangeEndpoint::Infinity => {}
            RangeEndpoint::Inclusive(e) | RangeEndpoint::Exclusive(e) => {
                self.resolve_scalar(e);
            }
        }
    }

    /// `resolve(graph)`: a fixed-point traversal resolving every operator.
    pub fn resolve_graph(&mut self, graph: &Graph, validate: bool) {
        for id in graph.node_ids() {
            self.resolve_relation(graph, id, validate, false);
        }
    }

    /// `resolve(step)`: resolve the scalar expressions embedded in a single
    /// physical step. Only `join_group` carries one today; every other
    /// step kind is pure wiring with nothing left to type.
    pub fn resolve_step(&mut self, step: &crate::step::Step) {
        if let crate::step::StepKind::Physical(crate::step::PhysicalOp::JoinGroup {
            condition,
            ..
        }) = &step.kind
        {
            self.resolve_scalar(condition);
        }
    }

    /// `resolve(plan_graph)`: resolve every step produced by C7, in no
    /// particular order — each step's expressions are self-contained.
    pub fn resolve_plan_graph(&mut self, steps: &crate::step::StepGraph) {
        for id in steps.step_ids() {
            self.resolve_step(steps.get(id));
        }
    }

    /// `resolve(statement)`: dispatch on the statement kind (§4.9). DDL
    /// statements carry no scalar expressions; `execute`/`write` resolve
    /// their embedded graph exactly like `resolve(graph)`.
    pub fn resolve_statement(&mut self, statement: &crate::ir::statement::Statement, validate: bool) {
        if let Some(graph) = statement.graph() {
            self.resolve_graph(graph, validate);
        }
    }
}

fn literal_type(lit: &crate::ir::expression::Literal) -> Type {
    use crate::ir::expression::Literal;
    match lit {
        Literal::Null => Type::Unknown,
        Literal::Boolean(_) => Type::Boolean,
        Literal::Int(_) => Type::Int4,
        Literal::Decimal(_) => Type::Decimal {
            precision: None,
            scale: None,
        },
        Literal::Float(_) => Type::Float8,
        Literal::Character(s) => Type::Character {
            varying: true,
            length: Some(s.len() as u32),
        },
        Literal::Octet(b) => Type::Octet {
            varying: true,
            length: Some(b.len() as u32),
        },
    }
}
