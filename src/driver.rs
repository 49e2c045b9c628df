//! Compiler driver (C8): orchestrates C1-C7 into the `compile`/`inspect`
//! entry points (§4.9).

use crate::block::{build_blocks, BlockGraph};
use crate::diagnostics::DiagnosticSink;
use crate::ir::expression::{BinaryOp, ExpressionKind, Literal, ScalarExpression};
use crate::ir::graph::Graph;
use crate::predicate::range::{Bound, BoundValue};
use crate::predicate::{RangeBranch, Simplified};
use crate::provider::{IndexEstimator, StorageProvider};
use crate::resolution::{ExpressionMapping, NodeId as ExprNodeId, VariableId, VariableMapping};
use crate::rewrite::{join, prune, scan, RewriteOptions};
use crate::step::collector::collect_steps;
use crate::step::StepGraph;
use std::sync::Arc;
use tracing::{error, info_span};

/// Runtime feature flags gating optional rewrites (§6).
#[derive(Debug, Clone, Default)]
pub struct RuntimeFeatures {
    pub broadcast_join: bool,
    pub aggregate_in_exchange: bool,
}

/// Options threaded through a single `compile`/`inspect` invocation.
pub struct CompilerOptions<'a> {
    pub storage_provider: &'a dyn StorageProvider,
    pub index_estimator: &'a dyn IndexEstimator,
    pub runtime_features: RuntimeFeatures,
    pub join_scan_enabled: bool,
    pub allow_unresolved: bool,
}

/// Shared immutable views of the variable/expression mappings, attached to
/// a successful compile result. Safe to share across threads (§5).
pub struct CompiledInfo {
    /// Identifies this compiled plan for logging and caching, distinct from
    /// any identity the storage provider assigns to the underlying objects.
    pub plan_id: uuid::Uuid,
    pub compiled_at: chrono::DateTime<chrono::Utc>,
    pub variables: Arc<VariableMapping>,
    pub expressions: Arc<ExpressionMapping>,
}

impl CompiledInfo {
    pub fn type_of_expression(&self, node: crate::resolution::NodeId) -> Option<crate::types::Type> {
        self.expressions
            .find(node)
            .and_then(|r| r.r#type().cloned())
    }

    pub fn type_of_variable(&self, var: crate::resolution::VariableId) -> Option<crate::types::Type> {
        self.variables
            .find(var)
            .and_then(|r| r.resolved_type().cloned())
    }
}

/// The outcome of a `compile` invocation: either a fully lowered step plan
/// with its `compiled_info`, or the diagnostics that aborted the pipeline.
pub enum CompileResult {
    Success {
        steps: StepGraph,
        blocks: BlockGraph,
        info: CompiledInfo,
    },
    Failure {
        diagnostics: Vec<crate::diagnostics::Diagnostic>,
    },
}

/// Run the full pipeline: resolve, rewrite predicates, rewrite scans/joins,
/// re-resolve, build blocks, collect steps.
pub fn compile(options: &CompilerOptions, graph: &mut Graph) -> CompileResult {
    let mut variables = VariableMapping::new();
    let mut expressions = ExpressionMapping::new();
    let mut diagnostics = DiagnosticSink::new();

    {
        let _span = info_span!("resolve").entered();
        if let Err(e) = graph.validate_structure() {
            error!(error = %e, "malformed operator graph");
            panic!("compile: invalid operator graph: {e}");
        }
        let mut analyzer = crate::analyzer::Analyzer::new(
            &mut variables,
            &mut expressions,
            &mut diagnostics,
            options.allow_unresolved,
        );
        analyzer.resolve_graph(graph, true);
    }

    if diagnostics.has_errors() {
        return CompileResult::Failure {
            diagnostics: diagnostics.into_entries(),
        };
    }

    {
        let _span = info_span!("rewrite_predicates").entered();
        rewrite_predicates(graph);
    }

    let rewrite_options = RewriteOptions {
        enable_join_scan: options.join_scan_enabled,
    };

    {
        let _span = info_span!("rewrite_scans").entered();
        scan::rewrite_scans(
            graph,
            options.storage_provider,
            options.index_estimator,
            rewrite_options,
        );
    }

    {
        let _span = info_span!("rewrite_joins").entered();
        join::rewrite_joins(
            graph,
            options.storage_provider,
            options.index_estimator,
            rewrite_options,
        );
    }

    {
        let _span = info_span!("resolve").entered();
        let mut analyzer =
            crate::analyzer::Analyzer::new(&mut variables, &mut expressions, &mut diagnostics, true);
        analyzer.resolve_graph(graph, false);
    }

    {
        let _span = info_span!("prune_columns").entered();
        prune::prune_unused_columns(graph);
    }

    let blocks = {
        let _span = info_span!("build_blocks").entered();
        build_blocks(graph)
    };

    let steps = {
        let _span = info_span!("collect_steps").entered();
        let mut steps = StepGraph::new();
        collect_steps(graph, &mut steps);
        steps
    };

    {
        let _span = info_span!("resolve_plan_graph").entered();
        let mut analyzer =
            crate::analyzer::Analyzer::new(&mut variables, &mut expressions, &mut diagnostics, true);
        analyzer.resolve_plan_graph(&steps);
    }

    CompileResult::Success {
        steps,
        blocks,
        info: CompiledInfo {
            plan_id: uuid::Uuid::new_v4(),
            compiled_at: chrono::Utc::now(),
            variables: Arc::new(variables),
            expressions: Arc::new(expressions),
        },
    }
}

/// `compile(statement)` (§4.9): dispatch on the statement kind. `execute`/
/// `write` run the full graph pipeline; DDL statements and `empty` carry no
/// operator graph and compile to an empty, always-successful step plan.
pub fn compile_statement(
    options: &CompilerOptions,
    statement: &mut crate::ir::statement::Statement,
) -> CompileResult {
    use crate::ir::statement::Statement;
    match statement {
        Statement::Execute(graph) | Statement::Write(graph) => compile(options, graph),
        Statement::CreateTable(_)
        | Statement::DropTable(_)
        | Statement::CreateIndex(_)
        | Statement::DropIndex(_)
        | Statement::Empty => CompileResult::Success {
            steps: StepGraph::new(),
            blocks: BlockGraph::default(),
            info: CompiledInfo {
                plan_id: uuid::Uuid::new_v4(),
                compiled_at: chrono::Utc::now(),
                variables: Arc::new(VariableMapping::new()),
                expressions: Arc::new(ExpressionMapping::new()),
            },
        },
    }
}

/// `inspect(input)`: performs only resolution and re-resolution, returning
/// `compiled_info` for testing. No rewrites, no step planning.
pub fn inspect(options: &CompilerOptions, graph: &Graph) -> Result<CompiledInfo, Vec<crate::diagnostics::Diagnostic>> {
    let mut variables = VariableMapping::new();
    let mut expressions = ExpressionMapping::new();
    let mut diagnostics = DiagnosticSink::new();

    let mut analyzer = crate::analyzer::Analyzer::new(
        &mut variables,
        &mut expressions,
        &mut diagnostics,
        options.allow_unresolved,
    );
    analyzer.resolve_graph(graph, true);

    if diagnostics.has_errors() {
        return Err(diagnostics.into_entries());
    }

    let mut analyzer =
        crate::analyzer::Analyzer::new(&mut variables, &mut expressions, &mut diagnostics, true);
    analyzer.resolve_graph(graph, false);

    Ok(CompiledInfo {
        plan_id: uuid::Uuid::new_v4(),
        compiled_at: chrono::Utc::now(),
        variables: Arc::new(variables),
        expressions: Arc::new(expressions),
    })
}

/// Apply the C4 transformations globally: decompose conjunctions, inline
/// local variables, widen disjunctions into range hints, and simplify.
/// Operates on every `Filter`/`Join` condition and `Scan`/`Find`/
/// `IndexScan`/`Project` column expression in the graph (§4.4).
fn rewrite_predicates(graph: &mut Graph) {
    let ids: Vec<_> = graph.node_ids().collect();
    for id in ids {
        let op = match graph.get(id) {
            Some(n) => n.op.clone(),
            None => continue,
        };
        let rewritten = match op {
            crate::ir::relation::RelationOp::Filter { condition } => {
                crate::ir::relation::RelationOp::Filter {
                    condition: rewrite_condition(&condition),
                }
            }
            crate::ir::relation::RelationOp::Join { kind, condition } => {
                crate::ir::relation::RelationOp::Join {
                    kind,
                    condition: rewrite_condition(&condition),
                }
            }
            crate::ir::relation::RelationOp::Scan { table, columns } => {
                crate::ir::relation::RelationOp::Scan {
                    table,
                    columns: rewrite_columns(columns),
                }
            }
            crate::ir::relation::RelationOp::Find { index, key, columns } => {
                crate::ir::relation::RelationOp::Find {
                    index,
                    key: key.iter().map(crate::predicate::collect_local_variables).collect(),
                    columns: rewrite_columns(columns),
                }
            }
            crate::ir::relation::RelationOp::IndexScan {
                index,
                lower,
                upper,
                columns,
            } => crate::ir::relation::RelationOp::IndexScan {
                index,
                lower,
                upper,
                columns: rewrite_columns(columns),
            },
            crate::ir::relation::RelationOp::Project { columns } => {
                crate::ir::relation::RelationOp::Project {
                    columns: rewrite_columns(columns),
                }
            }
            other => other,
        };
        let _ = graph.replace_op(id, rewritten);
    }
}

/// Full C4 pass for a boolean `Filter`/`Join` condition: inline local
/// variables, widen OR-chains of range comparisons into extra AND'd range
/// conjuncts, then fold the result to a constant where possible.
fn rewrite_condition(condition: &Arc<ScalarExpression>) -> Arc<ScalarExpression> {
    let inlined = crate::predicate::collect_local_variables(condition);
    let widened = widen_disjunctions(&inlined);
    simplify_condition(&widened)
}

fn rewrite_columns(columns: Vec<crate::ir::relation::Column>) -> Vec<crate::ir::relation::Column> {
    columns
        .into_iter()
        .map(|c| crate::ir::relation::Column {
            value: simplify_condition(&crate::predicate::collect_local_variables(&c.value)),
            ..c
        })
        .collect()
}

/// Recurse through AND-trees, widening each OR-chain of simple
/// `variable {op} immediate` comparisons against the same variable into
/// the original disjunction AND'd with the covering range (§4.4 scenario
/// 2). Anything that doesn't decompose into a single-variable range is
/// left untouched.
fn widen_disjunctions(expr: &Arc<ScalarExpression>) -> Arc<ScalarExpression> {
    match &expr.kind {
        ExpressionKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Binary {
                op: BinaryOp::And,
                left: widen_disjunctions(left),
                right: widen_disjunctions(right),
            },
        )),
        ExpressionKind::Conjunction(terms) => Arc::new(ScalarExpression::new(
            expr.id,
            ExpressionKind::Conjunction(terms.iter().map(widen_disjunctions).collect()),
        )),
        ExpressionKind::Disjunction(_) | ExpressionKind::Binary { op: BinaryOp::Or, .. } => {
            widen_single_disjunction(expr)
        }
        _ => expr.clone(),
    }
}

fn widen_single_disjunction(expr: &Arc<ScalarExpression>) -> Arc<ScalarExpression> {
    let terms = collect_or_terms(expr);
    let Some(branches): Option<Vec<RangeBranch>> =
        terms.iter().map(term_to_range_branch).collect()
    else {
        return expr.clone();
    };
    if branches.is_empty() {
        return expr.clone();
    }
    let Some((var, lower, upper)) = crate::predicate::decompose_disjunction_into_range(&branches)
    else {
        return expr.clone();
    };

    let mut conjuncts = vec![expr.clone()];
    if let Some(c) = bound_to_conjunct(var, &lower, true) {
        conjuncts.push(c);
    }
    if let Some(c) = bound_to_conjunct(var, &upper, false) {
        conjuncts.push(c);
    }
    if conjuncts.len() == 1 {
        return expr.clone();
    }
    conjuncts
        .into_iter()
        .reduce(|acc, c| {
            Arc::new(ScalarExpression::new(
                expr.id,
                ExpressionKind::Binary {
                    op: BinaryOp::And,
                    left: acc,
                    right: c,
                },
            ))
        })
        .unwrap()
}

fn collect_or_terms(expr: &Arc<ScalarExpression>) -> Vec<Arc<ScalarExpression>> {
    match &expr.kind {
        ExpressionKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            let mut out = collect_or_terms(left);
            out.extend(collect_or_terms(right));
            out
        }
        ExpressionKind::Disjunction(terms) => terms.iter().flat_map(collect_or_terms).collect(),
        _ => vec![expr.clone()],
    }
}

fn term_to_range_branch(term: &Arc<ScalarExpression>) -> Option<RangeBranch> {
    let ExpressionKind::Binary { op, left, right } = &term.kind else {
        return None;
    };
    let (variable, value, op) = match (&left.kind, &right.kind) {
        (ExpressionKind::VariableReference(v), _) => (*v, right.clone(), *op),
        (_, ExpressionKind::VariableReference(v)) => (*v, left.clone(), flip_comparison(*op)),
        _ => return None,
    };
    if !matches!(
        op,
        BinaryOp::Equal
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
    ) {
        return None;
    }
    Some(RangeBranch {
        variable,
        bound: BoundValue::Immediate(value),
        op,
    })
}

fn flip_comparison(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::LessThan => BinaryOp::GreaterThan,
        BinaryOp::LessThanOrEqual => BinaryOp::GreaterThanOrEqual,
        BinaryOp::GreaterThan => BinaryOp::LessThan,
        BinaryOp::GreaterThanOrEqual => BinaryOp::LessThanOrEqual,
        other => other,
    }
}

fn bound_to_conjunct(var: VariableId, bound: &Bound, lower: bool) -> Option<Arc<ScalarExpression>> {
    let (value, op) = match bound {
        Bound::Infinity => return None,
        Bound::Inclusive(BoundValue::Immediate(e)) => (
            e.clone(),
            if lower {
                BinaryOp::GreaterThanOrEqual
            } else {
                BinaryOp::LessThanOrEqual
            },
        ),
        Bound::Exclusive(BoundValue::Immediate(e)) => (
            e.clone(),
            if lower {
                BinaryOp::GreaterThan
            } else {
                BinaryOp::LessThan
            },
        ),
        Bound::Inclusive(BoundValue::Variable(_)) | Bound::Exclusive(BoundValue::Variable(_)) => {
            return None
        }
    };
    Some(Arc::new(ScalarExpression::new(
        value.id,
        ExpressionKind::Binary {
            op,
            left: Arc::new(ScalarExpression::new(
                value.id,
                ExpressionKind::VariableReference(var),
            )),
            right: value,
        },
    )))
}

/// Fold a condition to a boolean literal where `simplify` can prove it
/// constant; otherwise leave it untouched for the analyzer to re-resolve.
fn simplify_condition(expr: &Arc<ScalarExpression>) -> Arc<ScalarExpression> {
    match crate::predicate::simplify(expr) {
        Simplified::ConstantTrue => bool_literal(expr.id, true),
        Simplified::ConstantFalse => bool_literal(expr.id, false),
        _ => expr.clone(),
    }
}

fn bool_literal(id: ExprNodeId, value: bool) -> Arc<ScalarExpression> {
    Arc::new(ScalarExpression::new(
        id,
        ExpressionKind::Literal(Literal::Boolean(value)),
    ))
}
