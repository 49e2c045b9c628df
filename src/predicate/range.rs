//! Range hint entries and the range hint map (§3, §4.4).

use crate::ir::expression::ScalarExpression;
use crate::resolution::VariableId;
use std::collections::HashMap;
use std::sync::Arc;

/// An endpoint value: either a constant or a reference to another variable.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Immediate(Arc<ScalarExpression>),
    Variable(VariableId),
}

/// One side of a range hint entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Infinity,
    Inclusive(BoundValue),
    Exclusive(BoundValue),
}

/// `(lower, upper)` for one stream variable, as built by disjunction
/// widening and consumed by the scan/join rewriters.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEntry {
    pub lower: Bound,
    pub upper: Bound,
}

impl RangeEntry {
    pub fn unbounded() -> Self {
        RangeEntry {
            lower: Bound::Infinity,
            upper: Bound::Infinity,
        }
    }

    /// `intersect_lower`: tighten the lower bound. Immediates take the max,
    /// with the stricter (exclusive) inclusiveness winning on a tie.
    /// Conflicting variable identities keep the first variable recorded —
    /// intersect is not commutative on heterogeneous value kinds.
    pub fn intersect_lower(&mut self, other: Bound) {
        self.lower = intersect_bound(self.lower.clone(), other, true);
    }

    pub fn intersect_upper(&mut self, other: Bound) {
        self.upper = intersect_bound(self.upper.clone(), other, false);
    }

    /// `union_lower`/`union_upper`: the weaker merge. Immediates pick the
    /// opposite extreme (min for lower, max for upper); any mismatch
    /// between variables, or between a variable and an immediate, widens
    /// that side to `infinity`.
    pub fn union_lower(&mut self, other: Bound) {
        self.lower = union_bound(self.lower.clone(), other, true);
    }

    pub fn union_upper(&mut self, other: Bound) {
        self.upper = union_bound(self.upper.clone(), other, false);
    }

    /// Merge `other` into `self` using `intersect_lower`/`intersect_upper`.
    pub fn intersect(&mut self, other: &RangeEntry) {
        self.intersect_lower(other.lower.clone());
        self.intersect_upper(other.upper.clone());
    }

    /// Merge `other` into `self` using `union_lower`/`union_upper`.
    pub fn union(&mut self, other: &RangeEntry) {
        self.union_lower(other.lower.clone());
        self.union_upper(other.upper.clone());
    }
}

fn immediate_value(value: &BoundValue) -> Option<ImmediateOrd> {
    match value {
        BoundValue::Immediate(expr) => immediate_ord(expr),
        BoundValue::Variable(_) => None,
    }
}

/// A narrow totally-ordered projection of the literal values this crate
/// reasons about for bound comparison, without needing a full evaluator.
/// Both integer and float literals are compared as `f64` so the ordering
/// is meaningful across the two kinds, not just within one.
type ImmediateOrd = f64;

fn immediate_ord(expr: &ScalarExpression) -> Option<ImmediateOrd> {
    use crate::ir::expression::{ExpressionKind, Literal};
    match &expr.kind {
        ExpressionKind::Literal(Literal::Int(v)) => Some(*v as f64),
        ExpressionKind::Literal(Literal::Float(v)) => Some(*v),
        _ => None,
    }
}

fn bound_is_exclusive(bound: &Bound) -> bool {
    matches!(bound, Bound::Exclusive(_))
}

fn bound_value(bound: &Bound) -> Option<&BoundValue> {
    match bound {
        Bound::Infinity => None,
        Bound::Inclusive(v) | Bound::Exclusive(v) => Some(v),
    }
}

fn rebuild(exclusive: bool, value: BoundValue) -> Bound {
    if exclusive {
        Bound::Exclusive(value)
    } else {
        Bound::Inclusive(value)
    }
}

fn intersect_bound(a: Bound, b: Bound, lower: bool) -> Bound {
    match (&a, &b) {
        (Bound::Infinity, _) => b,
        (_, Bound::Infinity) => a,
        _ => {
            let av = bound_value(&a).unwrap().clone();
            let bv = bound_value(&b).unwrap().clone();
            match (immediate_value(&av), immediate_value(&bv)) {
                (Some(x), Some(y)) => {
                    let tighter_is_a = if lower { x >= y } else { x <= y };
                    let (winner_val, ax, bx) = if tighter_is_a {
                        (av, bound_is_exclusive(&a), bound_is_exclusive(&b))
                    } else {
                        (bv, bound_is_exclusive(&b), bound_is_exclusive(&a))
                    };
                    let exclusive = if x == y { ax || bx } else { if tighter_is_a { ax } else { bx } };
                    rebuild(exclusive, winner_val)
                }
                // Variable vs. variable: conflicting identity keeps the
                // first (`a`). Variable vs. immediate: keep the variable
                // side per the "keeps the first variable" rule.
                _ => a,
            }
        }
    }
}

fn union_bound(a: Bound, b: Bound, lower: bool) -> Bound {
    match (&a, &b) {
        (Bound::Infinity, _) | (_, Bound::Infinity) => Bound::Infinity,
        _ => {
            let av = bound_value(&a).unwrap().clone();
            let bv = bound_value(&b).unwrap().clone();
            match (immediate_value(&av), immediate_value(&bv)) {
                (Some(x), Some(y)) => {
                    let weaker_is_a = if lower { x <= y } else { x >= y };
                    let (winner_val, ax, bx) = if weaker_is_a {
                        (av, bound_is_exclusive(&a), bound_is_exclusive(&b))
                    } else {
                        (bv, bound_is_exclusive(&b), bound_is_exclusive(&a))
                    };
                    let exclusive = if x == y { ax && bx } else { if weaker_is_a { ax } else { bx } };
                    rebuild(exclusive, winner_val)
                }
                _ => Bound::Infinity,
            }
        }
    }
}

/// A keyed store from stream variable to [`RangeEntry`], built by
/// disjunction widening and consumed by the scan rewriter.
#[derive(Debug, Clone, Default)]
pub struct RangeHintMap {
    entries: HashMap<VariableId, RangeEntry>,
}

impl RangeHintMap {
    pub fn new() -> Self {
        RangeHintMap::default()
    }

    pub fn get(&self, var: VariableId) -> Option<&RangeEntry> {
        self.entries.get(&var)
    }

    pub fn intersect_lower(&mut self, var: VariableId, bound: Bound) {
        self.entries
            .entry(var)
            .or_insert_with(RangeEntry::unbounded)
            .intersect_lower(bound);
    }

    pub fn intersect_upper(&mut self, var: VariableId, bound: Bound) {
        self.entries
            .entry(var)
            .or_insert_with(RangeEntry::unbounded)
            .intersect_upper(bound);
    }

    pub fn union_lower(&mut self, var: VariableId, bound: Bound) {
        self.entries
            .entry(var)
            .or_insert_with(RangeEntry::unbounded)
            .union_lower(bound);
    }

    pub fn union_upper(&mut self, var: VariableId, bound: Bound) {
        self.entries
            .entry(var)
            .or_insert_with(RangeEntry::unbounded)
            .union_upper(bound);
    }

    /// Merge `other` into `self`, key by key, using `intersect`.
    pub fn merge_intersect(&mut self, other: &RangeHintMap) {
        for (var, entry) in &other.entries {
            self.entries
                .entry(*var)
                .or_insert_with(RangeEntry::unbounded)
                .intersect(entry);
        }
    }

    /// Merge `other` into `self`, key by key, using `union`.
    pub fn merge_union(&mut self, other: &RangeHintMap) {
        for (var, entry) in &other.entries {
            self.entries
                .entry(*var)
                .or_insert_with(RangeEntry::unbounded)
                .union(entry);
        }
    }
}
