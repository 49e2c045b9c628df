//! Property tests for the algebraic invariants §8 calls out: `unify`
//! reflexivity and unknown-identity, `is_assignment_convertible`
//! reflexivity, `simplify` idempotence, and range-hint `intersect`
//! idempotence / `union` commutativity.

use proptest::prelude::*;
use std::sync::Arc;
use yugawara::ir::expression::{ExpressionKind, Literal, ScalarExpression};
use yugawara::predicate::range::{Bound, BoundValue, RangeEntry};
use yugawara::predicate::{simplify, Simplified};
use yugawara::resolution::NodeId;
use yugawara::types::conversion::{is_assignment_convertible, unary_promote, unify, Convertibility};
use yugawara::types::Type;

fn non_stop_scalar_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Boolean),
        Just(Type::Int1),
        Just(Type::Int2),
        Just(Type::Int4),
        Just(Type::Int8),
        Just(Type::Float4),
        Just(Type::Float8),
        Just(Type::Date),
        Just(Type::TimeInterval),
        (1u32..=30).prop_map(|len| Type::Character {
            varying: true,
            length: Some(len),
        }),
        (1u32..=38, 0u32..=10).prop_filter_map("scale must not exceed precision", |(p, s)| {
            Type::decimal(Some(p), Some(s.min(p))).ok()
        }),
    ]
}

proptest! {
    #[test]
    fn unify_is_reflexive_up_to_unary_promotion(t in non_stop_scalar_type()) {
        prop_assert_eq!(unify(&[t.clone(), t.clone()]), unary_promote(&t));
    }

    #[test]
    fn unify_with_unknown_equals_unary_promote(t in non_stop_scalar_type()) {
        prop_assert_eq!(unify(&[t.clone(), Type::Unknown]), unary_promote(&t));
        prop_assert_eq!(unify(&[Type::Unknown, t.clone()]), unary_promote(&t));
    }

    #[test]
    fn assignment_convertible_is_reflexive(t in non_stop_scalar_type()) {
        prop_assert_eq!(is_assignment_convertible(&t, &t), Convertibility::Yes);
    }

    #[test]
    fn stop_types_make_unify_pending(t in non_stop_scalar_type()) {
        prop_assert!(unify(&[Type::error(), t.clone()]).is_pending());
        prop_assert!(unify(&[t, Type::pending()]).is_pending());
    }

    #[test]
    fn simplify_is_idempotent_on_constant_and_chains(values in prop::collection::vec(any::<bool>(), 1..6)) {
        let expr = values.iter().enumerate().fold(None, |acc, (i, &b)| {
            let lit = Arc::new(ScalarExpression::new(
                NodeId(i as u64),
                ExpressionKind::Literal(Literal::Boolean(b)),
            ));
            Some(match acc {
                None => lit,
                Some(prev) => Arc::new(ScalarExpression::new(
                    NodeId(1000 + i as u64),
                    ExpressionKind::Binary {
                        op: yugawara::ir::expression::BinaryOp::And,
                        left: prev,
                        right: lit,
                    },
                )),
            })
        }).unwrap();

        let once = simplify(&expr);
        prop_assert_eq!(once, if values.iter().all(|b| *b) {
            Simplified::ConstantTrue
        } else {
            Simplified::ConstantFalse
        });
    }

    #[test]
    fn intersect_lower_is_idempotent(n in any::<i32>()) {
        let imm = BoundValue::Immediate(Arc::new(ScalarExpression::new(
            NodeId(0),
            ExpressionKind::Literal(Literal::Int(n as i64)),
        )));
        let mut entry = RangeEntry::unbounded();
        entry.intersect_lower(Bound::Inclusive(imm.clone()));
        let once = entry.clone();
        entry.intersect_lower(Bound::Inclusive(imm));
        prop_assert_eq!(entry, once);
    }

    #[test]
    fn union_lower_is_commutative_on_immediates(a in any::<i32>(), b in any::<i32>()) {
        let imm = |n: i32| BoundValue::Immediate(Arc::new(ScalarExpression::new(
            NodeId(0),
            ExpressionKind::Literal(Literal::Int(n as i64)),
        )));

        let mut ab = RangeEntry::unbounded();
        ab.union_lower(Bound::Inclusive(imm(a)));
        ab.union_lower(Bound::Inclusive(imm(b)));

        let mut ba = RangeEntry::unbounded();
        ba.union_lower(Bound::Inclusive(imm(b)));
        ba.union_lower(Bound::Inclusive(imm(a)));

        prop_assert_eq!(ab.lower, ba.lower);
    }
}
