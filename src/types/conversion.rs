//! Unary/binary promotion, unification, and assignment/cast convertibility.
//!
//! Every entry point here is a pure function over [`Type`] values — no
//! interning, no diagnostics. The analyzer (C3) is the only caller that
//! turns a `Type::error()` result into a [`crate::diagnostics::Diagnostic`].

use super::{Category, Type};

/// Result of an assignment or cast convertibility check. `Unknown` means the
/// question could not be answered because one side was a stop type — the
/// caller should neither accept nor reject on that basis alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convertibility {
    Yes,
    No,
    Unknown,
}

impl Convertibility {
    pub fn is_yes(self) -> bool {
        matches!(self, Convertibility::Yes)
    }
}

/// Unary promotion: the type an expression of kind `t` settles into on its
/// own (e.g. before participating in a binary operator).
pub fn unary_promote(t: &Type) -> Type {
    if t.is_stop() {
        return Type::pending();
    }
    match t.category() {
        Category::Boolean => match t {
            Type::Boolean => Type::Boolean,
            _ => Type::error(),
        },
        Category::Number => match t {
            Type::Unknown => Type::Int4,
            Type::Int1 | Type::Int2 | Type::Int4 => Type::Int4,
            Type::Int8 => Type::Int8,
            Type::Decimal { .. } | Type::Float4 | Type::Float8 => t.clone(),
            _ => Type::error(),
        },
        Category::CharacterString => match t {
            Type::Character { length, .. } => Type::Character {
                varying: true,
                length: *length,
            },
            Type::Unknown => Type::Character {
                varying: true,
                length: Some(0),
            },
            _ => Type::error(),
        },
        Category::OctetString => match t {
            Type::Octet { length, .. } => Type::Octet {
                varying: true,
                length: *length,
            },
            Type::Unknown => Type::Octet {
                varying: true,
                length: Some(0),
            },
            _ => Type::error(),
        },
        Category::BitString => match t {
            Type::Bit { length, .. } => Type::Bit {
                varying: true,
                length: *length,
            },
            Type::Unknown => Type::Bit {
                varying: true,
                length: Some(0),
            },
            _ => Type::error(),
        },
        Category::Temporal => match t {
            Type::Date | Type::TimeOfDay { .. } | Type::TimePoint { .. } => t.clone(),
            Type::Unknown => Type::TimePoint { zone: None },
            _ => Type::error(),
        },
        Category::TimeInterval => match t {
            Type::TimeInterval => Type::TimeInterval,
            Type::Unknown => Type::TimeInterval,
            _ => Type::error(),
        },
        Category::Unknown => Type::Int4,
        _ => t.clone(),
    }
}

/// Decimal precision used when widening an integer kind into a decimal, per
/// the §4.1 table: int1/2/4/8 widen to precision 3/5/10/19.
fn integer_decimal_precision(t: &Type) -> Option<u32> {
    match t {
        Type::Int1 => Some(3),
        Type::Int2 => Some(5),
        Type::Int4 => Some(10),
        Type::Int8 => Some(19),
        _ => None,
    }
}

/// Binary promotion: the common type two operands of a binary scalar
/// operator (arithmetic, comparison) settle into.
pub fn binary_promote(a: &Type, b: &Type) -> Type {
    if a.is_stop() || b.is_stop() {
        return Type::pending();
    }
    if matches!(a, Type::Unknown) && matches!(b, Type::Unknown) {
        return unary_promote(a);
    }
    if matches!(a, Type::Unknown) {
        return unary_promote(b);
    }
    if matches!(b, Type::Unknown) {
        return unary_promote(a);
    }

    match (a.category(), b.category()) {
        (Category::Number, Category::Number) => binary_promote_number(a, b),
        (Category::Boolean, Category::Boolean) => Type::Boolean,
        (Category::CharacterString, Category::CharacterString) => {
            binary_promote_character(a, b)
        }
        (Category::OctetString, Category::OctetString) => binary_promote_octet(a, b),
        (Category::BitString, Category::BitString) => binary_promote_bit(a, b),
        (Category::Temporal, Category::Temporal) => binary_promote_temporal(a, b),
        (Category::TimeInterval, Category::TimeInterval) => Type::TimeInterval,
        (Category::External, Category::External) if a == b => a.clone(),
        _ => Type::error(),
    }
}

fn binary_promote_number(a: &Type, b: &Type) -> Type {
    let a_float = matches!(a, Type::Float4 | Type::Float8);
    let b_float = matches!(b, Type::Float4 | Type::Float8);
    let a_decimal = matches!(a, Type::Decimal { .. });
    let b_decimal = matches!(b, Type::Decimal { .. });

    if a_float || b_float {
        // float x anything-numeric -> float8, except float4 x int1/int2 -> float4.
        let small_int = |t: &Type| matches!(t, Type::Int1 | Type::Int2);
        if matches!(a, Type::Float4) && small_int(b) {
            return Type::Float4;
        }
        if matches!(b, Type::Float4) && small_int(a) {
            return Type::Float4;
        }
        return Type::Float8;
    }

    if a_decimal || b_decimal {
        // integer x decimal -> decimal widened to fit the integer side.
        let (decimal, other) = if a_decimal { (a, b) } else { (b, a) };
        if let Type::Decimal { precision, scale } = decimal {
            if let Some(int_precision) = integer_decimal_precision(other) {
                let widened = precision.map(|p| p.max(int_precision)).or(Some(int_precision));
                return Type::Decimal {
                    precision: widened,
                    scale: *scale,
                };
            }
            return decimal.clone();
        }
        unreachable!("decimal branch guarded by a_decimal || b_decimal");
    }

    // integer x integer -> widest of int4/int8.
    if matches!(a, Type::Int8) || matches!(b, Type::Int8) {
        Type::Int8
    } else {
        Type::Int4
    }
}

fn binary_promote_character(a: &Type, b: &Type) -> Type {
    let (Type::Character { length: la, .. }, Type::Character { length: lb, .. }) = (a, b) else {
        return Type::error();
    };
    let length = match (la, lb) {
        (Some(x), Some(y)) => Some((*x).max(*y)),
        _ => None,
    };
    Type::Character {
        varying: true,
        length,
    }
}

fn binary_promote_octet(a: &Type, b: &Type) -> Type {
    let (Type::Octet { length: la, .. }, Type::Octet { length: lb, .. }) = (a, b) else {
        return Type::error();
    };
    let length = match (la, lb) {
        (Some(x), Some(y)) => Some((*x).max(*y)),
        _ => None,
    };
    Type::Octet {
        varying: true,
        length,
    }
}

fn binary_promote_bit(a: &Type, b: &Type) -> Type {
    let (Type::Bit { length: la, .. }, Type::Bit { length: lb, .. }) = (a, b) else {
        return Type::error();
    };
    let length = match (la, lb) {
        (Some(x), Some(y)) => Some((*x).max(*y)),
        _ => None,
    };
    Type::Bit {
        varying: true,
        length,
    }
}

/// Time-zone promotion: "equal zones preserved; disagreement promotes to
/// UTC; absence is filled from the present side".
fn promote_zone(a: &super::TimeZone, b: &super::TimeZone) -> super::TimeZone {
    match (a, b) {
        (Some(x), Some(y)) if x == y => Some(x.clone()),
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (None, None) => None,
        (Some(_), Some(_)) => Some(std::sync::Arc::from("UTC")),
    }
}

fn binary_promote_temporal(a: &Type, b: &Type) -> Type {
    match (a, b) {
        (Type::Date, Type::Date) => Type::Date,
        (Type::Date, Type::TimeOfDay { .. }) | (Type::TimeOfDay { .. }, Type::Date) => {
            Type::TimePoint { zone: None }
        }
        (Type::Date, Type::TimePoint { zone }) | (Type::TimePoint { zone }, Type::Date) => {
            Type::TimePoint { zone: zone.clone() }
        }
        (Type::TimeOfDay { zone: za }, Type::TimeOfDay { zone: zb }) => Type::TimeOfDay {
            zone: promote_zone(za, zb),
        },
        (Type::TimeOfDay { zone: za }, Type::TimePoint { zone: zb })
        | (Type::TimePoint { zone: zb }, Type::TimeOfDay { zone: za }) => Type::TimePoint {
            zone: promote_zone(za, zb),
        },
        (Type::TimePoint { zone: za }, Type::TimePoint { zone: zb }) => Type::TimePoint {
            zone: promote_zone(za, zb),
        },
        _ => Type::error(),
    }
}

/// The unifying conversion: unary promotion for a single type, binary
/// promotion (with the four special cases) for a pair, left fold for a
/// sequence. Short-circuits on the first stop-type intermediate result.
pub fn unify(types: &[Type]) -> Type {
    match types {
        [] => Type::Unknown,
        [single] => unary_promote(single),
        [first, rest @ ..] => {
            let mut acc = unary_promote(first);
            for t in rest {
                if acc.is_stop() {
                    return acc;
                }
                acc = unify_pair(&acc, t);
            }
            acc
        }
    }
}

fn unify_pair(a: &Type, b: &Type) -> Type {
    if a.is_stop() || b.is_stop() {
        return Type::pending();
    }
    if matches!(a, Type::Unknown) {
        return unary_promote(b);
    }
    if matches!(b, Type::Unknown) {
        return unary_promote(a);
    }
    if let (Type::Extension(ta), Type::Extension(tb)) = (a, b) {
        return if ta == tb {
            a.clone()
        } else {
            Type::error()
        };
    }
    if a.category() != b.category() {
        return Type::error();
    }
    binary_promote(a, b)
}

/// Assignment convertibility: can a value of type `from` be assigned into a
/// slot of type `to`? `Unknown` whenever either side is a stop type.
pub fn is_assignment_convertible(from: &Type, to: &Type) -> Convertibility {
    if from.is_stop() || to.is_stop() {
        return Convertibility::Unknown;
    }
    if matches!(from, Type::Unknown) {
        return Convertibility::Yes;
    }
    let yes = match (from, to) {
        (f, t) if f.category() == Category::Number && t.category() == Category::Number => true,
        (Type::Boolean, Type::Boolean) => true,
        (Type::Character { .. }, Type::Character { .. }) => true,
        (Type::Octet { .. }, Type::Octet { .. }) => true,
        (Type::Bit { .. }, Type::Bit { .. }) => true,
        (Type::Date, Type::Date) => true,
        (Type::Date, Type::TimePoint { .. }) => true,
        (Type::TimeOfDay { zone: zf }, Type::TimeOfDay { zone: zt }) => zf == zt,
        (Type::TimeOfDay { zone: zf }, Type::TimePoint { zone: zt }) => zf == zt,
        (Type::TimePoint { .. }, Type::Date) => true,
        (Type::TimePoint { zone: zf }, Type::TimeOfDay { zone: zt }) => zf == zt,
        (Type::TimePoint { zone: zf }, Type::TimePoint { zone: zt }) => zf == zt,
        (Type::TimeInterval, Type::TimeInterval) => true,
        (Type::Array(ef), Type::Array(et)) => {
            return is_assignment_convertible(ef, et);
        }
        (Type::Record(ff), Type::Record(ft)) => ff == ft,
        (Type::Declared(a), Type::Declared(b)) => a == b,
        (Type::Extension(a), Type::Extension(b)) => a == b,
        _ => false,
    };
    if yes {
        Convertibility::Yes
    } else {
        Convertibility::No
    }
}

/// Cast convertibility extends assignment with a universal escape hatch
/// through `character`: any type may be cast to or from `character`.
pub fn is_cast_convertible(from: &Type, to: &Type) -> Convertibility {
    if from.is_stop() || to.is_stop() {
        return Convertibility::Unknown;
    }
    if matches!(to, Type::Character { .. }) || matches!(from, Type::Character { .. }) {
        return Convertibility::Yes;
    }
    is_assignment_convertible(from, to)
}
