//! # Type System
//!
//! The [`Type`] sum, its [`Category`] classification, and the process-wide
//! interning [`repository`]. Promotion, unification, and convertibility live
//! in [`conversion`] — this module only owns the data model.

pub mod conversion;
pub mod repository;

use crate::error::TypeError;
use std::sync::Arc;

/// An optional time zone annotation on a temporal type. `None` means "no
/// zone" (a floating / local time); `Some` carries an IANA-ish zone label.
pub type TimeZone = Option<Arc<str>>;

/// A field of a [`Type::Record`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordField {
    pub name: Arc<str>,
    pub r#type: Type,
}

/// Every scalar and composite type the analyzer reasons about.
///
/// `Error` and `Pending` are the two "stop" variants: every conversion
/// short-circuits through them (see [`conversion`]). They let the analyzer
/// distinguish "this input was already reported as malformed" from
/// "everything upstream was fine but this operator is ill-formed".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Boolean,
    Int1,
    Int2,
    Int4,
    Int8,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Float4,
    Float8,
    Character {
        varying: bool,
        length: Option<u32>,
    },
    Octet {
        varying: bool,
        length: Option<u32>,
    },
    Bit {
        varying: bool,
        length: Option<u32>,
    },
    Date,
    TimeOfDay {
        zone: TimeZone,
    },
    TimePoint {
        zone: TimeZone,
    },
    TimeInterval,
    Array(Arc<Type>),
    Record(Arc<[RecordField]>),
    /// A user-declared nominal type, identified by an opaque id assigned by
    /// the catalog. Two `Declared` types are equal iff their ids match.
    Declared(u64),
    /// An escape hatch for extension types the core does not otherwise
    /// model, tagged by name. `error` and `pending` are reserved tags
    /// constructed via [`Type::error`] / [`Type::pending`].
    Extension(Arc<str>),
    Unknown,
}

impl Type {
    /// The stop type reported alongside a diagnostic: "this node is
    /// malformed and downstream nodes should not re-report it".
    pub fn error() -> Self {
        Type::Extension(Arc::from("error"))
    }

    /// The stop type propagated when an input was already `error`/`pending`:
    /// "something upstream is wrong, but it is not this node's fault".
    pub fn pending() -> Self {
        Type::Extension(Arc::from("pending"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Extension(tag) if &**tag == "error")
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Type::Extension(tag) if &**tag == "pending")
    }

    /// Either stop variant. Stop types short-circuit every conversion.
    pub fn is_stop(&self) -> bool {
        self.is_error() || self.is_pending()
    }

    pub fn character(varying: bool, length: Option<u32>) -> Result<Self, TypeError> {
        if let Some(0) = length {
            return Err(TypeError::InvalidDeclaredLength(0));
        }
        Ok(Type::Character { varying, length })
    }

    pub fn decimal(precision: Option<u32>, scale: Option<u32>) -> Result<Self, TypeError> {
        if let Some(p) = precision {
            if p == 0 || p > 38 {
                return Err(TypeError::InvalidDecimalPrecision(p));
            }
            if let Some(s) = scale {
                if s > p {
                    return Err(TypeError::InvalidDecimalScale {
                        precision: p,
                        scale: s,
                    });
                }
            }
        }
        Ok(Type::Decimal { precision, scale })
    }

    /// Classify this type into the category used by the promotion tables.
    pub fn category(&self) -> Category {
        match self {
            Type::Boolean => Category::Boolean,
            Type::Int1 | Type::Int2 | Type::Int4 | Type::Int8 | Type::Decimal { .. } => {
                Category::Number
            }
            Type::Float4 | Type::Float8 => Category::Number,
            Type::Character { .. } => Category::CharacterString,
            Type::Octet { .. } => Category::OctetString,
            Type::Bit { .. } => Category::BitString,
            Type::Date | Type::TimeOfDay { .. } | Type::TimePoint { .. } => Category::Temporal,
            Type::TimeInterval => Category::TimeInterval,
            Type::Array(_) => Category::Collection,
            Type::Record(_) => Category::Structure,
            Type::Declared(_) => Category::Unique,
            Type::Extension(tag) if &**tag == "error" || &**tag == "pending" => {
                Category::Unresolved
            }
            Type::Extension(_) => Category::External,
            Type::Unknown => Category::Unknown,
        }
    }

    /// Is this one of the fixed-width integer kinds?
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int1 | Type::Int2 | Type::Int4 | Type::Int8)
    }

    /// Bit width of an integer type, used to decide narrowing in promotion.
    fn integer_width(&self) -> Option<u32> {
        match self {
            Type::Int1 => Some(8),
            Type::Int2 => Some(16),
            Type::Int4 => Some(32),
            Type::Int8 => Some(64),
            _ => None,
        }
    }
}

/// The coarse classification every [`Type`] maps to, used to drive the
/// binary promotion tables and the assignability tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Boolean,
    Number,
    CharacterString,
    OctetString,
    BitString,
    Temporal,
    TimeInterval,
    Collection,
    Structure,
    Unique,
    Unknown,
    External,
    Unresolved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_types_round_trip() {
        assert!(Type::error().is_error());
        assert!(Type::error().is_stop());
        assert!(Type::pending().is_pending());
        assert!(Type::pending().is_stop());
        assert!(!Type::Boolean.is_stop());
    }

    #[test]
    fn category_is_pure_function_of_kind() {
        assert_eq!(Type::Boolean.category(), Category::Boolean);
        assert_eq!(Type::Int4.category(), Category::Number);
        assert_eq!(
            Type::decimal(Some(10), Some(2)).unwrap().category(),
            Category::Number
        );
        assert_eq!(Type::Date.category(), Category::Temporal);
        assert_eq!(Type::TimeInterval.category(), Category::TimeInterval);
        assert_eq!(Type::Unknown.category(), Category::Unknown);
        assert_eq!(Type::error().category(), Category::Unresolved);
        assert_eq!(Type::pending().category(), Category::Unresolved);
    }

    #[test]
    fn decimal_rejects_bad_precision_scale() {
        assert!(Type::decimal(Some(0), None).is_err());
        assert!(Type::decimal(Some(39), None).is_err());
        assert!(Type::decimal(Some(5), Some(10)).is_err());
        assert!(Type::decimal(Some(10), Some(5)).is_ok());
    }

    #[test]
    fn character_rejects_zero_length() {
        assert!(Type::character(true, Some(0)).is_err());
        assert!(Type::character(true, Some(10)).is_ok());
        assert!(Type::character(true, None).is_ok());
    }

    #[test]
    fn structural_equality() {
        let a = Type::decimal(Some(10), Some(2)).unwrap();
        let b = Type::decimal(Some(10), Some(2)).unwrap();
        let c = Type::decimal(Some(10), Some(3)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
