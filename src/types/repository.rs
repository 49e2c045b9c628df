//! Global type repository: interns [`Type`] values so identical types share
//! storage, as required by §3 ("Types are immutable and interned through a
//! repository so identical types share storage").
//!
//! Mirrors the locking discipline the reference catalog uses for its schema
//! maps: readers take a shared lock, writers (here, first-time interning)
//! take it briefly and release before returning.

use super::Type;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A handle to an interned type. Cheap to clone and compare: equality is
/// `Arc::ptr_eq` when both handles came from the same repository, falling
/// back to structural comparison otherwise (e.g. across two private test
/// repositories).
#[derive(Debug, Clone)]
pub struct InternedType(Arc<Type>);

impl InternedType {
    pub fn get(&self) -> &Type {
        &self.0
    }
}

impl PartialEq for InternedType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}
impl Eq for InternedType {}

impl std::ops::Deref for InternedType {
    type Target = Type;
    fn deref(&self) -> &Type {
        &self.0
    }
}

/// An interning map from [`Type`] to a shared handle. Callers may construct
/// a private repository for test isolation instead of using the process-wide
/// singleton returned by [`global`].
#[derive(Default)]
pub struct TypeRepository {
    table: RwLock<HashMap<Type, Arc<Type>>>,
}

impl TypeRepository {
    pub fn new() -> Self {
        TypeRepository {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Intern `t`, returning a handle shared with any prior interning of an
    /// equal type.
    pub fn intern(&self, t: Type) -> InternedType {
        if let Some(existing) = self.table.read().get(&t) {
            return InternedType(existing.clone());
        }
        let mut table = self.table.write();
        // Re-check: another writer may have interned it while we waited.
        if let Some(existing) = table.get(&t) {
            return InternedType(existing.clone());
        }
        let arc = Arc::new(t.clone());
        table.insert(t, arc.clone());
        InternedType(arc)
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide repository, lazily initialised on first use. Teardown is
/// left to process teardown, matching the design note in §9.
static GLOBAL: OnceLock<TypeRepository> = OnceLock::new();

pub fn global() -> &'static TypeRepository {
    GLOBAL.get_or_init(TypeRepository::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_storage_for_equal_types() {
        let repo = TypeRepository::new();
        let a = repo.intern(Type::Int4);
        let b = repo.intern(Type::Int4);
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn distinct_types_get_distinct_storage() {
        let repo = TypeRepository::new();
        let a = repo.intern(Type::Int4);
        let b = repo.intern(Type::Int8);
        assert_ne!(a.get(), b.get());
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn global_repository_is_a_singleton() {
        let a = global().intern(Type::Boolean);
        let b = global().intern(Type::Boolean);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }
}
