//! External interfaces (§6): storage provider, function/aggregate
//! provider, and index estimator. These are the only collaborators the
//! core consumes through a trait boundary rather than owning directly.

use crate::ir::relation::RangeEndpoint;
use crate::types::Type;
use dashmap::DashMap;
use std::sync::Arc;

/// A stored table's shape: its name and declared columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: Arc<str>,
    pub columns: Vec<(Arc<str>, Type)>,
}

/// Whether an index is the table's primary key, a secondary unique index,
/// or a non-unique (ordered) secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Ordered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: Arc<str>,
    pub table: Arc<str>,
    pub kind: IndexKind,
    pub key_columns: Vec<Arc<str>>,
    /// Whether every column the query needs is covered by the index itself
    /// (an "index-only" scan that never touches the base table).
    pub index_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: Arc<str>,
    pub start: i64,
    pub increment: i64,
}

/// Read-only storage provider contract (§6). `find_*` never blocks beyond
/// the internal lock; `each_*` iterates alphabetically by simple name.
pub trait StorageProvider: Send + Sync {
    fn find_relation(&self, name: &str) -> Option<Table>;
    fn find_index(&self, name: &str) -> Option<Index>;
    fn find_primary_index(&self, table: &str) -> Option<Index>;
    fn each_relation(&self, callback: &mut dyn FnMut(&Table));
    fn each_index(&self, callback: &mut dyn FnMut(&Index));
    fn find_sequence(&self, name: &str) -> Option<Sequence>;
}

/// The mutable extension of [`StorageProvider`] (§6). Implementations may
/// chain to a parent provider: lookups fall through to the parent when a
/// name is missing locally, while adds are always local and shadow (never
/// mutate) a parent entry of the same name.
pub trait ConfigurableStorageProvider: StorageProvider {
    fn add_relation(&self, table: Table, overwrite: bool) -> Result<Table, ProviderError>;
    fn add_index(&self, index: Index, overwrite: bool) -> Result<(), ProviderError>;
    fn add_sequence(&self, sequence: Sequence, overwrite: bool) -> Result<(), ProviderError>;
    fn remove_relation(&self, name: &str) -> bool;
    fn remove_index(&self, name: &str) -> bool;
    fn remove_sequence(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProviderError {
    #[error("relation {0:?} already exists")]
    DuplicateRelation(String),
    #[error("index {0:?} already exists")]
    DuplicateIndex(String),
    #[error("sequence {0:?} already exists")]
    DuplicateSequence(String),
}

/// An in-memory [`StorageProvider`]/[`ConfigurableStorageProvider`]
/// implementation with optional parent fallthrough, for tests and the
/// inspector binary. Mirrors the session-shadows-persistent catalog
/// discipline: a session-local provider can wrap a shared parent.
pub struct InMemoryStorageProvider {
    parent: Option<Arc<dyn StorageProvider>>,
    relations: DashMap<String, Table>,
    indexes: DashMap<String, Index>,
    sequences: DashMap<String, Sequence>,
}

impl InMemoryStorageProvider {
    pub fn new() -> Self {
        InMemoryStorageProvider {
            parent: None,
            relations: DashMap::new(),
            indexes: DashMap::new(),
            sequences: DashMap::new(),
        }
    }

    pub fn with_parent(parent: Arc<dyn StorageProvider>) -> Self {
        InMemoryStorageProvider {
            parent: Some(parent),
            relations: DashMap::new(),
            indexes: DashMap::new(),
            sequences: DashMap::new(),
        }
    }
}

impl Default for InMemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for InMemoryStorageProvider {
    fn find_relation(&self, name: &str) -> Option<Table> {
        self.relations
            .get(name)
            .map(|r| r.value().clone())
            .or_else(|| self.parent.as_ref().and_then(|p| p.find_relation(name)))
    }

    fn find_index(&self, name: &str) -> Option<Index> {
        self.indexes
            .get(name)
            .map(|r| r.value().clone())
            .or_else(|| self.parent.as_ref().and_then(|p| p.find_index(name)))
    }

    fn find_primary_index(&self, table: &str) -> Option<Index> {
        self.indexes
            .iter()
            .find(|e| e.value().table.as_ref() == table && e.value().kind == IndexKind::Primary)
            .map(|e| e.value().clone())
            .or_else(|| self.parent.as_ref().and_then(|p| p.find_primary_index(table)))
    }

    fn each_relation(&self, callback: &mut dyn FnMut(&Table)) {
        let mut names: Vec<_> = self.relations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        for name in names {
            if let Some(entry) = self.relations.get(&name) {
                callback(entry.value());
            }
        }
    }

    fn each_index(&self, callback: &mut dyn FnMut(&Index)) {
        let mut names: Vec<_> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        for name in names {
            if let Some(entry) = self.indexes.get(&name) {
                callback(entry.value());
            }
        }
    }

    fn find_sequence(&self, name: &str) -> Option<Sequence> {
        self.sequences
            .get(name)
            .map(|r| r.value().clone())
            .or_else(|| self.parent.as_ref().and_then(|p| p.find_sequence(name)))
    }
}

impl ConfigurableStorageProvider for InMemoryStorageProvider {
    fn add_relation(&self, table: Table, overwrite: bool) -> Result<Table, ProviderError> {
        if !overwrite && self.relations.contains_key(table.name.as_ref()) {
            return Err(ProviderError::DuplicateRelation(table.name.to_string()));
        }
        self.relations.insert(table.name.to_string(), table.clone());
        Ok(table)
    }

    fn add_index(&self, index: Index, overwrite: bool) -> Result<(), ProviderError> {
        if !overwrite && self.indexes.contains_key(index.name.as_ref()) {
            return Err(ProviderError::DuplicateIndex(index.name.to_string()));
        }
        self.indexes.insert(index.name.to_string(), index);
        Ok(())
    }

    fn add_sequence(&self, sequence: Sequence, overwrite: bool) -> Result<(), ProviderError> {
        if !overwrite && self.sequences.contains_key(sequence.name.as_ref()) {
            return Err(ProviderError::DuplicateSequence(sequence.name.to_string()));
        }
        self.sequences.insert(sequence.name.to_string(), sequence);
        Ok(())
    }

    fn remove_relation(&self, name: &str) -> bool {
        self.relations.remove(name).is_some()
    }

    fn remove_index(&self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    fn remove_sequence(&self, name: &str) -> bool {
        self.sequences.remove(name).is_some()
    }
}

/// A function or aggregate declaration, dispatched by `(name,
/// parameter_count)` for overload resolution. The `#distinct` suffix
/// convention marks a DISTINCT-quantified aggregate variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub definition_id: u64,
    pub name: Arc<str>,
    pub return_type: Type,
    pub parameter_types: Vec<Type>,
    pub incremental: bool,
}

/// Function/aggregate provider (§6): stores declarations keyed by name
/// (multimap) and dispatches by `(name, parameter_count)`.
pub struct FunctionProvider {
    declarations: DashMap<String, Vec<Declaration>>,
}

impl FunctionProvider {
    pub fn new() -> Self {
        FunctionProvider {
            declarations: DashMap::new(),
        }
    }

    pub fn register(&self, declaration: Declaration) {
        self.declarations
            .entry(declaration.name.to_string())
            .or_default()
            .push(declaration);
    }

    pub fn resolve(&self, name: &str, parameter_count: usize) -> Option<Declaration> {
        self.declarations.get(name).and_then(|overloads| {
            overloads
                .value()
                .iter()
                .find(|d| d.parameter_types.len() == parameter_count)
                .cloned()
        })
    }

    pub fn resolve_distinct_aggregate(&self, name: &str, parameter_count: usize) -> Option<Declaration> {
        self.resolve(&format!("{name}#distinct"), parameter_count)
    }
}

impl Default for FunctionProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// A candidate index's estimated cost, as returned by [`IndexEstimator`].
/// `score` is dimensionless and used only for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEstimate {
    pub row_count: u64,
    pub score: f64,
    pub index_only: bool,
}

/// The key ranges derived for a candidate index's prefix columns, passed to
/// the estimator alongside the residual predicate conjuncts.
#[derive(Debug, Clone)]
pub struct KeyRange {
    pub column: Arc<str>,
    pub lower: RangeEndpoint,
    pub upper: RangeEndpoint,
}

/// Index selection estimator (§6). Must be deterministic and
/// side-effect-free within a single compile invocation.
pub trait IndexEstimator: Send + Sync {
    fn estimate(
        &self,
        index: &Index,
        key_ranges: &[KeyRange],
        residual_conjuncts: usize,
        needs_ordered: bool,
    ) -> IndexEstimate;
}

/// Pick the best-scoring candidate: highest score first, tie-broken by
/// primary → unique → ordered, then by smaller row count, then by
/// candidate order (stable — first in the input wins remaining ties).
pub fn select_best_index<'a>(
    candidates: &[(&'a Index, IndexEstimate)],
) -> Option<&'a Index> {
    candidates
        .iter()
        .enumerate()
        .max_by(|(ia, (a_idx, a_est)), (ib, (b_idx, b_est))| {
            a_est
                .score
                .partial_cmp(&b_est.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| index_kind_rank(a_idx.kind).cmp(&index_kind_rank(b_idx.kind)))
                .then_with(|| b_est.row_count.cmp(&a_est.row_count))
                .then_with(|| ib.cmp(ia))
        })
        .map(|(_, (idx, _))| *idx)
}

fn index_kind_rank(kind: IndexKind) -> u8 {
    match kind {
        IndexKind::Primary => 0,
        IndexKind::Unique => 1,
        IndexKind::Ordered => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        Table {
            name: Arc::from(name),
            columns: vec![],
        }
    }

    #[test]
    fn add_relation_without_overwrite_rejects_duplicate() {
        let provider = InMemoryStorageProvider::new();
        provider.add_relation(table("t"), false).unwrap();
        assert!(provider.add_relation(table("t"), false).is_err());
        assert!(provider.add_relation(table("t"), true).is_ok());
    }

    #[test]
    fn child_shadows_parent_without_mutating_it() {
        let parent_concrete = Arc::new(InMemoryStorageProvider::new());
        parent_concrete.add_relation(table("shared"), false).unwrap();
        let parent: Arc<dyn StorageProvider> = parent_concrete.clone();
        let child = InMemoryStorageProvider::with_parent(parent.clone());
        child
            .add_relation(
                Table {
                    name: Arc::from("shared"),
                    columns: vec![(Arc::from("x"), Type::Int4)],
                },
                true,
            )
            .unwrap();
        assert_eq!(child.find_relation("shared").unwrap().columns.len(), 1);
        assert_eq!(parent.find_relation("shared").unwrap().columns.len(), 0);
    }

    #[test]
    fn function_provider_dispatches_by_arity() {
        let provider = FunctionProvider::new();
        provider.register(Declaration {
            definition_id: 1,
            name: Arc::from("concat"),
            return_type: Type::Character {
                varying: true,
                length: None,
            },
            parameter_types: vec![Type::Character {
                varying: true,
                length: None,
            }],
            incremental: false,
        });
        provider.register(Declaration {
            definition_id: 2,
            name: Arc::from("concat"),
            return_type: Type::Character {
                varying: true,
                length: None,
            },
            parameter_types: vec![
                Type::Character {
                    varying: true,
                    length: None,
                },
                Type::Character {
                    varying: true,
                    length: None,
                },
            ],
            incremental: false,
        });
        assert_eq!(provider.resolve("concat", 1).unwrap().definition_id, 1);
        assert_eq!(provider.resolve("concat", 2).unwrap().definition_id, 2);
        assert!(provider.resolve("concat", 3).is_none());
    }

    #[test]
    fn select_best_index_prefers_primary_on_tie() {
        let primary = Index {
            name: Arc::from("pk"),
            table: Arc::from("t"),
            kind: IndexKind::Primary,
            key_columns: vec![Arc::from("id")],
            index_only: false,
        };
        let unique = Index {
            name: Arc::from("uq"),
            table: Arc::from("t"),
            kind: IndexKind::Unique,
            key_columns: vec![Arc::from("id")],
            index_only: false,
        };
        let est = IndexEstimate {
            row_count: 1,
            score: 10.0,
            index_only: false,
        };
        let candidates = vec![(&unique, est), (&primary, est)];
        let best = select_best_index(&candidates).unwrap();
        assert_eq!(best.name.as_ref(), "pk");
    }
}
