//! # Variable & Expression Resolution (C2)
//!
//! Key→resolution stores keyed by variable identity and by expression-node
//! identity respectively, following the same "session shadows persistent,
//! last write wins unless told otherwise" map discipline the catalog module
//! uses for schema lookups.

use crate::types::Type;
use std::collections::HashMap;
use std::sync::Arc;

/// An opaque identity for a variable descriptor. The core never interprets
/// the payload — only compares identity and uses it as a map key.
///
/// Real descriptors (table columns, exchange columns, frame/stream/local
/// variables, externally bound variables) are owned by the catalog/binding
/// layer (§6); this crate only needs a stable, hashable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u64);

/// Which kind of descriptor a [`VariableId`] denotes. Carried alongside the
/// id purely for diagnostics and liveness bookkeeping — resolution lookups
/// are keyed on the id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    TableColumn,
    ExchangeColumn,
    FrameVariable,
    StreamVariable,
    LocalVariable,
    ExternalVariable,
}

/// An opaque identity for an expression tree node, used as the key into the
/// expression mapping. Assigned by the node's allocating arena (see
/// [`crate::ir::graph`]); stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A reference to a catalog-owned function or aggregate declaration,
/// opaque to the core beyond its identity and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationRef(pub Arc<str>);

/// The resolution recorded for a variable descriptor: what it denotes, and
/// therefore what its type is.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableResolution {
    /// No resolution has been computed yet.
    Unresolved,
    /// Resolved to a bare type with no further provenance (e.g. an
    /// `unknown`-typed placeholder).
    Unknown(Type),
    /// Resolved to the type of a scalar expression elsewhere in the tree.
    /// The node id lets callers walk back to that expression via the
    /// expression mapping.
    ScalarExpression(NodeId, Type),
    /// Resolved to a concrete table column.
    TableColumn {
        table: Arc<str>,
        column: Arc<str>,
        r#type: Type,
    },
    /// Resolved to an externally-declared variable (e.g. a host-language
    /// parameter binding).
    External(DeclarationRef, Type),
    /// Resolved to the result of a function call.
    FunctionCall(DeclarationRef, Type),
    /// Resolved to the result of an aggregation.
    Aggregation(DeclarationRef, Type),
}

impl VariableResolution {
    /// Every resolution exposes a unique well-defined type (§3), except the
    /// empty `Unresolved` placeholder.
    pub fn resolved_type(&self) -> Option<&Type> {
        match self {
            VariableResolution::Unresolved => None,
            VariableResolution::Unknown(t)
            | VariableResolution::ScalarExpression(_, t)
            | VariableResolution::TableColumn { r#type: t, .. }
            | VariableResolution::External(_, t)
            | VariableResolution::FunctionCall(_, t)
            | VariableResolution::Aggregation(_, t) => Some(t),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, VariableResolution::Unresolved)
    }
}

/// The resolution recorded for an expression-tree node: `None` until C3
/// fills it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionResolution(pub Option<Type>);

impl ExpressionResolution {
    pub fn empty() -> Self {
        ExpressionResolution(None)
    }

    pub fn of(t: Type) -> Self {
        ExpressionResolution(Some(t))
    }

    pub fn r#type(&self) -> Option<&Type> {
        self.0.as_ref()
    }
}

/// A generic key→resolution store. Used for both the variable mapping
/// (keyed by [`VariableId`]) and the expression mapping (keyed by
/// [`NodeId`]) — the mutation contract (§4.2) is identical for both.
#[derive(Debug, Default)]
pub struct ResolutionMap<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> ResolutionMap<K, V>
where
    K: std::hash::Hash + Eq + Copy,
{
    pub fn new() -> Self {
        ResolutionMap {
            entries: HashMap::new(),
        }
    }

    /// Bind `key` to `resolution`. Without `overwrite`, rebinding an
    /// already-bound key is a caller bug — it panics, matching the "Invalid
    /// IR" failure family rather than the diagnostic channel.
    pub fn bind(&mut self, key: K, resolution: V, overwrite: bool) {
        if !overwrite && self.entries.contains_key(&key) {
            panic!("resolution map: key already bound and overwrite was not requested");
        }
        self.entries.insert(key, resolution);
    }

    pub fn unbind(&mut self, key: K) -> Option<V> {
        self.entries.remove(&key)
    }

    pub fn find(&self, key: K) -> Option<&V> {
        self.entries.get(&key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn each(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key→resolution store for variable descriptors.
pub type VariableMapping = ResolutionMap<VariableId, VariableResolution>;
/// Key→resolution store for expression-tree nodes.
pub type ExpressionMapping = ResolutionMap<NodeId, ExpressionResolution>;
