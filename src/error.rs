//! Crate-wide error types.
//!
//! The diagnostic channel (see [`crate::diagnostics`]) carries *user* errors —
//! things a query author can fix. Everything in this module is an *ambient*
//! failure: a caller contract violated, a malformed on-disk config, a
//! resolution map misused. None of these are ever folded into a
//! [`crate::diagnostics::Diagnostic`] list.

use thiserror::Error;

/// Errors raised while constructing or promoting a [`crate::types::Type`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    #[error("decimal precision must be between 1 and 38, got {0}")]
    InvalidDecimalPrecision(u32),
    #[error("decimal scale {scale} cannot exceed precision {precision}")]
    InvalidDecimalScale { precision: u32, scale: u32 },
    #[error("declared length must be positive, got {0}")]
    InvalidDeclaredLength(u32),
}

/// Errors raised by the resolution maps (C2).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("key is already bound and overwrite was not requested")]
    AlreadyBound,
    #[error("key has no resolution recorded")]
    Unbound,
}

/// The "Invalid IR" failure family from the error-handling design: malformed
/// graphs, mismatched ports, and violated block/liveness invariants. These
/// indicate a caller bug, not a user-facing diagnostic.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("operator graph has no entry operator")]
    NoEntry,
    #[error("operator graph has multiple entry operators: {0:?}")]
    MultipleEntries(Vec<u32>),
    #[error("operator {0:?} references unregistered input {1:?}")]
    UnregisteredInput(u32, u32),
    #[error("variable is defined more than once: {0:?}")]
    MultiplyDefinedVariable(String),
    #[error("variable used before any definition: {0:?}")]
    UndefinedVariableUse(String),
    #[error("operator {0:?} expects {1} input(s), found {2}")]
    PortArityMismatch(u32, usize, usize),
    #[error("values row has {actual} elements, expected {expected}")]
    InconsistentRowArity { expected: usize, actual: usize },
}

/// Errors raised while loading [`crate::config::PlannerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load planner configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Aggregate error type for integration points (tests, the inspector binary)
/// that want a single `anyhow`-compatible error rather than matching on each
/// family above.
#[derive(Debug, Error)]
pub enum YugawaraError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
