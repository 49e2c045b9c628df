//! User-facing diagnostics (§7): the channel the analyzer and rewriters use
//! to report malformed input without aborting the pipeline. Distinct from
//! [`crate::error`], which carries caller-contract violations.

use std::fmt;

/// A stable identifier for a class of diagnostic, so callers can filter or
/// test against the code rather than matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    UnknownIdentifier,
    AmbiguousReference,
    TypeMismatch,
    InvalidCast,
    UnresolvedFunction,
    UnresolvedAggregate,
    MalformedPredicate,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticCode::UnknownIdentifier => "unknown_identifier",
            DiagnosticCode::AmbiguousReference => "ambiguous_reference",
            DiagnosticCode::TypeMismatch => "type_mismatch",
            DiagnosticCode::InvalidCast => "invalid_cast",
            DiagnosticCode::UnresolvedFunction => "unresolved_function",
            DiagnosticCode::UnresolvedAggregate => "unresolved_aggregate",
            DiagnosticCode::MalformedPredicate => "malformed_predicate",
        };
        f.write_str(s)
    }
}

/// Where in the source text (if any) a diagnostic applies. Planning inputs
/// that have no source text (built programmatically) leave this `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Region {
    pub start: u32,
    pub end: u32,
}

impl Region {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "region start must not exceed end");
        Region { start, end }
    }
}

/// A single reported problem. Collected into a list by the analyzer and its
/// rewriters; never aborts the pipeline on its own (§7: "process continues,
/// tainting the surrounding node with a stop type").
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub region: Option<Region>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            message: message.into(),
            region: None,
        }
    }

    pub fn at(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Serialize to the JSON shape emitted by `yugawara-inspect` and any
    /// caller surfacing diagnostics to a machine-readable log.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// An accumulator for diagnostics raised over the course of a pipeline run.
/// Handed out by [`crate::driver`] alongside the compiled plan.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
