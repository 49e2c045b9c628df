//! # Yugawara
//!
//! Intermediate-representation compiler and planner for a relational query
//! engine. Consumes a typed logical plan (relational operators over
//! abstract column/variable descriptors) and produces an executable step
//! plan (physical steps exchanging rows across stage boundaries).
//!
//! ## Pipeline
//!
//! ```text
//! operator graph
//!     |
//! [analyzer]            resolve scalar/relation types           (C1-C3)
//!     |
//! [predicate toolkit]   decompose, inline, simplify, widen       (C4)
//!     |
//! [rewrite::scan/join]  index-driven scan/join rewrite           (C5)
//!     |
//! [analyzer]            re-resolve newly introduced nodes
//!     |
//! [block]               partition into blocks, compute liveness  (C6)
//!     |
//! [step::collector]     lower to the physical step plan          (C7)
//!     |
//! step plan graph
//! ```
//!
//! [`driver::compile`] runs the full pipeline; [`driver::inspect`] runs
//! only resolution, for testing.

pub mod analyzer;
pub mod block;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod ir;
pub mod predicate;
pub mod provider;
pub mod resolution;
pub mod rewrite;
pub mod step;
pub mod types;

pub use config::PlannerConfig;
pub use driver::{compile, compile_statement, inspect, CompileResult, CompiledInfo, CompilerOptions};
pub use error::YugawaraError;
