//! Scan/join rewriters (C5): the index-driven plan rewrites that turn
//! intermediate scans and joins into concrete lookups/scans against the
//! storage provider's indexes.

pub mod join;
pub mod prune;
pub mod scan;

use crate::provider::{IndexEstimate, KeyRange};

/// Configuration flags consulted by both rewriters (§4.5, §6).
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    pub enable_join_scan: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        RewriteOptions {
            enable_join_scan: true,
        }
    }
}

/// A scored index candidate, carried between candidate enumeration and
/// selection so callers can log the losing candidates too (§10).
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub index: crate::provider::Index,
    pub estimate: IndexEstimate,
    pub key_ranges: Vec<KeyRange>,
}
