//! Statement-level compiler input (§4.9): a relational graph is one kind
//! of input the driver accepts; these are the others.

use crate::ir::graph::Graph;
use crate::provider::{Index, Table};
use std::sync::Arc;

/// The compiler's top-level input: a relational graph wrapped in an
/// `execute`/`write` statement, a DDL statement, or `empty`. DDL statements
/// carry no scalar expressions and never reach the analyzer beyond a
/// pass-through resolve.
#[derive(Debug, Clone)]
pub enum Statement {
    Execute(Graph),
    Write(Graph),
    CreateTable(Table),
    DropTable(Arc<str>),
    CreateIndex(Index),
    DropIndex(Arc<str>),
    Empty,
}

impl Statement {
    /// The embedded graph, for statements that carry one.
    pub fn graph(&self) -> Option<&Graph> {
        match self {
            Statement::Execute(g) | Statement::Write(g) => Some(g),
            _ => None,
        }
    }
}
