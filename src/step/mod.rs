//! Step plan graph (§3, §4.8): the physical steps produced by lowering the
//! rewritten intermediate graph. [`collector`] performs the lowering;
//! this module only owns the step vocabulary and its graph container.

pub mod collector;

use crate::ir::relation::JoinKind;
use crate::resolution::VariableId;
use std::sync::Arc;

/// A stable handle to a step in a [`StepGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u32);

/// The kind of exchange carrying rows across a stage boundary.
#[derive(Debug, Clone)]
pub enum Exchange {
    Forward {
        limit: Option<u64>,
    },
    Group {
        keys: Vec<VariableId>,
        sort_keys: Vec<VariableId>,
        limit: Option<u64>,
        /// `true` for a distinct-style group (equivalence collapse to one
        /// row per key), `false` for a plain grouping exchange.
        equivalence: bool,
    },
    Aggregate {
        keys: Vec<VariableId>,
        partial_aggregators: Vec<Arc<str>>,
    },
    Broadcast,
}

/// A physical operator consuming one or more exchanges.
#[derive(Debug, Clone)]
pub enum PhysicalOp {
    TakeFlat {
        exchange: StepId,
    },
    TakeGroup {
        exchange: StepId,
    },
    TakeCogroup {
        left: StepId,
        right: StepId,
    },
    Flatten,
    Offer {
        exchange: StepId,
        source: VariableId,
    },
    JoinGroup {
        kind: JoinKind,
        condition: Arc<crate::ir::expression::ScalarExpression>,
    },
    JoinFind {
        kind: JoinKind,
        index: Arc<str>,
    },
    JoinScan {
        kind: JoinKind,
        index: Arc<str>,
    },
    AggregateGroup {
        columns: Vec<VariableId>,
    },
    Intersection,
    Difference,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    Exchange(Exchange),
    Physical(PhysicalOp),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub inputs: Vec<StepId>,
    pub outputs: Vec<StepId>,
}

/// The physical step plan graph produced by C7.
#[derive(Debug, Clone, Default)]
pub struct StepGraph {
    steps: Vec<Step>,
}

impl StepGraph {
    pub fn new() -> Self {
        StepGraph::default()
    }

    pub fn insert(&mut self, kind: StepKind) -> StepId {
        let id = StepId(self.steps.len() as u32);
        self.steps.push(Step {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        id
    }

    pub fn connect(&mut self, upstream: StepId, downstream: StepId) {
        self.steps[downstream.0 as usize].inputs.push(upstream);
        self.steps[upstream.0 as usize].outputs.push(downstream);
    }

    pub fn get(&self, id: StepId) -> &Step {
        &self.steps[id.0 as usize]
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_ids(&self) -> impl Iterator<Item = StepId> {
        (0..self.steps.len() as u32).map(StepId)
    }
}
