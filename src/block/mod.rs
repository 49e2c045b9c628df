//! Block builder & liveness (C6): partition the operator graph into
//! maximal linear chains and compute per-block define/use/kill sets over
//! stream variables.

use crate::ir::graph::{Graph, NodeId as OpId};
use crate::ir::relation::RelationOp;
use crate::resolution::VariableId;
use std::collections::{HashMap, HashSet};

/// A stable handle to a block within a [`BlockGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// A maximal linear chain of operators (§3): every internal edge is 1-to-1.
#[derive(Debug, Clone)]
pub struct Block {
    pub operators: Vec<OpId>,
    pub upstream: Vec<BlockId>,
    pub downstream: Vec<BlockId>,
    pub define: HashSet<VariableId>,
    pub r#use: HashSet<VariableId>,
    pub kill: HashSet<VariableId>,
}

impl Block {
    pub fn front(&self) -> OpId {
        *self.operators.first().expect("block is never empty")
    }

    pub fn back(&self) -> OpId {
        *self.operators.last().expect("block is never empty")
    }
}

/// The block graph: blocks connected by the same edge invariant as the
/// underlying operator graph. Borrows its operators from `Graph`; the
/// operator graph must outlive any `BlockGraph` built from it.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: Vec<Block>,
    owner: HashMap<OpId, BlockId>,
}

impl BlockGraph {
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn owner_of(&self, op: OpId) -> Option<BlockId> {
        self.owner.get(&op).copied()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }
}

/// Build the block graph for `graph`, sweeping from the entry point.
/// `|B(G)| <= |G|` and every operator appears in exactly one block (§8).
pub fn build_blocks(graph: &Graph) -> BlockGraph {
    let mut owner: HashMap<OpId, BlockId> = HashMap::new();
    let mut blocks: Vec<Vec<OpId>> = Vec::new();
    let mut visited: HashSet<OpId> = HashSet::new();

    for start in graph.node_ids() {
        if visited.contains(&start) {
            continue;
        }
        // Only start a new block at a branch point or a node with no
        // unambiguous upstream inside a block (graph entry, or an
        // already-consumed predecessor).
        if !is_block_start(graph, start) {
            continue;
        }
        let block_id = BlockId(blocks.len() as u32);
        let mut chain = vec![start];
        visited.insert(start);
        owner.insert(start, block_id);
        let mut current = start;
        loop {
            let node = graph.get(current).unwrap();
            if node.outputs.len() != 1 {
                break;
            }
            let next = node.outputs[0];
            let next_node = match graph.get(next) {
                Some(n) => n,
                None => break,
            };
            if next_node.inputs.len() != 1 {
                break;
            }
            if visited.contains(&next) {
                break;
            }
            chain.push(next);
            visited.insert(next);
            owner.insert(next, block_id);
            current = next;
        }
        blocks.push(chain);
    }

    // Any operator not reached by the sweep above (pure linear graph with
    // a single block) still needs to be covered.
    for id in graph.node_ids() {
        if !visited.contains(&id) {
            let block_id = BlockId(blocks.len() as u32);
            owner.insert(id, block_id);
            visited.insert(id);
            blocks.push(vec![id]);
        }
    }

    let mut result_blocks: Vec<Block> = blocks
        .into_iter()
        .map(|operators| Block {
            operators,
            upstream: Vec::new(),
            downstream: Vec::new(),
            define: HashSet::new(),
            r#use: HashSet::new(),
            kill: HashSet::new(),
        })
        .collect();

    wire_block_edges(graph, &owner, &mut result_blocks);
    compute_define_use(graph, &mut result_blocks);

    let mut block_graph = BlockGraph {
        blocks: result_blocks,
        owner,
    };
    compute_kill(graph, &block_graph.owner.clone(), &mut block_graph.blocks);
    block_graph
}

fn is_block_start(graph: &Graph, id: OpId) -> bool {
    if Some(id) == graph.entry() {
        return true;
    }
    let node = graph.get(id).unwrap();
    node.inputs.len() != 1 || graph.is_branch_point(id) || node.inputs.iter().any(|up| graph.is_branch_point(*up))
}

fn wire_block_edges(graph: &Graph, owner: &HashMap<OpId, BlockId>, blocks: &mut [Block]) {
    for i in 0..blocks.len() {
        let front = blocks[i].front();
        let back = blocks[i].back();
        let upstream_ops = graph.get(front).map(|n| n.inputs.clone()).unwrap_or_default();
        let downstream_ops = graph.get(back).map(|n| n.outputs.clone()).unwrap_or_default();
        let this_id = BlockId(i as u32);

        let mut ups: Vec<BlockId> = upstream_ops
            .iter()
            .filter_map(|op| owner.get(op).copied())
            .filter(|b| *b != this_id)
            .collect();
        ups.dedup();
        let mut downs: Vec<BlockId> = downstream_ops
            .iter()
            .filter_map(|op| owner.get(op).copied())
            .filter(|b| *b != this_id)
            .collect();
        downs.dedup();

        blocks[i].upstream = ups;
        blocks[i].downstream = downs;
    }
}

fn compute_define_use(graph: &Graph, blocks: &mut [Block]) {
    for block in blocks.iter_mut() {
        for &op_id in &block.operators {
            let Some(node) = graph.get(op_id) else { continue };
            for var in node.op.defined_variables() {
                block.define.insert(var);
            }
            for var in used_variables(&node.op) {
                block.r#use.insert(var);
            }
        }
    }
}

/// Variables explicitly read by this operator: scalar variable references
/// inside conditions/values/keys, `offer`/`write` sources. `buffer` (not
/// modelled as a distinct op here — see [`RelationOp::Escape`]) produces no
/// implicit uses.
pub(crate) fn used_variables(op: &RelationOp) -> HashSet<VariableId> {
    let mut out = HashSet::new();
    let mut push_expr = |e: &crate::ir::expression::ScalarExpression, out: &mut HashSet<VariableId>| {
        for v in e.variable_references() {
            out.insert(v);
        }
    };
    match op {
        RelationOp::Filter { condition } => push_expr(condition, &mut out),
        RelationOp::Join { condition, .. } => push_expr(condition, &mut out),
        RelationOp::JoinFind { key, residual, .. } => {
            for k in key {
                push_expr(k, &mut out);
            }
            if let Some(r) = residual {
                push_expr(r, &mut out);
            }
        }
        RelationOp::JoinScan { residual, .. } => {
            if let Some(r) = residual {
                push_expr(r, &mut out);
            }
        }
        RelationOp::Find { key, .. } => {
            for k in key {
                push_expr(k, &mut out);
            }
        }
        RelationOp::Project { columns } | RelationOp::Scan { columns, .. } => {
            for c in columns {
                push_expr(&c.value, &mut out);
            }
        }
        RelationOp::Aggregate { columns, keys, .. } => {
            for c in columns {
                push_expr(&c.aggregation, &mut out);
            }
            for k in keys {
                out.insert(*k);
            }
        }
        RelationOp::Distinct { columns } => {
            for c in columns {
                out.insert(*c);
            }
        }
        RelationOp::Limit {
            group_keys,
            sort_keys,
            ..
        } => {
            for k in group_keys {
                out.insert(*k);
            }
            for s in sort_keys {
                out.insert(s.variable);
            }
        }
        RelationOp::Values { rows, .. } => {
            for row in rows {
                for e in row {
                    push_expr(e, &mut out);
                }
            }
        }
        RelationOp::Write {
            targets, sources, ..
        } => {
            for v in targets {
                out.insert(*v);
            }
            for e in sources {
                push_expr(e, &mut out);
            }
        }
        RelationOp::IndexScan { .. } | RelationOp::Union { .. } | RelationOp::Intersection
        | RelationOp::Difference | RelationOp::Escape => {}
    }
    out
}

/// Forward dataflow from each variable's definition: `kill(v)` is the set
/// of blocks, none of which use `v`, placed at the first block on each
/// downstream branch where `v` is no longer needed (§4.7, §8). A variable
/// never used anywhere downstream of its own definition is killed at the
/// defining block itself.
fn compute_kill(graph: &Graph, owner: &HashMap<OpId, BlockId>, blocks: &mut [Block]) {
    let entry_block = graph.entry().and_then(|e| owner.get(&e)).copied();
    let Some(entry_block) = entry_block else { return };

    let mut define_block: HashMap<VariableId, BlockId> = HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        for &var in &block.define {
            define_block.entry(var).or_insert(BlockId(i as u32));
        }
    }

    let mut all_vars: HashSet<VariableId> = HashSet::new();
    for block in blocks.iter() {
        all_vars.extend(block.define.iter().copied());
        all_vars.extend(block.r#use.iter().copied());
    }

    for var in all_vars {
        let definition = define_block.get(&var).copied().unwrap_or(entry_block);
        if !subtree_uses(blocks, definition, var) {
            blocks[definition.0 as usize].kill.insert(var);
            continue;
        }
        let downstream = blocks[definition.0 as usize].downstream.clone();
        let mut visited = HashSet::new();
        for next in downstream {
            place_kill(blocks, next, var, &mut visited);
        }
    }
}

/// True if `var` is used in `start` or in any block reachable downstream
/// of it.
fn subtree_uses(blocks: &[Block], start: BlockId, var: VariableId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        let block = &blocks[b.0 as usize];
        if block.r#use.contains(&var) {
            return true;
        }
        for &d in &block.downstream {
            stack.push(d);
        }
    }
    false
}

/// Walk downstream from `start`, killing `var` at the first block on this
/// path whose subtree no longer uses it, and not recursing past that point.
fn place_kill(blocks: &mut [Block], start: BlockId, var: VariableId, visited: &mut HashSet<BlockId>) {
    if !visited.insert(start) {
        return;
    }
    if !subtree_uses(blocks, start, var) {
        blocks[start.0 as usize].kill.insert(var);
        return;
    }
    let downstream = blocks[start.0 as usize].downstream.clone();
    for d in downstream {
        place_kill(blocks, d, var, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expression::{ExpressionKind, Literal, ScalarExpression};
    use crate::ir::relation::Column;
    use crate::resolution::NodeId as ExprNodeId;
    use std::sync::Arc;

    fn lit_expr(id: u64) -> Arc<ScalarExpression> {
        Arc::new(ScalarExpression::new(
            ExprNodeId(id),
            ExpressionKind::Literal(Literal::Boolean(true)),
        ))
    }

    #[test]
    fn linear_chain_is_a_single_block() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t"),
            columns: vec![Column::computed(VariableId(1), lit_expr(1))],
        });
        let filter = graph.insert(RelationOp::Filter {
            condition: lit_expr(2),
        });
        graph.connect(scan, filter).unwrap();

        let blocks = build_blocks(&graph);
        assert_eq!(blocks.block_count(), 1);
        assert_eq!(blocks.owner_of(scan), blocks.owner_of(filter));
    }

    #[test]
    fn branching_fan_out_creates_multiple_blocks() {
        let mut graph = Graph::new();
        let scan = graph.insert(RelationOp::Scan {
            table: Arc::from("t"),
            columns: vec![Column::computed(VariableId(1), lit_expr(1))],
        });
        let f1 = graph.insert(RelationOp::Filter {
            condition: lit_expr(2),
        });
        let f2 = graph.insert(RelationOp::Distinct { columns: vec![] });
        graph.connect(scan, f1).unwrap();
        graph.connect(scan, f2).unwrap();

        let blocks = build_blocks(&graph);
        assert!(blocks.block_count() <= graph.node_count());
        assert_eq!(blocks.owner_of(f1), blocks.owner_of(f1));
        assert_ne!(blocks.owner_of(scan), blocks.owner_of(f1));
        assert_ne!(blocks.owner_of(scan), blocks.owner_of(f2));
    }

    #[test]
    fn block_count_never_exceeds_operator_count() {
        let mut graph = Graph::new();
        let a = graph.insert(RelationOp::Scan {
            table: Arc::from("t"),
            columns: vec![],
        });
        let b = graph.insert(RelationOp::Filter {
            condition: lit_expr(1),
        });
        let c = graph.insert(RelationOp::Distinct { columns: vec![] });
        graph.connect(a, b).unwrap();
        graph.connect(b, c).unwrap();

        let blocks = build_blocks(&graph);
        assert!(blocks.block_count() <= graph.node_count());
    }
}
