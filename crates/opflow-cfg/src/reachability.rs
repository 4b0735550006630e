// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Reachability marking.
//!
//! A block is reachable when a path from the entry reaches it. A
//! conditional branch on a constant only follows the side it takes. Handler
//! regions have no incoming edges; they become reachable once any block of
//! the `try` they protect is.

use opflow_ops::Operation;

use crate::graph::{BasicBlock, ConditionKind, ControlFlowGraph, RegionKind};

pub(crate) fn mark_reachable(graph: &mut ControlFlowGraph) {
    let mut reachable = vec![false; graph.blocks.len()];
    let mut pending = vec![0];
    loop {
        while let Some(ordinal) = pending.pop() {
            if std::mem::replace(&mut reachable[ordinal], true) {
                continue;
            }
            pending.extend(taken_successors(&graph.blocks[ordinal]));
        }
        pending.extend(handler_entries(graph, &reachable).into_iter().filter(|&b| !reachable[b]));
        if pending.is_empty() {
            break;
        }
    }
    for (block, is_reachable) in graph.blocks.iter_mut().zip(reachable) {
        block.is_reachable = is_reachable;
    }
}

fn taken_successors(block: &BasicBlock) -> Vec<usize> {
    let constant = block
        .conditional_successor
        .as_ref()
        .and(block.branch_value.as_ref())
        .and_then(Operation::constant_bool);
    match (constant, block.condition_kind) {
        (Some(value), Some(kind)) => {
            let jumps = value == (kind == ConditionKind::WhenTrue);
            let taken = if jumps { &block.conditional_successor } else { &block.fall_through_successor };
            taken.iter().filter_map(|branch| branch.destination).collect()
        }
        _ => block.successors().collect(),
    }
}

/// First blocks of the handlers whose protected region has a reachable
/// block.
fn handler_entries(graph: &ControlFlowGraph, reachable: &[bool]) -> Vec<usize> {
    let mut entries = Vec::new();
    for region in graph.regions.iter().filter(|r| r.kind == RegionKind::Try) {
        if !(region.first_block..=region.last_block).any(|b| reachable.get(b).copied().unwrap_or(false)) {
            continue;
        }
        let Some(parent) = region.parent else { continue };
        for sibling in &graph.regions[parent.index()].nested {
            if *sibling != region.id {
                entries.push(graph.regions[sibling.index()].first_block);
            }
        }
    }
    entries
}
