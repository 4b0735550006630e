// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Graph packing - drop what lowering produced only for bookkeeping.
//!
//! Three rewrites run before ordinals are assigned:
//!
//! 1. Locals regions with neither locals nor captures are dissolved into
//!    their parent.
//! 2. Empty blocks that only fall through somewhere else are removed and
//!    their incoming branches retargeted.
//! 3. A block whose single successor has no other predecessor absorbs that
//!    successor when both share a region.
//!
//! Entering and leaving sets are derived from region membership when the
//! graph is finished, so retargeting never has to patch them.

use tracing::trace;

use crate::builder::{BlockBuilder, BlockIx, PendingBranch};
use crate::graph::{BasicBlockKind, BranchSemantics, RegionKind};
use crate::region::RegionIx;

pub(crate) fn pack(builder: &mut BlockBuilder) {
    dissolve_unused_regions(builder);
    loop {
        let removed = remove_forwarders(builder);
        let merged = merge_straight_lines(builder);
        if !removed && !merged {
            break;
        }
    }
}

fn dissolve_unused_regions(builder: &mut BlockBuilder) {
    let candidates: Vec<RegionIx> = builder
        .regions
        .iter()
        .filter(|(_, r)| r.kind == RegionKind::Locals && r.locals.is_empty() && r.captures.is_empty())
        .map(|(ix, _)| ix)
        .collect();
    for region in candidates {
        let Some(parent) = builder.regions.dissolve(region) else { continue };
        trace!(region = region.0, parent = parent.0, "dissolving empty locals region");
        for block in &mut builder.blocks {
            if block.region == Some(region) {
                block.region = Some(parent);
            }
        }
    }
}

/// Blocks in `region` or nested inside it.
fn blocks_within(builder: &BlockBuilder, region: RegionIx) -> usize {
    builder
        .order
        .iter()
        .filter(|b| builder.blocks[b.0].region.is_some_and(|r| builder.regions.is_within(r, region)))
        .count()
}

/// Whether `block` is where exception dispatch enters a handler region.
fn starts_handler(builder: &BlockBuilder, block: BlockIx) -> bool {
    let Some(region) = builder.blocks[block.0].region else { return false };
    builder.regions.chain(region).into_iter().any(|r| {
        builder.regions.get(r).kind.is_handler()
            && builder
                .order
                .iter()
                .find(|b| builder.blocks[b.0].region.is_some_and(|br| builder.regions.is_within(br, r)))
                == Some(&block)
    })
}

fn incoming(builder: &BlockBuilder, block: BlockIx) -> usize {
    builder
        .order
        .iter()
        .map(|b| builder.blocks[b.0].targets().filter(|t| *t == block).count())
        .sum()
}

fn remove_forwarders(builder: &mut BlockBuilder) -> bool {
    let mut changed = false;
    let mut index = 0;
    while index < builder.order.len() {
        let block = builder.order[index];
        let pending = &builder.blocks[block.0];
        let forward = match pending.fall_through {
            Some(PendingBranch { destination: Some(target), semantics: BranchSemantics::Regular })
                if pending.kind == BasicBlockKind::Block && pending.is_empty() && target != block =>
            {
                target
            }
            _ => {
                index += 1;
                continue;
            }
        };
        let region = pending.region.unwrap_or(builder.regions.root());
        if blocks_within(builder, region) == 1 || starts_handler(builder, block) {
            index += 1;
            continue;
        }

        trace!(block = block.0, target = forward.0, "removing empty forwarding block");
        for other in &mut builder.blocks {
            if other.conditional == Some(block) {
                other.conditional = Some(forward);
            }
            if let Some(branch) = &mut other.fall_through {
                if branch.destination == Some(block) {
                    branch.destination = Some(forward);
                }
            }
        }
        builder.order.remove(index);
        changed = true;
    }
    changed
}

fn merge_straight_lines(builder: &mut BlockBuilder) -> bool {
    let mut changed = false;
    let mut index = 0;
    while index < builder.order.len() {
        let block = builder.order[index];
        let pending = &builder.blocks[block.0];
        let next = match pending.fall_through {
            Some(PendingBranch { destination: Some(next), semantics: BranchSemantics::Regular })
                if pending.kind == BasicBlockKind::Block
                    && pending.conditional.is_none()
                    && pending.branch_value.is_none()
                    && next != block =>
            {
                next
            }
            _ => {
                index += 1;
                continue;
            }
        };
        let successor = &builder.blocks[next.0];
        if successor.kind != BasicBlockKind::Block
            || successor.region != pending.region
            || incoming(builder, next) != 1
            || starts_handler(builder, next)
        {
            index += 1;
            continue;
        }

        trace!(block = block.0, absorbed = next.0, "merging straight-line blocks");
        let absorbed = std::mem::take(&mut builder.blocks[next.0].operations);
        let branch_value = builder.blocks[next.0].branch_value.take();
        let condition = builder.blocks[next.0].condition.take();
        let conditional = builder.blocks[next.0].conditional.take();
        let fall_through = builder.blocks[next.0].fall_through.take();
        let target = &mut builder.blocks[block.0];
        target.operations.extend(absorbed);
        target.branch_value = branch_value;
        target.condition = condition;
        target.conditional = conditional;
        target.fall_through = fall_through;
        builder.order.retain(|b| *b != next);
        changed = true;
        // Stay on `block`; it may absorb its new successor too.
    }
    changed
}
