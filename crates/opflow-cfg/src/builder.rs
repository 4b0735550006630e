// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! BlockBuilder - block and region bookkeeping during lowering.
//!
//! Blocks are created detached and appended later, so a jump target can be
//! handed out before the code that falls into it exists. Appending a block
//! links the previously appended one to it unless that block already has a
//! fall-through. There is no current block after a branch or a region
//! boundary; the next statement starts a fresh one.

use opflow_bound::{LocalSymbol, Type};
use opflow_ops::{CaptureId, Operation};

use crate::capture::FlowCaptureAllocator;
use crate::graph::{
    BasicBlock, BasicBlockKind, BranchSemantics, ConditionKind, ControlFlowBranch,
    ControlFlowGraph, Region, RegionId, RegionKind,
};
use crate::region::{RegionIx, RegionTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BlockIx(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingBranch {
    pub(crate) destination: Option<BlockIx>,
    pub(crate) semantics: BranchSemantics,
}

impl PendingBranch {
    pub(crate) fn regular(destination: BlockIx) -> Self {
        PendingBranch { destination: Some(destination), semantics: BranchSemantics::Regular }
    }
}

#[derive(Debug)]
pub(crate) struct PendingBlock {
    pub(crate) kind: BasicBlockKind,
    pub(crate) operations: Vec<Operation>,
    pub(crate) branch_value: Option<Operation>,
    pub(crate) condition: Option<ConditionKind>,
    /// Conditional successor; always a regular branch.
    pub(crate) conditional: Option<BlockIx>,
    pub(crate) fall_through: Option<PendingBranch>,
    /// Set when appended.
    pub(crate) region: Option<RegionIx>,
}

impl PendingBlock {
    fn new(kind: BasicBlockKind) -> Self {
        PendingBlock {
            kind,
            operations: Vec::new(),
            branch_value: None,
            condition: None,
            conditional: None,
            fall_through: None,
            region: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.branch_value.is_none() && self.conditional.is_none()
    }

    /// Destinations of both branches, conditional first.
    pub(crate) fn targets(&self) -> impl Iterator<Item = BlockIx> + '_ {
        self.conditional
            .into_iter()
            .chain(self.fall_through.and_then(|b| b.destination))
    }
}

pub(crate) struct BlockBuilder {
    pub(crate) blocks: Vec<PendingBlock>,
    /// Appended blocks in order; becomes the ordinal order.
    pub(crate) order: Vec<BlockIx>,
    pub(crate) regions: RegionTracker,
    captures: FlowCaptureAllocator,
    current: Option<BlockIx>,
    pub(crate) entry: BlockIx,
    pub(crate) exit: BlockIx,
}

impl BlockBuilder {
    pub(crate) fn new() -> Self {
        let mut builder = BlockBuilder {
            blocks: vec![PendingBlock::new(BasicBlockKind::Entry), PendingBlock::new(BasicBlockKind::Exit)],
            order: Vec::new(),
            regions: RegionTracker::new(),
            captures: FlowCaptureAllocator::new(),
            current: None,
            entry: BlockIx(0),
            exit: BlockIx(1),
        };
        builder.append_block(builder.entry);
        // Nothing is ever added to the entry block.
        builder.current = None;
        builder
    }

    pub(crate) fn create_block(&mut self) -> BlockIx {
        let ix = BlockIx(self.blocks.len());
        self.blocks.push(PendingBlock::new(BasicBlockKind::Block));
        ix
    }

    pub(crate) fn append_block(&mut self, block: BlockIx) {
        assert!(self.blocks[block.0].region.is_none(), "block appended twice");
        if let Some(&last) = self.order.last() {
            if self.blocks[last.0].fall_through.is_none() {
                self.blocks[last.0].fall_through = Some(PendingBranch::regular(block));
            }
        }
        let region = self.regions.current();
        self.regions.note_block(region);
        self.blocks[block.0].region = Some(region);
        self.order.push(block);
        self.current = Some(block);
    }

    pub(crate) fn is_appended(&self, block: BlockIx) -> bool {
        self.blocks[block.0].region.is_some()
    }

    /// The block statements go into, appending a fresh one if needed.
    pub(crate) fn current_block(&mut self) -> BlockIx {
        match self.current {
            Some(block) => block,
            None => {
                let block = self.create_block();
                self.append_block(block);
                block
            }
        }
    }

    pub(crate) fn add_statement(&mut self, operation: Operation) {
        let block = self.current_block();
        self.blocks[block.0].operations.push(operation);
    }

    /// Ends the current block with a test on `condition`. Control falls
    /// through to whatever block is appended next.
    pub(crate) fn conditional_branch(&mut self, condition: Operation, jump_if_true: bool, destination: BlockIx) {
        let block = self.current_block();
        let pending = &mut self.blocks[block.0];
        pending.branch_value = Some(condition);
        pending.condition = Some(if jump_if_true { ConditionKind::WhenTrue } else { ConditionKind::WhenFalse });
        pending.conditional = Some(destination);
        self.current = None;
    }

    pub(crate) fn unconditional_branch(&mut self, destination: BlockIx) {
        let block = self.current_block();
        self.blocks[block.0].fall_through = Some(PendingBranch::regular(destination));
        self.current = None;
    }

    /// Ends the current block with a non-regular exit, e.g. a `Return` to
    /// the exit block or a `Throw` carrying the exception as `value`.
    pub(crate) fn terminate(&mut self, semantics: BranchSemantics, destination: Option<BlockIx>, value: Option<Operation>) {
        let block = self.current_block();
        let pending = &mut self.blocks[block.0];
        if value.is_some() {
            assert!(pending.conditional.is_none(), "a conditional block cannot carry a result value");
            pending.branch_value = value;
        }
        pending.fall_through = Some(PendingBranch { destination, semantics });
        self.current = None;
    }

    /// Ends the last open block of a handler region with `semantics`. A
    /// block left by a conditional branch is closed in place.
    pub(crate) fn seal(&mut self, semantics: BranchSemantics) {
        let region = self.regions.current();
        let block = match (self.current, self.order.last()) {
            (None, Some(&last))
                if self.blocks[last.0].fall_through.is_none() && self.blocks[last.0].region == Some(region) =>
            {
                last
            }
            _ => self.current_block(),
        };
        self.blocks[block.0].fall_through = Some(PendingBranch { destination: None, semantics });
        self.current = None;
    }

    /// Whether control runs off the end of the last appended block.
    pub(crate) fn falls_through(&self) -> bool {
        self.order.last().is_some_and(|last| self.blocks[last.0].fall_through.is_none())
    }

    // ── Regions ─────────────────────────────────────────────────────

    pub(crate) fn enter_region(&mut self, kind: RegionKind, locals: Vec<LocalSymbol>, exception_type: Option<Type>) -> RegionIx {
        self.current = None;
        self.regions.enter(kind, locals, exception_type)
    }

    pub(crate) fn leave_region(&mut self, region: RegionIx) {
        if !self.regions.get(region).has_blocks {
            let block = self.create_block();
            self.append_block(block);
        }
        self.regions.leave(region);
        self.current = None;
    }

    pub(crate) fn current_region(&self) -> RegionIx {
        self.regions.current()
    }

    pub(crate) fn allocate_capture(&mut self, region: RegionIx) -> CaptureId {
        let id = self.captures.allocate();
        self.regions.add_capture(region, id);
        id
    }

    pub(crate) fn capture_count(&self) -> u32 {
        self.captures.count()
    }

    /// Appends the exit block; nothing may be added afterwards.
    pub(crate) fn close(&mut self) {
        assert_eq!(self.regions.depth(), 1, "regions left open at the end of the body");
        self.append_block(self.exit);
        self.current = None;
    }

    // ── Finishing ───────────────────────────────────────────────────

    /// Numbers the appended blocks and surviving regions and derives edges
    /// and predecessor lists. Reachability is left unset.
    pub(crate) fn finish(self) -> ControlFlowGraph {
        let mut ordinals = vec![None; self.blocks.len()];
        for (ordinal, block) in self.order.iter().enumerate() {
            ordinals[block.0] = Some(ordinal);
        }
        let ordinal_of = |block: BlockIx| ordinals[block.0].unwrap_or_else(|| panic!("branch to a block that was never appended"));

        let mut region_ids = vec![None; self.regions.len()];
        let mut next_id = 0u32;
        for (ix, region) in self.regions.iter() {
            if !region.dissolved {
                region_ids[ix.0] = Some(RegionId(next_id));
                next_id += 1;
            }
        }
        let region_id = |ix: RegionIx| region_ids[ix.0].unwrap_or_else(|| panic!("block left in a dissolved region"));

        let branch = |source: usize, from: RegionIx, target: Option<BlockIx>, semantics, is_conditional| {
            let mut edge = ControlFlowBranch {
                source,
                destination: None,
                semantics,
                is_conditional,
                entering_regions: Vec::new(),
                leaving_regions: Vec::new(),
                finally_regions: Vec::new(),
            };
            if let Some(target) = target {
                edge.destination = Some(ordinal_of(target));
                let to = self.blocks[target.0].region.unwrap_or(self.regions.root());
                let (leaving, entering) = self.regions.transition(from, to);
                edge.finally_regions = leaving
                    .iter()
                    .filter_map(|r| self.regions.finally_for(*r))
                    .map(region_id)
                    .collect();
                edge.leaving_regions = leaving.into_iter().map(region_id).collect();
                edge.entering_regions = entering.into_iter().map(region_id).collect();
            }
            edge
        };

        let mut blocks: Vec<BasicBlock> = Vec::with_capacity(self.order.len());
        for (ordinal, ix) in self.order.iter().enumerate() {
            let pending = &self.blocks[ix.0];
            let region = pending.region.unwrap_or(self.regions.root());
            let conditional_successor = pending
                .conditional
                .map(|target| branch(ordinal, region, Some(target), BranchSemantics::Regular, true));
            let fall_through_successor = pending
                .fall_through
                .map(|ft| branch(ordinal, region, ft.destination, ft.semantics, false));
            blocks.push(BasicBlock {
                ordinal,
                kind: pending.kind,
                operations: pending.operations.clone(),
                branch_value: pending.branch_value.clone(),
                condition_kind: pending.condition,
                conditional_successor,
                fall_through_successor,
                predecessors: Vec::new(),
                is_reachable: false,
                region: region_id(region),
            });
        }

        let mut predecessors = vec![Vec::new(); blocks.len()];
        for block in &blocks {
            for target in block.successors() {
                predecessors[target].push(block.ordinal);
            }
        }
        for (block, mut preds) in blocks.iter_mut().zip(predecessors) {
            preds.sort_unstable();
            block.predecessors = preds;
        }

        let mut regions: Vec<Region> = Vec::with_capacity(next_id as usize);
        for (ix, pending) in self.regions.iter() {
            let Some(id) = region_ids[ix.0] else { continue };
            regions.push(Region {
                id,
                kind: pending.kind,
                parent: pending.parent.map(region_id),
                nested: Vec::new(),
                first_block: usize::MAX,
                last_block: 0,
                locals: pending.locals.clone(),
                captures: pending.captures.clone(),
                exception_type: pending.exception_type.clone(),
            });
        }
        for index in 1..regions.len() {
            if let Some(parent) = regions[index].parent {
                let id = regions[index].id;
                regions[parent.index()].nested.push(id);
            }
        }
        for block in &blocks {
            let mut current = Some(block.region);
            while let Some(id) = current {
                let region = &mut regions[id.index()];
                region.first_block = region.first_block.min(block.ordinal);
                region.last_block = region.last_block.max(block.ordinal);
                current = region.parent;
            }
        }

        ControlFlowGraph { blocks, regions }
    }
}
