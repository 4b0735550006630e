// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Control-flow graph types.
//!
//! A graph is immutable once built. Blocks are addressed by ordinal: the
//! entry block is always 0 and the exit block is always the last one.

use opflow_bound::{LocalSymbol, Type};
use opflow_ops::{CaptureId, Operation};

/// Region id. The root region is always `RegionId(0)`; the rest are
/// numbered in preorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionId(pub u32);

impl RegionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BasicBlockKind {
    Entry,
    Block,
    Exit,
}

/// What happens when control leaves a block through a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchSemantics {
    Regular,
    /// To the exit block, carrying the returned value as the branch value.
    Return,
    /// No destination; the branch value is the thrown exception.
    Throw,
    Rethrow,
    /// End of a `finally` or filter region; resumes exception dispatch.
    StructuredExceptionHandling,
    /// Left by erroneous code.
    Error,
}

/// When a conditional branch is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionKind {
    WhenTrue,
    WhenFalse,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlFlowBranch {
    pub source: usize,
    pub destination: Option<usize>,
    pub semantics: BranchSemantics,
    pub is_conditional: bool,
    /// Outermost first.
    pub entering_regions: Vec<RegionId>,
    /// Innermost first.
    pub leaving_regions: Vec<RegionId>,
    /// `finally` regions run on the way out, innermost first.
    pub finally_regions: Vec<RegionId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    pub ordinal: usize,
    pub kind: BasicBlockKind,
    pub operations: Vec<Operation>,
    /// Condition of the conditional branch, or the value carried by a
    /// `Return`/`Throw` fall-through.
    pub branch_value: Option<Operation>,
    pub condition_kind: Option<ConditionKind>,
    pub conditional_successor: Option<ControlFlowBranch>,
    /// Absent only on the exit block.
    pub fall_through_successor: Option<ControlFlowBranch>,
    /// Sources of incoming branches, sorted. A block reached by both
    /// branches of one predecessor lists it twice.
    pub predecessors: Vec<usize>,
    pub is_reachable: bool,
    pub region: RegionId,
}

impl BasicBlock {
    /// Successor ordinals, conditional first.
    pub fn successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.conditional_successor
            .iter()
            .chain(self.fall_through_successor.iter())
            .filter_map(|branch| branch.destination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionKind {
    Root,
    Locals,
    Try,
    Catch,
    Filter,
    FilterAndHandler,
    TryAndCatch,
    TryAndFinally,
    Finally,
    StaticLocalInitializer,
}

impl RegionKind {
    /// Regions entered by exception dispatch rather than by a branch.
    pub fn is_handler(self) -> bool {
        matches!(self, RegionKind::Catch | RegionKind::Filter | RegionKind::Finally)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub id: RegionId,
    pub kind: RegionKind,
    pub parent: Option<RegionId>,
    pub nested: Vec<RegionId>,
    pub first_block: usize,
    pub last_block: usize,
    pub locals: Vec<LocalSymbol>,
    /// Captures whose lifetime this region bounds.
    pub captures: Vec<CaptureId>,
    /// Caught type for `Catch`, `Filter` and `FilterAndHandler` regions.
    pub exception_type: Option<Type>,
}

impl Region {
    pub fn contains_block(&self, ordinal: usize) -> bool {
        self.first_block <= ordinal && ordinal <= self.last_block
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    /// Indexed by `RegionId`.
    pub regions: Vec<Region>,
}

impl ControlFlowGraph {
    pub fn entry(&self) -> &BasicBlock {
        &self.blocks[0]
    }

    pub fn exit(&self) -> &BasicBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn root(&self) -> &Region {
        &self.regions[0]
    }

    pub fn block(&self, ordinal: usize) -> Option<&BasicBlock> {
        self.blocks.get(ordinal)
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    /// The innermost region owning `capture`.
    pub fn capture_region(&self, capture: CaptureId) -> Option<&Region> {
        self.regions.iter().find(|region| region.captures.contains(&capture))
    }

    /// Regions enclosing `ordinal`, innermost first.
    pub fn enclosing_regions(&self, ordinal: usize) -> Vec<RegionId> {
        let mut chain = Vec::new();
        let mut current = self.blocks.get(ordinal).map(|b| b.region);
        while let Some(id) = current {
            chain.push(id);
            current = self.regions[id.index()].parent;
        }
        chain
    }

    /// Every operation stored in the graph, branch values included.
    pub fn operations(&self) -> impl Iterator<Item = (usize, &Operation)> + '_ {
        self.blocks.iter().flat_map(|block| {
            block
                .operations
                .iter()
                .chain(block.branch_value.iter())
                .map(move |op| (block.ordinal, op))
        })
    }
}
