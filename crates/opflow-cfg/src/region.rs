// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! RegionTracker - the stack of open regions during lowering.
//!
//! Regions live in an arena indexed by `RegionIx` in creation order. Since a
//! region is always created while its parent is the innermost open one,
//! creation order is also preorder, which is how final ids are assigned.

use opflow_bound::{LocalSymbol, Type};
use opflow_ops::CaptureId;

use crate::graph::RegionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RegionIx(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct PendingRegion {
    pub(crate) kind: RegionKind,
    pub(crate) parent: Option<RegionIx>,
    pub(crate) locals: Vec<LocalSymbol>,
    pub(crate) captures: Vec<CaptureId>,
    pub(crate) exception_type: Option<Type>,
    /// Set once a block has been appended to this region or a nested one.
    pub(crate) has_blocks: bool,
    /// Merged into its parent by packing.
    pub(crate) dissolved: bool,
}

#[derive(Debug)]
pub(crate) struct RegionTracker {
    regions: Vec<PendingRegion>,
    open: Vec<RegionIx>,
}

impl RegionTracker {
    /// A tracker with the root region already open.
    pub(crate) fn new() -> Self {
        let root = PendingRegion {
            kind: RegionKind::Root,
            parent: None,
            locals: Vec::new(),
            captures: Vec::new(),
            exception_type: None,
            has_blocks: false,
            dissolved: false,
        };
        RegionTracker { regions: vec![root], open: vec![RegionIx(0)] }
    }

    pub(crate) fn root(&self) -> RegionIx {
        RegionIx(0)
    }

    pub(crate) fn current(&self) -> RegionIx {
        *self.open.last().unwrap_or(&RegionIx(0))
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn enter(&mut self, kind: RegionKind, locals: Vec<LocalSymbol>, exception_type: Option<Type>) -> RegionIx {
        let ix = RegionIx(self.regions.len());
        self.regions.push(PendingRegion {
            kind,
            parent: Some(self.current()),
            locals,
            captures: Vec::new(),
            exception_type,
            has_blocks: false,
            dissolved: false,
        });
        self.open.push(ix);
        ix
    }

    /// Pops `region`, which must be the innermost open region.
    pub(crate) fn leave(&mut self, region: RegionIx) {
        let top = self.open.pop();
        assert_eq!(top, Some(region), "regions must be left innermost first");
        assert!(!self.open.is_empty(), "the root region is never left");
    }

    /// Marks `region` and its ancestors as holding a block.
    pub(crate) fn note_block(&mut self, region: RegionIx) {
        let mut current = Some(region);
        while let Some(ix) = current {
            let pending = &mut self.regions[ix.0];
            if pending.has_blocks {
                break;
            }
            pending.has_blocks = true;
            current = pending.parent;
        }
    }

    pub(crate) fn add_capture(&mut self, region: RegionIx, id: CaptureId) {
        self.regions[region.0].captures.push(id);
    }

    pub(crate) fn add_local(&mut self, region: RegionIx, local: LocalSymbol) {
        self.regions[region.0].locals.push(local);
    }

    /// Whether `local` is declared by any open region.
    pub(crate) fn declares(&self, local: &LocalSymbol) -> bool {
        self.open
            .iter()
            .any(|ix| self.regions[ix.0].locals.iter().any(|l| l.id == local.id))
    }

    pub(crate) fn get(&self, region: RegionIx) -> &PendingRegion {
        &self.regions[region.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (RegionIx, &PendingRegion)> + '_ {
        self.regions.iter().enumerate().map(|(i, r)| (RegionIx(i), r))
    }

    /// `region` followed by its ancestors, innermost first.
    pub(crate) fn chain(&self, region: RegionIx) -> Vec<RegionIx> {
        let mut chain = vec![region];
        let mut current = self.regions[region.0].parent;
        while let Some(ix) = current {
            chain.push(ix);
            current = self.regions[ix.0].parent;
        }
        chain
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub(crate) fn is_within(&self, inner: RegionIx, outer: RegionIx) -> bool {
        self.chain(inner).contains(&outer)
    }

    /// The `Finally` sibling run when leaving the `Try` region `region`.
    pub(crate) fn finally_for(&self, region: RegionIx) -> Option<RegionIx> {
        let pending = &self.regions[region.0];
        if pending.kind != RegionKind::Try {
            return None;
        }
        let parent = pending.parent?;
        if self.regions[parent.0].kind != RegionKind::TryAndFinally {
            return None;
        }
        self.iter()
            .find(|(_, r)| r.parent == Some(parent) && r.kind == RegionKind::Finally && !r.dissolved)
            .map(|(ix, _)| ix)
    }

    /// Regions left and entered when control moves from `from` to `to`:
    /// `(leaving innermost first, entering outermost first)`.
    pub(crate) fn transition(&self, from: RegionIx, to: RegionIx) -> (Vec<RegionIx>, Vec<RegionIx>) {
        let source = self.chain(from);
        let target = self.chain(to);
        let leaving = source.iter().take_while(|r| !target.contains(r)).copied().collect();
        let mut entering: Vec<RegionIx> = target.iter().take_while(|r| !source.contains(r)).copied().collect();
        entering.reverse();
        (leaving, entering)
    }

    /// Folds `region` into its parent: its blocks, nested regions, locals
    /// and captures all move up one level.
    pub(crate) fn dissolve(&mut self, region: RegionIx) -> Option<RegionIx> {
        let parent = self.regions[region.0].parent?;
        let locals = std::mem::take(&mut self.regions[region.0].locals);
        let captures = std::mem::take(&mut self.regions[region.0].captures);
        self.regions[parent.0].locals.extend(locals);
        self.regions[parent.0].captures.extend(captures);
        for other in &mut self.regions {
            if other.parent == Some(region) {
                other.parent = Some(parent);
            }
        }
        self.regions[region.0].dissolved = true;
        Some(parent)
    }
}
