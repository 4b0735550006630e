// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Structural checks over a finished graph.

use opflow_ops::{CaptureId, OperationKind};
use thiserror::Error;

use crate::graph::{BasicBlockKind, ControlFlowGraph, RegionId, RegionKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("block {0} should be the entry block")]
    MisplacedEntry(usize),
    #[error("block {0} should be the exit block")]
    MisplacedExit(usize),
    #[error("entry block has predecessors")]
    EntryHasPredecessors,
    #[error("exit block has a successor")]
    ExitHasSuccessor,
    #[error("block B{0} has no fall-through branch")]
    MissingFallThrough(usize),
    #[error("block B{block} branches to missing block {destination}")]
    DanglingBranch { block: usize, destination: usize },
    #[error("conditional branch of block B{0} has no condition")]
    ConditionWithoutValue(usize),
    #[error("predecessors of block B{0} are not sorted")]
    UnsortedPredecessors(usize),
    #[error("predecessors of block B{0} do not match incoming branches")]
    PredecessorMismatch(usize),
    #[error("reachable block B{0} has no predecessors")]
    OrphanBlock(usize),
    #[error("capture [{capture}] is used in block B{block} outside its region")]
    CaptureOutsideRegion { block: usize, capture: CaptureId },
    #[error("capture [{0}] is not owned by any region")]
    UnownedCapture(CaptureId),
    #[error("region R{0} does not cover a contiguous block range")]
    RegionExtent(u32),
}

impl ControlFlowGraph {
    /// Checks the structural invariants every built graph satisfies.
    pub fn verify(&self) -> Result<(), VerifyError> {
        self.verify_blocks()?;
        self.verify_predecessors()?;
        self.verify_regions()?;
        self.verify_captures()
    }

    fn verify_blocks(&self) -> Result<(), VerifyError> {
        let last = self.blocks.len().saturating_sub(1);
        for block in &self.blocks {
            let ordinal = block.ordinal;
            match block.kind {
                BasicBlockKind::Entry if ordinal != 0 => return Err(VerifyError::MisplacedEntry(ordinal)),
                BasicBlockKind::Exit if ordinal != last => return Err(VerifyError::MisplacedExit(ordinal)),
                _ if ordinal == 0 && block.kind != BasicBlockKind::Entry => {
                    return Err(VerifyError::MisplacedEntry(ordinal))
                }
                _ if ordinal == last && block.kind != BasicBlockKind::Exit => {
                    return Err(VerifyError::MisplacedExit(ordinal))
                }
                _ => {}
            }

            if block.kind == BasicBlockKind::Exit {
                if block.fall_through_successor.is_some() || block.conditional_successor.is_some() {
                    return Err(VerifyError::ExitHasSuccessor);
                }
                continue;
            }
            if block.fall_through_successor.is_none() {
                return Err(VerifyError::MissingFallThrough(ordinal));
            }
            if block.conditional_successor.is_some()
                && (block.branch_value.is_none() || block.condition_kind.is_none())
            {
                return Err(VerifyError::ConditionWithoutValue(ordinal));
            }
            for destination in block.successors() {
                if destination >= self.blocks.len() {
                    return Err(VerifyError::DanglingBranch { block: ordinal, destination });
                }
            }
        }
        Ok(())
    }

    fn verify_predecessors(&self) -> Result<(), VerifyError> {
        let mut incoming = vec![Vec::new(); self.blocks.len()];
        for block in &self.blocks {
            for destination in block.successors() {
                incoming[destination].push(block.ordinal);
            }
        }
        for (block, mut expected) in self.blocks.iter().zip(incoming) {
            if block.predecessors.windows(2).any(|w| w[0] > w[1]) {
                return Err(VerifyError::UnsortedPredecessors(block.ordinal));
            }
            expected.sort_unstable();
            if block.predecessors != expected {
                return Err(VerifyError::PredecessorMismatch(block.ordinal));
            }
        }

        if !self.entry().predecessors.is_empty() {
            return Err(VerifyError::EntryHasPredecessors);
        }
        for block in &self.blocks[1..] {
            if block.is_reachable && block.predecessors.is_empty() && !self.starts_handler(block.ordinal) {
                return Err(VerifyError::OrphanBlock(block.ordinal));
            }
        }
        Ok(())
    }

    /// Whether exception dispatch enters a region at `ordinal`.
    fn starts_handler(&self, ordinal: usize) -> bool {
        self.regions.iter().any(|region| {
            region.first_block == ordinal
                && matches!(
                    region.kind,
                    RegionKind::Catch | RegionKind::Filter | RegionKind::FilterAndHandler | RegionKind::Finally
                )
        })
    }

    fn verify_regions(&self) -> Result<(), VerifyError> {
        for region in &self.regions {
            if region.first_block > region.last_block || region.last_block >= self.blocks.len() {
                return Err(VerifyError::RegionExtent(region.id.0));
            }
            let inside = |ordinal: usize| self.enclosing_regions(ordinal).contains(&region.id);
            if !(region.first_block..=region.last_block).all(inside) {
                return Err(VerifyError::RegionExtent(region.id.0));
            }
            if let Some(parent) = region.parent.and_then(|p| self.region(p)) {
                if !parent.contains_block(region.first_block) || !parent.contains_block(region.last_block) {
                    return Err(VerifyError::RegionExtent(region.id.0));
                }
            }
        }
        Ok(())
    }

    fn verify_captures(&self) -> Result<(), VerifyError> {
        for (ordinal, operation) in self.operations() {
            for node in operation.descendants() {
                let capture = match node.kind {
                    OperationKind::FlowCapture { id } | OperationKind::FlowCaptureReference { id } => id,
                    _ => continue,
                };
                let Some(owner) = self.capture_region(capture) else {
                    return Err(VerifyError::UnownedCapture(capture));
                };
                if !self.region_contains(owner.id, ordinal) {
                    return Err(VerifyError::CaptureOutsideRegion { block: ordinal, capture });
                }
            }
        }
        Ok(())
    }

    fn region_contains(&self, region: RegionId, ordinal: usize) -> bool {
        self.enclosing_regions(ordinal).contains(&region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BlockBuilder;
    use crate::reachability::mark_reachable;
    use opflow_bound::{ConstValue, Syntax, Type};
    use opflow_ops::Operation;

    fn int(value: i32) -> Operation {
        Operation::literal(ConstValue::Int32(value), Some(Type::Int32), Syntax::text(value.to_string()))
    }

    fn small_graph() -> ControlFlowGraph {
        let mut builder = BlockBuilder::new();
        let region = builder.enter_region(RegionKind::Locals, Vec::new(), None);
        let id = builder.allocate_capture(region);
        builder.add_statement(Operation::flow_capture(id, int(1)));
        builder.add_statement(Operation::flow_capture_reference(id, Some(Type::Int32), Syntax::text("1")));
        builder.leave_region(region);
        builder.close();
        let mut graph = builder.finish();
        mark_reachable(&mut graph);
        graph
    }

    #[test]
    fn built_graph_verifies() {
        assert_eq!(small_graph().verify(), Ok(()));
    }

    #[test]
    fn tampered_predecessors_are_reported() {
        let mut graph = small_graph();
        graph.blocks[1].predecessors.clear();
        assert_eq!(graph.verify(), Err(VerifyError::PredecessorMismatch(1)));
    }

    #[test]
    fn capture_outside_its_region_is_reported() {
        let mut graph = small_graph();
        let reference = graph.blocks[1].operations.remove(1);
        graph.blocks[2].operations.push(reference);
        assert_eq!(
            graph.verify(),
            Err(VerifyError::CaptureOutsideRegion { block: 2, capture: CaptureId(0) })
        );
    }

    #[test]
    fn missing_fall_through_is_reported() {
        let mut graph = small_graph();
        graph.blocks[1].fall_through_successor = None;
        assert_eq!(graph.verify(), Err(VerifyError::MissingFallThrough(1)));
    }
}
