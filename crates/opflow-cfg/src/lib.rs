// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Control-flow graphs over operation trees.
//!
//! A method body, field initializer or similar root is lowered into basic
//! blocks whose statements are operation trees with no nested control
//! flow. Short-circuiting operators, conditionals, null checks, pattern
//! tests and switches become explicit branches; intermediate values that
//! must survive a branch are stored in flow captures owned by `Locals`
//! regions. Exception handling shows up as nested regions.

mod builder;
pub mod capture;
pub mod config;
mod display;
pub mod graph;
mod lower;
mod pack;
mod reachability;
mod region;
mod verify;

pub use capture::FlowCaptureAllocator;
pub use config::BuildOptions;
pub use graph::{
    BasicBlock, BasicBlockKind, BranchSemantics, ConditionKind, ControlFlowBranch, ControlFlowGraph, Region,
    RegionId, RegionKind,
};
pub use lower::ControlFlowGraphBuilder;
pub use verify::VerifyError;

use opflow_bound::{BoundBody, TypeTable};

/// Builds the graph for `body` with default options.
pub fn build_graph(body: &BoundBody, types: &TypeTable) -> ControlFlowGraph {
    build_graph_with(body, types, &BuildOptions::default())
}

pub fn build_graph_with(body: &BoundBody, types: &TypeTable, options: &BuildOptions) -> ControlFlowGraph {
    ControlFlowGraphBuilder::new(types, options.clone()).build(body)
}
