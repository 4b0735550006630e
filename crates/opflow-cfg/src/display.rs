// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Text rendering of control-flow graphs.
//!
//! Blocks are listed in ordinal order. A region wraps its blocks in braces
//! with its locals and captures on top:
//!
//! ```text
//! Block[B0] - Entry
//!     Statements (0)
//!     Next (Regular) Block[B1]
//!         Entering: {R1}
//!
//! .locals {R1}
//! {
//!     CaptureIds: [0]
//!     Block[B1] - Block
//!         Predecessors: [B0]
//!         Statements (1)
//!             FlowCapture ...
//!
//!         Next (Regular) Block[B2]
//!             Leaving: {R1}
//! }
//!
//! Block[B2] - Exit
//!     Predecessors: [B1]
//!     Statements (0)
//! ```

use std::fmt::{self, Write};

use opflow_ops::render_indented;

use crate::graph::{
    BasicBlock, BasicBlockKind, BranchSemantics, ConditionKind, ControlFlowBranch, ControlFlowGraph, Region,
    RegionId, RegionKind,
};

enum Item {
    Block(usize),
    Region(RegionId),
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_region_body(f, self.root(), 0)
    }
}

impl ControlFlowGraph {
    /// Blocks directly in `region` and its nested regions, by first ordinal.
    fn items(&self, region: &Region) -> Vec<Item> {
        let mut items: Vec<(usize, Item)> = self
            .blocks
            .iter()
            .filter(|block| block.region == region.id)
            .map(|block| (block.ordinal, Item::Block(block.ordinal)))
            .collect();
        items.extend(region.nested.iter().map(|id| (self.regions[id.index()].first_block, Item::Region(*id))));
        items.sort_by_key(|(ordinal, _)| *ordinal);
        items.into_iter().map(|(_, item)| item).collect()
    }

    fn write_region_body(&self, f: &mut impl Write, region: &Region, indent: usize) -> fmt::Result {
        let items = self.items(region);
        for (index, item) in items.iter().enumerate() {
            if index > 0 && (matches!(item, Item::Region(_)) || matches!(items[index - 1], Item::Region(_))) {
                writeln!(f)?;
            }
            match item {
                Item::Block(ordinal) => self.write_block(f, &self.blocks[*ordinal], indent)?,
                Item::Region(id) => self.write_region(f, &self.regions[id.index()], indent)?,
            }
        }
        Ok(())
    }

    fn write_region(&self, f: &mut impl Write, region: &Region, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        writeln!(f, "{}{}", pad, self.region_header(region))?;
        writeln!(f, "{}{{", pad)?;
        let inner = " ".repeat(indent + 4);
        if !region.locals.is_empty() {
            let locals: Vec<String> = region.locals.iter().map(|l| format!("[{}]", l)).collect();
            writeln!(f, "{}Locals: {}", inner, locals.join(" "))?;
        }
        if !region.captures.is_empty() {
            let captures: Vec<String> = region.captures.iter().map(|c| format!("[{}]", c)).collect();
            writeln!(f, "{}CaptureIds: {}", inner, captures.join(" "))?;
        }
        self.write_region_body(f, region, indent + 4)?;
        writeln!(f, "{}}}", pad)
    }

    fn region_header(&self, region: &Region) -> String {
        let id = region.id.0;
        let caught = || region.exception_type.as_ref().map(|ty| format!(" ({})", ty)).unwrap_or_default();
        match region.kind {
            RegionKind::Root => format!(".root {{R{}}}", id),
            RegionKind::Locals => format!(".locals {{R{}}}", id),
            RegionKind::Try => format!(".try {{R{}}}", id),
            RegionKind::TryAndCatch => format!(".try-catch {{R{}}}", id),
            RegionKind::TryAndFinally => format!(".try-finally {{R{}}}", id),
            RegionKind::Catch => {
                let in_filter = region
                    .parent
                    .and_then(|p| self.region(p))
                    .is_some_and(|p| p.kind == RegionKind::FilterAndHandler);
                if in_filter {
                    format!(".handler {{R{}}}", id)
                } else {
                    format!(".catch {{R{}}}{}", id, caught())
                }
            }
            RegionKind::Filter => format!(".filter {{R{}}}", id),
            RegionKind::FilterAndHandler => format!(".filter-and-handler {{R{}}}{}", id, caught()),
            RegionKind::Finally => format!(".finally {{R{}}}", id),
            RegionKind::StaticLocalInitializer => format!(".static initializer {{R{}}}", id),
        }
    }

    fn write_block(&self, f: &mut impl Write, block: &BasicBlock, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        let inner = " ".repeat(indent + 4);
        let kind = match block.kind {
            BasicBlockKind::Entry => "Entry",
            BasicBlockKind::Block => "Block",
            BasicBlockKind::Exit => "Exit",
        };
        write!(f, "{}Block[B{}] - {}", pad, block.ordinal, kind)?;
        if !block.is_reachable {
            write!(f, " [UnReachable]")?;
        }
        writeln!(f)?;

        if block.kind != BasicBlockKind::Entry {
            if block.predecessors.is_empty() {
                writeln!(f, "{}Predecessors (0)", inner)?;
            } else {
                writeln!(f, "{}Predecessors: {}", inner, format_predecessors(&block.predecessors))?;
            }
        }
        writeln!(f, "{}Statements ({})", inner, block.operations.len())?;
        for operation in &block.operations {
            f.write_str(&render_indented(operation, indent + 8))?;
        }
        let has_branch = block.conditional_successor.is_some() || block.fall_through_successor.is_some();
        if !block.operations.is_empty() && has_branch {
            writeln!(f)?;
        }

        if let Some(branch) = &block.conditional_successor {
            let sense = match block.condition_kind {
                Some(ConditionKind::WhenTrue) => "True",
                _ => "False",
            };
            writeln!(
                f,
                "{}Jump if {} ({}) to {}",
                inner,
                sense,
                semantics_name(branch.semantics),
                destination(branch)
            )?;
            if let Some(value) = &block.branch_value {
                f.write_str(&render_indented(value, indent + 8))?;
            }
            write_region_sets(f, branch, indent + 8)?;
            writeln!(f)?;
        }

        if let Some(branch) = &block.fall_through_successor {
            writeln!(f, "{}Next ({}) {}", inner, semantics_name(branch.semantics), destination(branch))?;
            if block.conditional_successor.is_none() {
                if let Some(value) = &block.branch_value {
                    f.write_str(&render_indented(value, indent + 8))?;
                }
            }
            write_region_sets(f, branch, indent + 8)?;
        }
        Ok(())
    }
}

fn write_region_sets(f: &mut impl Write, branch: &ControlFlowBranch, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    for (label, regions) in [
        ("Finalizing", &branch.finally_regions),
        ("Leaving", &branch.leaving_regions),
        ("Entering", &branch.entering_regions),
    ] {
        if !regions.is_empty() {
            let ids: Vec<String> = regions.iter().map(|r| format!("{{R{}}}", r.0)).collect();
            writeln!(f, "{}{}: {}", pad, label, ids.join(" "))?;
        }
    }
    Ok(())
}

fn destination(branch: &ControlFlowBranch) -> String {
    match branch.destination {
        Some(ordinal) => format!("Block[B{}]", ordinal),
        None => "Block[null]".to_string(),
    }
}

fn semantics_name(semantics: BranchSemantics) -> &'static str {
    match semantics {
        BranchSemantics::Regular => "Regular",
        BranchSemantics::Return => "Return",
        BranchSemantics::Throw => "Throw",
        BranchSemantics::Rethrow => "Rethrow",
        BranchSemantics::StructuredExceptionHandling => "StructuredExceptionHandling",
        BranchSemantics::Error => "Error",
    }
}

/// `[B0] [B2*2]`: a predecessor reaching the block along both branches is
/// listed once with a count.
fn format_predecessors(predecessors: &[usize]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut index = 0;
    while index < predecessors.len() {
        let ordinal = predecessors[index];
        let count = predecessors[index..].iter().take_while(|&&p| p == ordinal).count();
        if count > 1 {
            parts.push(format!("[B{}*{}]", ordinal, count));
        } else {
            parts.push(format!("[B{}]", ordinal));
        }
        index += count;
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BlockBuilder;
    use crate::reachability::mark_reachable;
    use opflow_bound::{ConstValue, Syntax, Type};
    use opflow_ops::Operation;
    use pretty_assertions::assert_eq;

    #[test]
    fn predecessor_counts() {
        assert_eq!(format_predecessors(&[0, 2, 2, 5]), "[B0] [B2*2] [B5]");
        assert_eq!(format_predecessors(&[]), "");
    }

    #[test]
    fn renders_regions_and_captures() {
        let mut builder = BlockBuilder::new();
        let region = builder.enter_region(RegionKind::Locals, Vec::new(), None);
        let id = builder.allocate_capture(region);
        let one = Operation::literal(ConstValue::Int32(1), Some(Type::Int32), Syntax::text("1"));
        builder.add_statement(Operation::flow_capture(id, one));
        builder.leave_region(region);
        builder.close();
        let mut graph = builder.finish();
        mark_reachable(&mut graph);

        let expected = "\
Block[B0] - Entry
    Statements (0)
    Next (Regular) Block[B1]
        Entering: {R1}

.locals {R1}
{
    CaptureIds: [0]
    Block[B1] - Block
        Predecessors: [B0]
        Statements (1)
            FlowCapture: 0 (Type: null, IsImplicit) (Syntax: '1')
              Literal (Type: int, Constant: 1) (Syntax: '1')

        Next (Regular) Block[B2]
            Leaving: {R1}
}

Block[B2] - Exit
    Predecessors: [B1]
    Statements (0)
";
        assert_eq!(graph.to_string(), expected);
    }

    #[test]
    fn unreachable_blocks_are_flagged() {
        let mut builder = BlockBuilder::new();
        let exit = builder.exit;
        builder.unconditional_branch(exit);
        let dead = builder.create_block();
        builder.append_block(dead);
        builder.close();
        let mut graph = builder.finish();
        mark_reachable(&mut graph);
        let text = graph.to_string();
        assert!(text.contains("Block[B2] - Block [UnReachable]\n    Predecessors (0)\n"));
    }
}
