// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Flow-graph lowering - bound bodies to basic blocks.
//!
//! Lowering is a single recursive walk. Expressions produce operation trees
//! bottom-up; whenever an operand is about to introduce branches, everything
//! already evaluated on the enclosing expressions' evaluation stack is
//! captured first, so the original left-to-right order survives the split
//! into blocks.

mod expr;
mod pattern;
mod stmt;
mod switch;

use std::collections::HashMap;

use opflow_bound::{
    BodyKind, BoundBody, BoundExpr, BoundRoot, BoundStmt, BoundStmtKind, LabelId, Syntax, Type,
    TypeTable,
};
use opflow_ops::{CaptureId, Operation, OperationKind, OperationTreeBuilder};
use tracing::debug;

use crate::builder::{BlockBuilder, BlockIx};
use crate::config::BuildOptions;
use crate::graph::{BranchSemantics, ControlFlowGraph, RegionKind};
use crate::pack::pack;
use crate::reachability::mark_reachable;
use crate::region::RegionIx;

use self::switch::SwitchContext;

/// Operands of one expression under evaluation. Operands at or above
/// `base` on the evaluation stack belong to this frame.
#[derive(Debug)]
struct EvalFrame {
    base: usize,
    /// Locals region holding the frame's captures, entered on demand.
    region: Option<RegionIx>,
}

/// Where `break` and `continue` go. Switches have no continue target.
#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    break_block: BlockIx,
    continue_block: Option<BlockIx>,
}

pub struct ControlFlowGraphBuilder<'a> {
    ops: OperationTreeBuilder<'a>,
    types: &'a TypeTable,
    options: BuildOptions,
    blocks: BlockBuilder,
    stack: Vec<Operation>,
    frames: Vec<EvalFrame>,
    /// Stack entries below this index are already capture references.
    spilled_to: usize,
    labels: HashMap<LabelId, BlockIx>,
    loops: Vec<LoopTargets>,
    switches: Vec<SwitchContext>,
    /// Receivers of the conditional accesses being lowered, innermost last.
    conditional_instances: Vec<Operation>,
}

impl<'a> ControlFlowGraphBuilder<'a> {
    pub fn new(types: &'a TypeTable, options: BuildOptions) -> Self {
        ControlFlowGraphBuilder {
            ops: OperationTreeBuilder::new(types).with_constant_folding(options.fold_constants),
            types,
            options,
            blocks: BlockBuilder::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            spilled_to: 0,
            labels: HashMap::new(),
            loops: Vec::new(),
            switches: Vec::new(),
            conditional_instances: Vec::new(),
        }
    }

    /// Lowers `body` into a finished graph. Consumes the builder; a fresh
    /// one is needed per body.
    pub fn build(mut self, body: &BoundBody) -> ControlFlowGraph {
        debug!(kind = body_kind_name(&body.kind), "building control-flow graph");

        match &body.root {
            BoundRoot::Statement(stmt) => {
                self.collect_labels(stmt);
                self.visit_stmt(stmt);
            }
            BoundRoot::Expression(expr) => self.visit_body_expression(&body.kind, expr),
        }
        assert!(self.frames.is_empty(), "evaluation frames left open at the end of the body");
        self.blocks.close();

        let captures = self.blocks.capture_count();
        if self.options.pack {
            pack(&mut self.blocks);
        }
        let mut graph = self.blocks.finish();
        mark_reachable(&mut graph);

        debug!(
            blocks = graph.blocks.len(),
            regions = graph.regions.len(),
            captures,
            "built control-flow graph"
        );
        if self.options.verify {
            if let Err(err) = graph.verify() {
                panic!("invalid control-flow graph: {}", err);
            }
        }
        graph
    }

    // ── Evaluation stack ────────────────────────────────────────────

    fn push_frame(&mut self) {
        self.frames.push(EvalFrame { base: self.stack.len(), region: None });
    }

    fn pop_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            panic!("evaluation frame stack underflow");
        };
        assert_eq!(self.stack.len(), frame.base, "operands left on a popped evaluation frame");
        self.spilled_to = self.spilled_to.min(self.stack.len());
        if let Some(region) = frame.region {
            self.blocks.leave_region(region);
        }
    }

    fn in_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push_frame();
        let result = f(self);
        self.pop_frame();
        result
    }

    fn push_operand(&mut self, operand: Operation) {
        self.stack.push(operand);
    }

    fn pop_operand(&mut self) -> Operation {
        let Some(operand) = self.stack.pop() else {
            panic!("evaluation stack underflow");
        };
        if let Some(frame) = self.frames.last() {
            assert!(self.stack.len() >= frame.base, "operand popped across an evaluation frame");
        }
        self.spilled_to = self.spilled_to.min(self.stack.len());
        operand
    }

    /// Captures every pending operand so that branches emitted next cannot
    /// reorder their evaluation.
    fn spill_eval_stack(&mut self) {
        for index in self.spilled_to..self.stack.len() {
            if matches!(self.stack[index].kind, OperationKind::FlowCaptureReference { .. }) {
                continue;
            }
            let Some(owner) = self.frames.iter().rposition(|frame| frame.base <= index) else {
                panic!("operand outside any evaluation frame");
            };
            let region = self.ensure_frame_region(owner);
            let value = self.stack[index].clone();
            self.stack[index] = self.capture(region, value);
        }
        self.spilled_to = self.stack.len();
    }

    fn ensure_frame_region(&mut self, frame: usize) -> RegionIx {
        if let Some(region) = self.frames[frame].region {
            return region;
        }
        let region = self.blocks.enter_region(RegionKind::Locals, Vec::new(), None);
        self.frames[frame].region = Some(region);
        region
    }

    /// The innermost frame's region, entering one if needed.
    fn current_region_required(&mut self) -> RegionIx {
        let Some(top) = self.frames.len().checked_sub(1) else {
            panic!("no evaluation frame to own a region");
        };
        if self.frames[top].region.is_none() {
            self.spill_eval_stack();
        }
        self.ensure_frame_region(top)
    }

    // ── Captures ────────────────────────────────────────────────────

    /// Stores `value` into a fresh capture owned by `region` and returns a
    /// reference to it.
    fn capture(&mut self, region: RegionIx, value: Operation) -> Operation {
        let id = self.blocks.allocate_capture(region);
        let reference = Operation::flow_capture_reference(id, value.ty.clone(), value.syntax.clone());
        self.blocks.add_statement(Operation::flow_capture(id, value));
        reference
    }

    fn capture_reference(&self, id: CaptureId, expr: &BoundExpr) -> Operation {
        Operation::flow_capture_reference(id, Some(expr.ty.clone()), expr.syntax.clone())
    }

    /// Lowers `expr` in its own frame and stores the result into `id`. A
    /// throw expression leaves nothing to store.
    fn visit_and_capture(&mut self, expr: &BoundExpr, id: CaptureId) {
        self.in_frame(|this| {
            let value = this.visit_expr(expr);
            if !matches!(expr.kind, opflow_bound::BoundExprKind::Throw(_)) {
                this.blocks.add_statement(Operation::flow_capture(id, value));
            }
        });
    }

    // ── Labels ──────────────────────────────────────────────────────

    /// Creates a block for every label up front so forward `goto`s resolve.
    fn collect_labels(&mut self, stmt: &BoundStmt) {
        match &stmt.kind {
            BoundStmtKind::Block { statements, .. } => {
                for s in statements {
                    self.collect_labels(s);
                }
            }
            BoundStmtKind::Labeled { label, body } => {
                if !self.labels.contains_key(&label.id) {
                    let block = self.blocks.create_block();
                    self.labels.insert(label.id, block);
                }
                self.collect_labels(body);
            }
            BoundStmtKind::If { then_branch, else_branch, .. } => {
                self.collect_labels(then_branch);
                if let Some(e) = else_branch {
                    self.collect_labels(e);
                }
            }
            BoundStmtKind::While { body, .. }
            | BoundStmtKind::DoWhile { body, .. }
            | BoundStmtKind::Using { body, .. }
            | BoundStmtKind::ForEach { body, .. }
            | BoundStmtKind::Lock { body, .. } => self.collect_labels(body),
            BoundStmtKind::For { initializers, body, .. } => {
                for s in initializers {
                    self.collect_labels(s);
                }
                self.collect_labels(body);
            }
            BoundStmtKind::Try { body, catches, finally } => {
                self.collect_labels(body);
                for catch in catches {
                    self.collect_labels(&catch.body);
                }
                if let Some(f) = finally {
                    self.collect_labels(f);
                }
            }
            BoundStmtKind::Switch { sections, .. } => {
                for section in sections {
                    for s in &section.statements {
                        self.collect_labels(s);
                    }
                }
            }
            _ => {}
        }
    }

    // ── Bodies ──────────────────────────────────────────────────────

    fn visit_body_expression(&mut self, kind: &BodyKind, expr: &BoundExpr) {
        let initializer_syntax = Syntax::new(expr.syntax.span, format!("= {}", expr.syntax.text));
        match kind {
            BodyKind::Method if expr.ty != Type::Void => self.in_frame(|this| {
                let value = this.visit_expr(expr);
                let exit = this.blocks.exit;
                this.blocks.terminate(BranchSemantics::Return, Some(exit), Some(value));
            }),
            BodyKind::Method | BodyKind::AttributeArgument | BodyKind::ConstructorInitializer => {
                self.in_frame(|this| {
                    let value = this.visit_expr(expr);
                    let statement = Operation::expression_statement(value, expr.syntax.clone()).implicit();
                    this.blocks.add_statement(statement);
                })
            }
            BodyKind::FieldInitializer(field) => {
                let instance = (!field.is_static).then(|| self.instance_reference(&field.containing, &expr.syntax));
                let target = Operation::new(
                    OperationKind::FieldReference { field: field.clone(), has_instance: instance.is_some() },
                    Some(field.ty.clone()),
                    initializer_syntax.clone(),
                )
                .implicit()
                .with_children(instance.into_iter().collect());
                self.initialize(target, expr, initializer_syntax);
            }
            BodyKind::PropertyInitializer(property) => {
                let instance = self.instance_reference(&property.containing, &expr.syntax);
                let target = Operation::new(
                    OperationKind::PropertyReference { property: property.clone(), has_instance: true },
                    Some(property.ty.clone()),
                    initializer_syntax.clone(),
                )
                .implicit()
                .with_child(instance);
                self.initialize(target, expr, initializer_syntax);
            }
            BodyKind::ParameterInitializer(parameter) => {
                let target = Operation::new(
                    OperationKind::ParameterReference { parameter: parameter.clone() },
                    Some(parameter.ty.clone()),
                    initializer_syntax.clone(),
                )
                .implicit();
                self.initialize(target, expr, initializer_syntax);
            }
        }
    }

    fn instance_reference(&self, ty: &Type, syntax: &Syntax) -> Operation {
        Operation::new(OperationKind::InstanceReference, Some(ty.clone()), syntax.clone()).implicit()
    }

    /// `target = value` as the body's only statement.
    fn initialize(&mut self, target: Operation, value: &BoundExpr, syntax: Syntax) {
        self.in_frame(|this| {
            this.push_operand(target);
            let value = this.visit_expr(value);
            let target = this.pop_operand();
            let ty = target.ty.clone();
            let assignment = Operation::new(OperationKind::SimpleAssignment, ty, syntax)
                .implicit()
                .with_children(vec![target, value]);
            this.blocks.add_statement(assignment);
        });
    }
}

fn body_kind_name(kind: &BodyKind) -> &'static str {
    match kind {
        BodyKind::Method => "method",
        BodyKind::FieldInitializer(_) => "field initializer",
        BodyKind::PropertyInitializer(_) => "property initializer",
        BodyKind::ParameterInitializer(_) => "parameter initializer",
        BodyKind::AttributeArgument => "attribute argument",
        BodyKind::ConstructorInitializer => "constructor initializer",
    }
}
