// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Pattern tests and the locals patterns declare.

use opflow_bound::{BoundExpr, BoundExprKind, BoundPattern, BoundStmt, LocalSymbol, Syntax, Type};
use opflow_ops::{Operation, OperationKind};

use super::ControlFlowGraphBuilder;

impl<'a> ControlFlowGraphBuilder<'a> {
    /// Locals bound by `is` patterns in the expressions `stmt` evaluates
    /// itself. They are in scope for the whole statement, so they belong
    /// to a region around it rather than to an operand's frame.
    pub(super) fn statement_pattern_locals(&self, stmt: &BoundStmt) -> Vec<LocalSymbol> {
        let mut locals = Vec::new();
        for expr in stmt.expressions() {
            self.collect_pattern_locals(expr, &mut locals);
        }
        locals.retain(|local| !self.blocks.regions.declares(local));
        locals
    }

    /// Switch expression arms are skipped; their locals live in the arm.
    fn collect_pattern_locals(&self, expr: &BoundExpr, locals: &mut Vec<LocalSymbol>) {
        for operand in expr.operands() {
            self.collect_pattern_locals(operand, locals);
        }
        if let BoundExprKind::IsPattern { operand, pattern, .. } = &expr.kind {
            for local in self.ops.build_pattern(pattern.as_ref(), &operand.ty).bindings {
                if !locals.contains(&local) {
                    locals.push(local);
                }
            }
        }
    }

    /// Declares the locals bound by `pattern` unless an enclosing region
    /// already does.
    pub(super) fn declare_pattern_locals(&mut self, pattern: &BoundPattern, input_type: &Type) {
        let bindings = self.ops.build_pattern(pattern, input_type).bindings;
        self.declare_locals(bindings);
    }

    fn declare_locals(&mut self, locals: Vec<LocalSymbol>) {
        let undeclared: Vec<LocalSymbol> =
            locals.into_iter().filter(|local| !self.blocks.regions.declares(local)).collect();
        if undeclared.is_empty() {
            return;
        }
        let region = self.current_region_required();
        for local in undeclared {
            self.blocks.regions.add_local(region, local);
        }
    }

    /// `value is pattern`, with the pattern resolved against the type of
    /// `value`.
    pub(super) fn pattern_test(&mut self, value: Operation, pattern: &BoundPattern, syntax: Syntax) -> Operation {
        let input_type = value.ty.clone().unwrap_or(Type::Error);
        let decision = self.ops.build_pattern(pattern, &input_type);
        self.declare_locals(decision.bindings);
        Operation::new(OperationKind::IsPattern, Some(Type::Bool), syntax)
            .with_children(vec![value, decision.operation])
    }
}
