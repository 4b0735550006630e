// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Switch statements and switch expressions.
//!
//! A switch statement becomes a chain of tests against the captured
//! governing value. Each section's tests are followed by its body, so the
//! blocks read in source order. Case values are recorded by constant so
//! `goto case` can resolve them. The first section declaring a value owns
//! it. A later duplicate label is neither tested nor targeted, but its
//! section body is still built and stays unreachable unless something
//! else jumps there.

use std::collections::HashSet;

use indexmap::IndexMap;
use opflow_bound::{
    BoundCaseLabel, BoundCaseLabelKind, BoundExpr, BoundExprKind, BoundPattern, BoundPatternKind,
    BoundStmt, BoundSwitchArm, BoundSwitchSection, ConstValue, LocalSymbol, Type, WellKnownType,
};
use opflow_ops::fold::fold_conversion;
use opflow_ops::{BinaryOperatorKind, Operation, OperationKind};
use tracing::warn;

use super::{ControlFlowGraphBuilder, LoopTargets};
use crate::builder::BlockIx;
use crate::graph::{BranchSemantics, RegionKind};

/// A case constant normalized to the governing type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CaseKey {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    /// Bit pattern of the value.
    Double(u64),
    String(String),
}

impl CaseKey {
    fn new(value: &ConstValue, governing: &Type) -> CaseKey {
        let converted = match value {
            ConstValue::Null => None,
            _ => fold_conversion(value, governing.strip_nullable(), false),
        };
        match converted.as_ref().unwrap_or(value) {
            ConstValue::Null => CaseKey::Null,
            ConstValue::Bool(b) => CaseKey::Bool(*b),
            ConstValue::Char(c) => CaseKey::Char(*c),
            ConstValue::Int32(i) => CaseKey::Int(i64::from(*i)),
            ConstValue::Int64(i) => CaseKey::Int(*i),
            ConstValue::Double(d) => CaseKey::Double(d.to_bits()),
            ConstValue::String(s) => CaseKey::String(s.clone()),
        }
    }
}

/// Jump targets of the switch statement being lowered.
#[derive(Debug)]
pub(super) struct SwitchContext {
    governing_ty: Type,
    cases: IndexMap<CaseKey, BlockIx>,
    default: Option<BlockIx>,
}

impl SwitchContext {
    fn key(&self, value: &BoundExpr) -> Option<CaseKey> {
        case_constant(value).map(|constant| CaseKey::new(&constant, &self.governing_ty))
    }

    fn resolve(&self, value: &BoundExpr) -> Option<BlockIx> {
        self.key(value).and_then(|key| self.cases.get(&key).copied())
    }
}

/// The constant a case label denotes, looking through conversions.
fn case_constant(expr: &BoundExpr) -> Option<ConstValue> {
    match &expr.kind {
        BoundExprKind::Literal(value) => Some(value.clone()),
        BoundExprKind::Conversion { operand, checked, .. } => {
            let inner = case_constant(operand)?;
            if inner.is_null() {
                return Some(inner);
            }
            fold_conversion(&inner, &expr.ty, *checked)
        }
        _ => None,
    }
}

/// The value a label tests for, if it tests a single constant.
fn label_value(label: &BoundCaseLabel) -> Option<&BoundExpr> {
    match &label.kind {
        BoundCaseLabelKind::Value(value) => Some(value),
        BoundCaseLabelKind::Pattern { pattern, guard: None } => match &pattern.kind {
            BoundPatternKind::Constant(value) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

impl<'a> ControlFlowGraphBuilder<'a> {
    // ── Switch statements ───────────────────────────────────────────

    pub(super) fn visit_switch_statement(
        &mut self,
        governing: &BoundExpr,
        locals: &[LocalSymbol],
        sections: &[BoundSwitchSection],
    ) {
        let break_block = self.blocks.create_block();
        self.push_frame();
        let value = self.visit_expr(governing);
        let region = self.current_region_required();
        let governing_ref = self.capture(region, value);
        let locals_region = (!locals.is_empty())
            .then(|| self.blocks.enter_region(RegionKind::Locals, locals.to_vec(), None));

        let bodies: Vec<BlockIx> = sections.iter().map(|_| self.blocks.create_block()).collect();
        let mut context = SwitchContext { governing_ty: governing.ty.clone(), cases: IndexMap::new(), default: None };
        for (section, &body) in sections.iter().zip(&bodies) {
            for label in &section.labels {
                if matches!(label.kind, BoundCaseLabelKind::Default) {
                    context.default.get_or_insert(body);
                } else if let Some(key) = label_value(label).and_then(|value| context.key(value)) {
                    context.cases.entry(key).or_insert(body);
                }
            }
        }
        let fallback = context.default.unwrap_or(break_block);
        self.switches.push(context);
        self.loops.push(LoopTargets { break_block, continue_block: None });

        let mut tested = HashSet::new();
        for (section, &body) in sections.iter().zip(&bodies) {
            for label in &section.labels {
                self.visit_case_label(label, &governing_ref, body, &mut tested);
            }
            let next_section = self.blocks.create_block();
            self.blocks.unconditional_branch(next_section);

            self.blocks.append_block(body);
            for statement in &section.statements {
                self.visit_stmt(statement);
            }
            if self.blocks.falls_through() {
                self.blocks.unconditional_branch(break_block);
            }
            self.blocks.append_block(next_section);
        }
        self.blocks.unconditional_branch(fallback);

        self.loops.pop();
        self.switches.pop();
        if let Some(region) = locals_region {
            self.blocks.leave_region(region);
        }
        self.pop_frame();
        self.blocks.append_block(break_block);
    }

    /// Jumps to `body` when `label` matches; falls through otherwise.
    fn visit_case_label(
        &mut self,
        label: &BoundCaseLabel,
        governing: &Operation,
        body: BlockIx,
        tested: &mut HashSet<CaseKey>,
    ) {
        let next = match &label.kind {
            BoundCaseLabelKind::Default => return,
            BoundCaseLabelKind::Value(value) => {
                let key = self.switches.last().and_then(|context| context.key(value));
                if key.is_some_and(|key| !tested.insert(key)) {
                    return;
                }
                let test = self.value_test(governing.clone(), value, label);
                let next = self.blocks.create_block();
                self.blocks.conditional_branch(test, false, next);
                next
            }
            BoundCaseLabelKind::Pattern { pattern, guard } => {
                let key = label_value(label).and_then(|value| self.switches.last().and_then(|c| c.key(value)));
                if key.is_some_and(|key| !tested.insert(key)) {
                    return;
                }
                let test = self.pattern_test(governing.clone(), pattern, label.syntax.clone()).implicit();
                let next = self.blocks.create_block();
                self.blocks.conditional_branch(test, false, next);
                if let Some(guard) = guard {
                    self.visit_conditional_branch(guard, next, false);
                }
                next
            }
        };
        self.blocks.unconditional_branch(body);
        self.blocks.append_block(next);
    }

    /// `governing == value` for built-in types, a constant pattern otherwise.
    fn value_test(&mut self, governing: Operation, value: &BoundExpr, label: &BoundCaseLabel) -> Operation {
        let governing_ty = governing.ty.clone().unwrap_or(Type::Error);
        if governing_ty.is_primitive() && value.ty == governing_ty {
            let value = self.in_frame(|this| this.visit_expr(value));
            Operation::new(OperationKind::Binary { op: BinaryOperatorKind::Equals, method: None }, Some(Type::Bool), label.syntax.clone())
                .implicit()
                .with_children(vec![governing, value])
        } else {
            let pattern = BoundPattern::constant(value.clone());
            self.pattern_test(governing, &pattern, label.syntax.clone()).implicit()
        }
    }

    pub(super) fn visit_goto_case(&mut self, stmt: &BoundStmt, value: &BoundExpr) {
        match self.switches.last().and_then(|context| context.resolve(value)) {
            Some(target) => self.blocks.unconditional_branch(target),
            None => {
                warn!(value = %value.syntax.text, "goto case does not match any case label");
                self.in_frame(|this| {
                    let value = this.visit_expr(value);
                    this.add_invalid_statement(stmt, vec![value]);
                });
            }
        }
    }

    pub(super) fn visit_goto_default(&mut self, stmt: &BoundStmt) {
        match self.switches.last().and_then(|context| context.default) {
            Some(target) => self.blocks.unconditional_branch(target),
            None => {
                warn!("goto default without a default label");
                self.add_invalid_statement(stmt, Vec::new());
            }
        }
    }

    // ── Switch expressions ──────────────────────────────────────────

    /// Arms are tried in order; the first match stores its value into the
    /// result capture. Falling off the last arm throws.
    pub(super) fn visit_switch_expression(
        &mut self,
        expr: &BoundExpr,
        governing: &BoundExpr,
        arms: &[BoundSwitchArm],
    ) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let after_switch = self.blocks.create_block();
        let id = self.blocks.allocate_capture(result_region);

        self.push_frame();
        let value = self.visit_expr(governing);
        let region = self.current_region_required();
        let governing_ref = self.capture(region, value);

        for arm in arms {
            let after_arm = self.blocks.create_block();
            let arm_region = (!arm.locals.is_empty())
                .then(|| self.blocks.enter_region(RegionKind::Locals, arm.locals.clone(), None));
            let test = self.pattern_test(governing_ref.clone(), &arm.pattern, arm.syntax.clone());
            self.blocks.conditional_branch(test, false, after_arm);
            if let Some(guard) = &arm.guard {
                self.visit_conditional_branch(guard, after_arm, false);
            }
            self.visit_and_capture(&arm.value, id);
            self.blocks.unconditional_branch(after_switch);
            if let Some(region) = arm_region {
                self.blocks.leave_region(region);
            }
            self.blocks.append_block(after_arm);
        }

        let failure = self.unmatched_switch_exception(expr, governing_ref);
        self.blocks.terminate(BranchSemantics::Throw, None, Some(failure));
        self.pop_frame();

        self.blocks.append_block(after_switch);
        self.capture_reference(id, expr)
    }

    /// `new SwitchExpressionException(value)`.
    fn unmatched_switch_exception(&self, expr: &BoundExpr, governing: Operation) -> Operation {
        let exception = self.types.well_known(WellKnownType::SwitchExpressionException);
        let Some(constructor) = self.types.constructor(&exception, 1) else {
            warn!("no SwitchExpressionException(object) constructor");
            return Operation::new(OperationKind::Invalid, Some(exception), expr.syntax.clone()).implicit();
        };
        let parameter = constructor.parameters.first().cloned();
        let value = if governing.ty.as_ref() == Some(&Type::Object) {
            governing
        } else {
            Operation::implicit_conversion(governing, Type::Object)
        };
        let argument = Operation::new(OperationKind::Argument { parameter }, None, expr.syntax.clone())
            .implicit()
            .with_child(value);
        Operation::new(OperationKind::ObjectCreation { constructor: Some(constructor) }, Some(exception), expr.syntax.clone())
            .implicit()
            .with_child(argument)
    }
}
