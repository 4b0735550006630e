// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Expression lowering. Everything that branches lands here: short-circuit
//! operators, `?:`, `??`, `?.`, lifted operators and throw expressions.

use opflow_bound::{
    BinaryOp, BoundExpr, BoundExprKind, ConstValue, LogicalOp, Syntax, Type, UnaryOp,
    UserDefinedLogical,
};
use opflow_ops::fold::default_constant;
use opflow_ops::{
    binary_operator_kind, unary_operator_kind, BinaryOperatorKind, Operation, OperationKind,
    UnaryOperatorKind,
};

use super::ControlFlowGraphBuilder;
use crate::builder::BlockIx;
use crate::graph::BranchSemantics;

/// What is known about a lifted operand on the path where some operand
/// turned out to be null.
enum Nullness {
    /// Constant `null`.
    Always,
    /// Nullable; holds the captured operand.
    Maybe(Operation),
    Never,
}

impl Nullness {
    fn of(value: &Operation) -> Nullness {
        if value.constant.as_ref().is_some_and(ConstValue::is_null) {
            Nullness::Always
        } else if value.ty.as_ref().is_some_and(Type::is_nullable) {
            Nullness::Maybe(value.clone())
        } else {
            Nullness::Never
        }
    }
}

impl<'a> ControlFlowGraphBuilder<'a> {
    pub(super) fn visit_expr(&mut self, expr: &BoundExpr) -> Operation {
        match &expr.kind {
            BoundExprKind::ConditionalReceiver => match self.conditional_instances.last() {
                Some(instance) => instance.clone(),
                None => self.ops.assemble(expr, Vec::new()).invalid(),
            },
            BoundExprKind::Logical { op, left, right, user_defined: Some(operators) } => {
                self.visit_user_defined_logical(expr, *op, left, right, operators)
            }
            BoundExprKind::Logical { op, left, right, user_defined: None } => {
                self.visit_logical_value(expr, *op, left, right)
            }
            BoundExprKind::Conditional { condition, when_true, when_false } => {
                self.visit_conditional_value(expr, condition, when_true, when_false)
            }
            BoundExprKind::Coalesce { left, right } => self.visit_coalesce_value(expr, left, right),
            BoundExprKind::ConditionalAccess { receiver, access } => {
                self.visit_conditional_access_value(expr, receiver, access)
            }
            BoundExprKind::IsPattern { operand, pattern, .. } => {
                self.declare_pattern_locals(pattern.as_ref(), &operand.ty);
                self.visit_operands(expr)
            }
            BoundExprKind::Switch { governing, arms } => self.visit_switch_expression(expr, governing, arms),
            BoundExprKind::Throw(exception) => self.visit_throw_expression(expr, exception),
            BoundExprKind::Binary { op, left, right, method: None, lifted: true } => {
                self.visit_lifted_binary(expr, *op, left, right)
            }
            BoundExprKind::Unary { op, operand, method: None, lifted: true } => {
                self.visit_lifted_unary(expr, *op, operand)
            }
            _ => self.visit_operands(expr),
        }
    }

    /// Lowers each operand in order, keeping the results on the evaluation
    /// stack until all are done, then builds the node over them.
    fn visit_operands(&mut self, expr: &BoundExpr) -> Operation {
        let operands = expr.operands();
        let count = operands.len();
        for operand in operands {
            let value = self.visit_expr(operand);
            self.push_operand(value);
        }
        let mut values: Vec<Operation> = (0..count).map(|_| self.pop_operand()).collect();
        values.reverse();
        self.ops.assemble(expr, values)
    }

    // ── Conditional branches ────────────────────────────────────────

    /// Jumps to `dest` when `condition` evaluates to `jump_if_true`, and
    /// falls through otherwise.
    pub(super) fn visit_conditional_branch(&mut self, condition: &BoundExpr, dest: BlockIx, jump_if_true: bool) {
        self.spill_eval_stack();
        match &condition.kind {
            BoundExprKind::Logical { op, left, right, user_defined: None }
                if self.constant_logical(condition).is_none() =>
            {
                let is_or = *op == LogicalOp::Or;
                if is_or == jump_if_true {
                    self.visit_conditional_branch(left, dest, jump_if_true);
                    self.visit_conditional_branch(right, dest, jump_if_true);
                } else {
                    let skip = self.blocks.create_block();
                    self.visit_conditional_branch(left, skip, !jump_if_true);
                    self.visit_conditional_branch(right, dest, jump_if_true);
                    self.blocks.append_block(skip);
                }
            }
            BoundExprKind::Unary { op: UnaryOp::Not, operand, method: None, lifted: false }
                if condition.ty == Type::Bool =>
            {
                self.visit_conditional_branch(operand, dest, !jump_if_true);
            }
            BoundExprKind::Conditional { condition: test, when_true, when_false } if condition.ty == Type::Bool => {
                let false_branch = self.blocks.create_block();
                let after = self.blocks.create_block();
                self.visit_conditional_branch(test, false_branch, false);
                self.visit_conditional_branch(when_true, dest, jump_if_true);
                self.blocks.unconditional_branch(after);
                self.blocks.append_block(false_branch);
                self.visit_conditional_branch(when_false, dest, jump_if_true);
                self.blocks.append_block(after);
            }
            BoundExprKind::Coalesce { left, right } if condition.ty == Type::Bool && right.ty == Type::Bool => {
                let when_null = self.blocks.create_block();
                let after = self.blocks.create_block();
                self.push_frame();
                let converted = self.null_check_and_convert(condition, left, when_null);
                self.blocks.conditional_branch(converted, jump_if_true, dest);
                self.blocks.unconditional_branch(after);
                self.pop_frame();
                self.blocks.append_block(when_null);
                self.visit_conditional_branch(right, dest, jump_if_true);
                self.blocks.append_block(after);
            }
            _ => self.in_frame(|this| {
                let value = this.visit_expr(condition);
                this.blocks.conditional_branch(value, jump_if_true, dest);
            }),
        }
    }

    /// The folded value of `a && b` / `a || b` over constant operands.
    fn constant_logical(&self, expr: &BoundExpr) -> Option<bool> {
        if !self.options.fold_constants {
            return None;
        }
        let BoundExprKind::Logical { op, left, right, user_defined: None } = &expr.kind else {
            return None;
        };
        let left = left.constant()?.as_bool()?;
        let right = right.constant()?.as_bool()?;
        Some(match op {
            LogicalOp::And => left && right,
            LogicalOp::Or => left || right,
        })
    }

    // ── Short-circuit operators ─────────────────────────────────────

    fn visit_logical_value(&mut self, expr: &BoundExpr, op: LogicalOp, left: &BoundExpr, right: &BoundExpr) -> Operation {
        if let Some(value) = self.constant_logical(expr) {
            return Operation::literal(ConstValue::Bool(value), Some(expr.ty.clone()), expr.syntax.clone());
        }

        self.spill_eval_stack();
        let region = self.current_region_required();
        let short_circuit = self.blocks.create_block();
        let done = self.blocks.create_block();
        let is_or = op == LogicalOp::Or;

        self.visit_conditional_branch(left, short_circuit, is_or);
        let id = self.blocks.allocate_capture(region);
        self.visit_and_capture(right, id);
        self.blocks.unconditional_branch(done);

        self.blocks.append_block(short_circuit);
        let known = Operation::literal(ConstValue::Bool(is_or), Some(expr.ty.clone()), left.syntax.clone()).implicit();
        self.blocks.add_statement(Operation::flow_capture(id, known));

        self.blocks.append_block(done);
        self.capture_reference(id, expr)
    }

    /// `a && b` over a type with `operator false` and `operator &` (or
    /// `||` with `operator true` and `operator |`): `a` is tested with the
    /// unary operator and becomes the result when it decides the outcome.
    fn visit_user_defined_logical(
        &mut self,
        expr: &BoundExpr,
        op: LogicalOp,
        left: &BoundExpr,
        right: &BoundExpr,
        operators: &UserDefinedLogical,
    ) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let short_circuit = self.blocks.create_block();
        let done = self.blocks.create_block();

        self.push_frame();
        let value = self.visit_expr(left);
        let region = self.current_region_required();
        let left_ref = self.capture(region, value);

        let (test_op, combine_op) = match op {
            LogicalOp::And => (UnaryOperatorKind::False, BinaryOperatorKind::And),
            LogicalOp::Or => (UnaryOperatorKind::True, BinaryOperatorKind::Or),
        };
        let test = Operation::new(
            OperationKind::Unary { op: test_op, method: Some(operators.short_circuit_test.clone()) },
            Some(Type::Bool),
            left.syntax.clone(),
        )
        .implicit()
        .with_child(left_ref.clone());
        self.blocks.conditional_branch(test, true, short_circuit);

        let id = self.blocks.allocate_capture(result_region);
        self.push_operand(left_ref);
        let right_value = self.visit_expr(right);
        let left_ref = self.pop_operand();
        let combined = Operation::new(
            OperationKind::Binary { op: combine_op, method: Some(operators.operator.clone()) },
            Some(expr.ty.clone()),
            expr.syntax.clone(),
        )
        .with_children(vec![left_ref.clone(), right_value]);
        self.blocks.add_statement(Operation::flow_capture(id, combined));
        self.blocks.unconditional_branch(done);

        self.blocks.append_block(short_circuit);
        self.blocks.add_statement(Operation::flow_capture(id, left_ref));
        self.pop_frame();

        self.blocks.append_block(done);
        self.capture_reference(id, expr)
    }

    // ── Conditional and coalesce ────────────────────────────────────

    fn visit_conditional_value(
        &mut self,
        expr: &BoundExpr,
        condition: &BoundExpr,
        when_true: &BoundExpr,
        when_false: &BoundExpr,
    ) -> Operation {
        self.spill_eval_stack();
        let region = self.current_region_required();
        let false_branch = self.blocks.create_block();
        let after = self.blocks.create_block();

        self.visit_conditional_branch(condition, false_branch, false);
        let id = self.blocks.allocate_capture(region);
        self.visit_and_capture(when_true, id);
        self.blocks.unconditional_branch(after);

        self.blocks.append_block(false_branch);
        self.visit_and_capture(when_false, id);

        self.blocks.append_block(after);
        self.capture_reference(id, expr)
    }

    fn visit_coalesce_value(&mut self, expr: &BoundExpr, left: &BoundExpr, right: &BoundExpr) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let when_null = self.blocks.create_block();
        let after = self.blocks.create_block();

        self.push_frame();
        let converted = self.null_check_and_convert(expr, left, when_null);
        let id = self.blocks.allocate_capture(result_region);
        self.blocks.add_statement(Operation::flow_capture(id, converted));
        self.blocks.unconditional_branch(after);
        self.pop_frame();

        self.blocks.append_block(when_null);
        self.visit_and_capture(right, id);

        self.blocks.append_block(after);
        self.capture_reference(id, expr)
    }

    /// Captures the left operand of `coalesce`, jumps to `when_null` if it
    /// is null and returns it converted to the result type.
    fn null_check_and_convert(&mut self, coalesce: &BoundExpr, left: &BoundExpr, when_null: BlockIx) -> Operation {
        let value = self.visit_expr(left);
        let region = self.current_region_required();
        let reference = self.capture(region, value);
        self.blocks.conditional_branch(Operation::is_null(reference.clone()), true, when_null);

        let result_ty = &coalesce.ty;
        if left.ty.is_nullable() && !result_ty.is_nullable() {
            let value = self.get_value_or_default(reference);
            if value.ty.as_ref() == Some(result_ty) {
                value
            } else {
                Operation::implicit_conversion(value, result_ty.clone())
            }
        } else if &left.ty != result_ty {
            Operation::implicit_conversion(reference, result_ty.clone())
        } else {
            reference
        }
    }

    /// `value.GetValueOrDefault()` on a nullable value.
    pub(super) fn get_value_or_default(&self, value: Operation) -> Operation {
        let nullable = value.ty.clone().unwrap_or(Type::Error);
        let method = self.types.get_value_or_default(&nullable);
        let ty = method.return_type.clone();
        let syntax = value.syntax.clone();
        Operation::new(OperationKind::Invocation { method, has_instance: true }, Some(ty), syntax)
            .implicit()
            .with_child(value)
    }

    // ── Conditional access ──────────────────────────────────────────

    fn visit_conditional_access_value(&mut self, expr: &BoundExpr, receiver: &BoundExpr, access: &BoundExpr) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let when_null = self.blocks.create_block();
        let after = self.blocks.create_block();

        self.push_frame();
        let value = self.visit_access_chain(receiver, access, when_null);
        let value = if value.ty.as_ref() == Some(&expr.ty) {
            value
        } else {
            Operation::implicit_conversion(value, expr.ty.clone())
        };
        let id = self.blocks.allocate_capture(result_region);
        self.blocks.add_statement(Operation::flow_capture(id, value));
        self.blocks.unconditional_branch(after);
        self.pop_frame();

        self.blocks.append_block(when_null);
        let default = Operation::new(OperationKind::DefaultValue, Some(expr.ty.clone()), receiver.syntax.clone())
            .with_constant(default_constant(&expr.ty, self.types))
            .implicit();
        self.blocks.add_statement(Operation::flow_capture(id, default));

        self.blocks.append_block(after);
        self.capture_reference(id, expr)
    }

    /// `receiver?.M();` as a statement: nothing to capture, the null path
    /// just skips the call.
    pub(super) fn visit_conditional_access_statement(&mut self, receiver: &BoundExpr, access: &BoundExpr, syntax: &Syntax) {
        let after = self.blocks.create_block();
        self.in_frame(|this| {
            let value = this.visit_access_chain(receiver, access, after);
            this.blocks.add_statement(Operation::expression_statement(value, syntax.clone()));
        });
        self.blocks.append_block(after);
    }

    /// Evaluates `receiver` once, tests it and lowers `access` against it.
    /// Nested accesses in a chain share `when_null`.
    fn visit_access_chain(&mut self, receiver: &BoundExpr, access: &BoundExpr, when_null: BlockIx) -> Operation {
        let value = self.visit_expr(receiver);
        let region = self.current_region_required();
        let reference = self.capture(region, value);
        self.blocks.conditional_branch(Operation::is_null(reference.clone()), true, when_null);

        let instance = if receiver.ty.is_nullable() {
            self.get_value_or_default(reference)
        } else {
            reference
        };
        self.conditional_instances.push(instance);
        let result = match &access.kind {
            BoundExprKind::ConditionalAccess { receiver: inner, access: rest } => {
                self.visit_access_chain(inner, rest, when_null)
            }
            _ => self.visit_expr(access),
        };
        self.conditional_instances.pop();
        result
    }

    // ── Lifted operators ────────────────────────────────────────────

    fn capture_lifted_operand(&mut self, value: Operation) -> Operation {
        if value.constant.is_some() || matches!(value.kind, OperationKind::FlowCaptureReference { .. }) {
            return value;
        }
        let region = self.current_region_required();
        self.capture(region, value)
    }

    /// Jumps to `when_null` if any operand is null.
    fn test_lifted_operands(&mut self, operands: &[&Operation], when_null: BlockIx) {
        let nullness: Vec<Nullness> = operands.iter().map(|op| Nullness::of(op)).collect();
        if nullness.iter().any(|n| matches!(n, Nullness::Always)) {
            self.blocks.unconditional_branch(when_null);
            return;
        }
        for n in nullness {
            if let Nullness::Maybe(operand) = n {
                self.blocks.conditional_branch(Operation::is_null(operand), true, when_null);
            }
        }
    }

    fn unwrap_lifted_operand(&self, value: Operation) -> Operation {
        if value.ty.as_ref().is_some_and(Type::is_nullable) {
            self.get_value_or_default(value)
        } else {
            value
        }
    }

    fn visit_lifted_binary(&mut self, expr: &BoundExpr, op: BinaryOp, left: &BoundExpr, right: &BoundExpr) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let when_null = self.blocks.create_block();
        let after = self.blocks.create_block();

        self.push_frame();
        let left_value = self.visit_expr(left);
        self.push_operand(left_value);
        let right_value = self.visit_expr(right);
        let left_value = self.pop_operand();
        let left_value = self.capture_lifted_operand(left_value);
        let right_value = self.capture_lifted_operand(right_value);
        self.test_lifted_operands(&[&left_value, &right_value], when_null);

        let id = self.blocks.allocate_capture(result_region);
        let children = vec![
            self.unwrap_lifted_operand(left_value.clone()),
            self.unwrap_lifted_operand(right_value.clone()),
        ];
        let unlifted = Operation::new(
            OperationKind::Binary { op: binary_operator_kind(op), method: None },
            Some(expr.ty.strip_nullable().clone()),
            expr.syntax.clone(),
        )
        .implicit()
        .with_children(children);
        self.blocks.add_statement(Operation::flow_capture(id, self.rewrap(unlifted, &expr.ty)));
        self.blocks.unconditional_branch(after);

        self.blocks.append_block(when_null);
        let null_result = self.lifted_binary_null_result(expr, op, Nullness::of(&left_value), Nullness::of(&right_value));
        self.blocks.add_statement(Operation::flow_capture(id, null_result));
        self.pop_frame();

        self.blocks.append_block(after);
        self.capture_reference(id, expr).lifted(true)
    }

    fn visit_lifted_unary(&mut self, expr: &BoundExpr, op: UnaryOp, operand: &BoundExpr) -> Operation {
        self.spill_eval_stack();
        let result_region = self.current_region_required();
        let when_null = self.blocks.create_block();
        let after = self.blocks.create_block();

        self.push_frame();
        let value = self.visit_expr(operand);
        let value = self.capture_lifted_operand(value);
        self.test_lifted_operands(&[&value], when_null);

        let id = self.blocks.allocate_capture(result_region);
        let unlifted = Operation::new(
            OperationKind::Unary { op: unary_operator_kind(op), method: None },
            Some(expr.ty.strip_nullable().clone()),
            expr.syntax.clone(),
        )
        .implicit()
        .with_child(self.unwrap_lifted_operand(value));
        self.blocks.add_statement(Operation::flow_capture(id, self.rewrap(unlifted, &expr.ty)));
        self.blocks.unconditional_branch(after);

        self.blocks.append_block(when_null);
        self.blocks.add_statement(Operation::flow_capture(id, self.null_default(expr)));
        self.pop_frame();

        self.blocks.append_block(after);
        self.capture_reference(id, expr).lifted(true)
    }

    fn rewrap(&self, value: Operation, ty: &Type) -> Operation {
        if ty.is_nullable() {
            Operation::implicit_conversion(value, ty.clone())
        } else {
            value
        }
    }

    fn null_default(&self, expr: &BoundExpr) -> Operation {
        Operation::new(OperationKind::DefaultValue, Some(expr.ty.clone()), expr.syntax.clone())
            .with_constant(Some(ConstValue::Null))
            .implicit()
    }

    /// Result of a lifted binary operator once some operand is known to be
    /// null. `null == null` holds; relational operators are false; the rest
    /// produce null.
    fn lifted_binary_null_result(&self, expr: &BoundExpr, op: BinaryOp, left: Nullness, right: Nullness) -> Operation {
        let syntax = expr.syntax.clone();
        let literal = |value: bool| Operation::literal(ConstValue::Bool(value), Some(Type::Bool), syntax.clone()).implicit();
        if op.is_relational() {
            return literal(false);
        }
        if !op.is_equality() {
            return self.null_default(expr);
        }

        let equals = op == BinaryOp::Equals;
        match (left, right) {
            (Nullness::Always, Nullness::Always) => literal(equals),
            (Nullness::Never, _) | (_, Nullness::Never) => literal(!equals),
            (Nullness::Always, Nullness::Maybe(other)) | (Nullness::Maybe(other), Nullness::Always) => {
                let test = Operation::is_null(other);
                if equals {
                    test
                } else {
                    Operation::new(OperationKind::Unary { op: UnaryOperatorKind::Not, method: None }, Some(Type::Bool), syntax.clone())
                        .implicit()
                        .with_child(test)
                }
            }
            (Nullness::Maybe(l), Nullness::Maybe(r)) => {
                let kind = if equals { BinaryOperatorKind::Equals } else { BinaryOperatorKind::NotEquals };
                Operation::new(OperationKind::Binary { op: kind, method: None }, Some(Type::Bool), syntax.clone())
                    .implicit()
                    .with_children(vec![Operation::is_null(l), Operation::is_null(r)])
            }
        }
    }

    // ── Throw ───────────────────────────────────────────────────────

    /// `throw e` in value position. Nothing after it runs, so the returned
    /// placeholder is never observed.
    fn visit_throw_expression(&mut self, expr: &BoundExpr, exception: &BoundExpr) -> Operation {
        self.in_frame(|this| {
            let value = this.visit_expr(exception);
            this.blocks.terminate(BranchSemantics::Throw, None, Some(value));
        });
        Operation::new(OperationKind::DefaultValue, Some(expr.ty.clone()), expr.syntax.clone()).implicit()
    }
}
