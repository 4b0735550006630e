// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! OperationTreeBuilder - bound nodes to operation nodes.
//!
//! Children are built before their parent. Every bound expression maps to
//! exactly one operation; `assemble` does that mapping on top of operand
//! operations supplied by the caller, which lets the flow-graph builder
//! substitute capture references for operands it has already evaluated.

use opflow_bound::{
    BinaryOp, BodyKind, BoundBody, BoundCaseLabel, BoundCaseLabelKind, BoundCatch, BoundExpr,
    BoundExprKind, BoundPattern, BoundRoot, BoundStmt, BoundStmtKind, BoundSwitchArm,
    BoundSwitchSection, BoundUsingResource, LogicalOp, ParameterSymbol, Syntax, Type, TypeTable,
    UnaryOp,
};

use crate::fold::{default_constant, fold_binary, fold_conversion, fold_unary};
use crate::operation::{
    BinaryOperatorKind, BranchKind, CaseClauseKind, LoopKind, Operation, OperationKind,
    UnaryOperatorKind,
};
use crate::pattern::{PatternDecision, PatternDecisionBuilder, PatternInfo, PatternKind};

pub struct OperationTreeBuilder<'a> {
    types: &'a TypeTable,
    fold_constants: bool,
}

impl<'a> OperationTreeBuilder<'a> {
    pub fn new(types: &'a TypeTable) -> Self {
        OperationTreeBuilder { types, fold_constants: true }
    }

    /// Turns folding of operators and conversions on or off. Literals always
    /// carry their value.
    pub fn with_constant_folding(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn types(&self) -> &'a TypeTable {
        self.types
    }

    pub fn build_body(&self, body: &BoundBody) -> Operation {
        let value = match &body.root {
            BoundRoot::Statement(stmt) => return self.build_statement(stmt),
            BoundRoot::Expression(expr) => expr,
        };
        let built = self.build_expression(value);
        match &body.kind {
            BodyKind::Method | BodyKind::AttributeArgument | BodyKind::ConstructorInitializer => built,
            BodyKind::FieldInitializer(field) => {
                initializer(OperationKind::FieldInitializer { field: field.clone() }, built)
            }
            BodyKind::PropertyInitializer(property) => {
                initializer(OperationKind::PropertyInitializer { property: property.clone() }, built)
            }
            BodyKind::ParameterInitializer(parameter) => {
                initializer(OperationKind::ParameterInitializer { parameter: parameter.clone() }, built)
            }
        }
    }

    pub fn build_pattern(&self, pattern: &BoundPattern, input_type: &Type) -> PatternDecision {
        PatternDecisionBuilder::new(self).build(pattern, input_type)
    }

    // =================================================================
    // Expressions
    // =================================================================

    pub fn build_expression(&self, expr: &BoundExpr) -> Operation {
        let operands = expr.operands().into_iter().map(|e| self.build_expression(e)).collect();
        self.assemble(expr, operands)
    }

    /// Builds the node for `expr` over already-built operands, given in
    /// `BoundExpr::operands` order. Patterns and switch arms are built here.
    pub fn assemble(&self, expr: &BoundExpr, operands: Vec<Operation>) -> Operation {
        let ty = Some(expr.ty.clone());
        let syntax = expr.syntax.clone();
        match &expr.kind {
            BoundExprKind::Literal(value) => Operation::literal(value.clone(), ty, syntax),

            BoundExprKind::DefaultValue => {
                let constant = default_constant(&expr.ty, self.types);
                Operation::new(OperationKind::DefaultValue, ty, syntax).with_constant(constant)
            }

            BoundExprKind::Local(local) => Operation::new(
                OperationKind::LocalReference { local: local.clone(), is_declaration: false },
                ty,
                syntax,
            ),

            BoundExprKind::Parameter(parameter) => Operation::new(
                OperationKind::ParameterReference { parameter: parameter.clone() },
                ty,
                syntax,
            ),

            BoundExprKind::This => Operation::new(OperationKind::InstanceReference, ty, syntax),

            BoundExprKind::Field { receiver, field } => Operation::new(
                OperationKind::FieldReference { field: field.clone(), has_instance: receiver.is_some() },
                ty,
                syntax,
            )
            .with_children(operands),

            BoundExprKind::Property { receiver, property, .. } => {
                let has_instance = receiver.is_some();
                let children = self.with_arguments(has_instance, operands, &property.parameters, &syntax);
                Operation::new(
                    OperationKind::PropertyReference { property: property.clone(), has_instance },
                    ty,
                    syntax,
                )
                .with_children(children)
            }

            BoundExprKind::Call { receiver, method, .. } => {
                let has_instance = receiver.is_some();
                let children = self.with_arguments(has_instance, operands, &method.parameters, &syntax);
                Operation::new(OperationKind::Invocation { method: method.clone(), has_instance }, ty, syntax)
                    .with_children(children)
            }

            BoundExprKind::ObjectCreation { constructor, .. } => {
                let parameters = constructor.as_ref().map(|c| c.parameters.as_slice()).unwrap_or(&[]);
                let children = self.with_arguments(false, operands, parameters, &syntax);
                let op = Operation::new(
                    OperationKind::ObjectCreation { constructor: constructor.clone() },
                    ty,
                    syntax,
                )
                .with_children(children);
                if constructor.is_none() { op.invalid() } else { op }
            }

            BoundExprKind::Tuple(_) => Operation::new(OperationKind::Tuple, ty, syntax).with_children(operands),

            BoundExprKind::Conversion { implicit, checked, .. } => {
                let constant = self.fold(|| {
                    let value = operands.first()?.constant.as_ref()?;
                    fold_conversion(value, &expr.ty, *checked)
                });
                Operation::new(OperationKind::Conversion, ty, syntax)
                    .with_children(operands)
                    .with_constant(constant)
                    .set_implicit(*implicit)
                    .checked(*checked)
            }

            BoundExprKind::Unary { op, method, lifted, .. } => {
                let constant = if method.is_none() && !lifted {
                    self.fold(|| fold_unary(*op, operands.first()?.constant.as_ref()?))
                } else {
                    None
                };
                Operation::new(
                    OperationKind::Unary { op: unary_operator_kind(*op), method: method.clone() },
                    ty,
                    syntax,
                )
                .with_children(operands)
                .with_constant(constant)
                .lifted(*lifted)
            }

            BoundExprKind::Binary { op, method, lifted, .. } => {
                let constant = if method.is_none() && !lifted {
                    self.fold(|| {
                        let left = operands.first()?.constant.as_ref()?;
                        let right = operands.get(1)?.constant.as_ref()?;
                        fold_binary(*op, left, right)
                    })
                } else {
                    None
                };
                Operation::new(
                    OperationKind::Binary { op: binary_operator_kind(*op), method: method.clone() },
                    ty,
                    syntax,
                )
                .with_children(operands)
                .with_constant(constant)
                .lifted(*lifted)
            }

            BoundExprKind::Logical { op, user_defined, .. } => {
                let kind = match op {
                    LogicalOp::And => BinaryOperatorKind::ConditionalAnd,
                    LogicalOp::Or => BinaryOperatorKind::ConditionalOr,
                };
                let constant = if user_defined.is_none() {
                    self.fold(|| {
                        let left = operands.first()?.constant_bool()?;
                        let right = operands.get(1)?.constant_bool()?;
                        let value = match op {
                            LogicalOp::And => left && right,
                            LogicalOp::Or => left || right,
                        };
                        Some(opflow_bound::ConstValue::Bool(value))
                    })
                } else {
                    None
                };
                let method = user_defined.as_ref().map(|u| u.operator.clone());
                Operation::new(OperationKind::Binary { op: kind, method }, ty, syntax)
                    .with_children(operands)
                    .with_constant(constant)
            }

            BoundExprKind::Assignment { .. } => {
                Operation::new(OperationKind::SimpleAssignment, ty, syntax).with_children(operands)
            }

            BoundExprKind::CompoundAssignment { op, method, lifted, .. } => Operation::new(
                OperationKind::CompoundAssignment { op: binary_operator_kind(*op), method: method.clone() },
                ty,
                syntax,
            )
            .with_children(operands)
            .lifted(*lifted),

            BoundExprKind::Conditional { .. } => {
                let constant = self.fold(|| {
                    let chosen = if operands.first()?.constant_bool()? { 1 } else { 2 };
                    operands.get(chosen)?.constant.clone()
                });
                let constant = constant.filter(|_| operands.iter().all(|o| o.constant.is_some()));
                Operation::new(OperationKind::Conditional { has_else: true }, ty, syntax)
                    .with_children(operands)
                    .with_constant(constant)
            }

            BoundExprKind::Coalesce { .. } => {
                Operation::new(OperationKind::Coalesce, ty, syntax).with_children(operands)
            }

            BoundExprKind::ConditionalAccess { .. } => {
                Operation::new(OperationKind::ConditionalAccess, ty, syntax).with_children(operands)
            }

            BoundExprKind::ConditionalReceiver => {
                Operation::new(OperationKind::ConditionalAccessInstance, ty, syntax).implicit()
            }

            BoundExprKind::IsPattern { operand, pattern, negated } => {
                let built = self.build_pattern(pattern.as_ref(), &operand.ty).operation;
                let pattern_op = if *negated { negate(built, &operand.ty) } else { built };
                let mut children = operands;
                children.push(pattern_op);
                Operation::new(OperationKind::IsPattern, ty, syntax).with_children(children)
            }

            BoundExprKind::Switch { governing, arms } => {
                let mut children = operands;
                children.extend(arms.iter().map(|arm| self.build_arm(arm, &governing.ty)));
                Operation::new(OperationKind::SwitchExpression, ty, syntax).with_children(children)
            }

            BoundExprKind::Throw(_) => Operation::new(OperationKind::Throw, None, syntax).with_children(operands),

            BoundExprKind::Invalid(_) => Operation::new(OperationKind::Invalid, ty, syntax).with_children(operands),
        }
    }

    /// A switch expression arm: `[pattern, guard?, value]`.
    pub fn build_arm(&self, arm: &BoundSwitchArm, input_type: &Type) -> Operation {
        let mut children = vec![self.build_pattern(&arm.pattern, input_type).operation];
        children.extend(arm.guard.as_ref().map(|g| self.build_expression(g)));
        children.push(self.build_expression(&arm.value));
        Operation::new(
            OperationKind::SwitchExpressionArm { locals: arm.locals.clone(), has_guard: arm.guard.is_some() },
            None,
            arm.syntax.clone(),
        )
        .with_children(children)
    }

    fn fold(&self, f: impl FnOnce() -> Option<opflow_bound::ConstValue>) -> Option<opflow_bound::ConstValue> {
        if self.fold_constants { f() } else { None }
    }

    /// Splits off the instance, wraps the rest in `Argument` nodes and fills
    /// omitted trailing parameters from their defaults.
    fn with_arguments(
        &self,
        has_instance: bool,
        mut operands: Vec<Operation>,
        parameters: &[ParameterSymbol],
        syntax: &Syntax,
    ) -> Vec<Operation> {
        let values = if has_instance { operands.split_off(1) } else { std::mem::take(&mut operands) };
        let supplied = values.len();
        let mut children = operands;
        for (index, value) in values.into_iter().enumerate() {
            let parameter = parameters.get(index).cloned();
            let arg_syntax = value.syntax.clone();
            children.push(Operation::new(OperationKind::Argument { parameter }, None, arg_syntax).with_child(value));
        }
        for parameter in parameters.iter().skip(supplied) {
            let Some(default) = &parameter.default_value else {
                continue;
            };
            let value = Operation::literal(default.clone(), Some(parameter.ty.clone()), syntax.clone()).implicit();
            children.push(
                Operation::new(OperationKind::Argument { parameter: Some(parameter.clone()) }, None, syntax.clone())
                    .implicit()
                    .with_child(value),
            );
        }
        children
    }

    // =================================================================
    // Statements
    // =================================================================

    pub fn build_statement(&self, stmt: &BoundStmt) -> Operation {
        let syntax = stmt.syntax.clone();
        match &stmt.kind {
            BoundStmtKind::Block { locals, statements } => {
                Operation::new(OperationKind::Block { locals: locals.clone() }, None, syntax)
                    .with_children(statements.iter().map(|s| self.build_statement(s)).collect())
            }

            BoundStmtKind::LocalDeclaration { local, initializer } => Operation::new(
                OperationKind::VariableDeclaration { local: local.clone() },
                None,
                syntax,
            )
            .with_children(initializer.iter().map(|e| self.build_expression(e)).collect()),

            BoundStmtKind::Expression(expr) => Operation::expression_statement(self.build_expression(expr), syntax),

            BoundStmtKind::If { condition, then_branch, else_branch } => {
                let mut children = vec![self.build_expression(condition), self.build_statement(then_branch)];
                children.extend(else_branch.as_ref().map(|e| self.build_statement(e)));
                Operation::new(OperationKind::Conditional { has_else: else_branch.is_some() }, None, syntax)
                    .with_children(children)
            }

            BoundStmtKind::While { condition, body } => Operation::new(
                OperationKind::Loop { kind: LoopKind::While, locals: Vec::new() },
                None,
                syntax,
            )
            .with_children(vec![self.build_expression(condition), self.build_statement(body)]),

            BoundStmtKind::DoWhile { body, condition } => Operation::new(
                OperationKind::Loop { kind: LoopKind::DoWhile, locals: Vec::new() },
                None,
                syntax,
            )
            .with_children(vec![self.build_expression(condition), self.build_statement(body)]),

            BoundStmtKind::For { locals, initializers, condition, increments, body } => {
                let before = Operation::new(OperationKind::Block { locals: Vec::new() }, None, syntax.clone())
                    .implicit()
                    .with_children(initializers.iter().map(|s| self.build_statement(s)).collect());
                let after = Operation::new(OperationKind::Block { locals: Vec::new() }, None, syntax.clone())
                    .implicit()
                    .with_children(
                        increments
                            .iter()
                            .map(|e| Operation::expression_statement(self.build_expression(e), e.syntax.clone()))
                            .collect(),
                    );
                let mut children = vec![before];
                children.extend(condition.as_ref().map(|c| self.build_expression(c)));
                children.push(after);
                children.push(self.build_statement(body));
                Operation::new(
                    OperationKind::Loop {
                        kind: LoopKind::For { has_condition: condition.is_some() },
                        locals: locals.clone(),
                    },
                    None,
                    syntax,
                )
                .with_children(children)
            }

            BoundStmtKind::Labeled { label, body } => {
                Operation::new(OperationKind::Labeled { label: label.clone() }, None, syntax)
                    .with_child(self.build_statement(body))
            }

            BoundStmtKind::Goto(label) => branch(BranchKind::GoTo, Some(label.clone()), syntax),
            BoundStmtKind::GotoCase(value) => {
                branch(BranchKind::GotoCase, None, syntax).with_child(self.build_expression(value))
            }
            BoundStmtKind::GotoDefault => branch(BranchKind::GotoDefault, None, syntax),
            BoundStmtKind::Break => branch(BranchKind::Break, None, syntax),
            BoundStmtKind::Continue => branch(BranchKind::Continue, None, syntax),

            BoundStmtKind::Return(value) => Operation::new(OperationKind::Return, None, syntax)
                .with_children(value.iter().map(|e| self.build_expression(e)).collect()),

            BoundStmtKind::Throw(value) => Operation::new(OperationKind::Throw, None, syntax)
                .with_children(value.iter().map(|e| self.build_expression(e)).collect()),

            BoundStmtKind::Try { body, catches, finally } => {
                let mut children = vec![self.build_statement(body)];
                children.extend(catches.iter().map(|c| self.build_catch(c)));
                children.extend(finally.as_ref().map(|f| self.build_statement(f)));
                Operation::new(OperationKind::Try { has_finally: finally.is_some() }, None, syntax)
                    .with_children(children)
            }

            BoundStmtKind::Switch { governing, locals, sections } => {
                let mut children = vec![self.build_expression(governing)];
                children.extend(sections.iter().map(|s| self.build_section(s, &governing.ty)));
                Operation::new(OperationKind::Switch { locals: locals.clone() }, None, syntax).with_children(children)
            }

            BoundStmtKind::Using { resource, body } => {
                let (locals, resource) = match resource {
                    BoundUsingResource::Declaration { local, initializer } => {
                        let declaration = Operation::new(
                            OperationKind::VariableDeclaration { local: local.clone() },
                            None,
                            Syntax::new(initializer.syntax.span, resource.text()),
                        )
                        .with_child(self.build_expression(initializer));
                        (vec![local.clone()], declaration)
                    }
                    BoundUsingResource::Expression(expr) => (Vec::new(), self.build_expression(expr)),
                };
                Operation::new(OperationKind::Using { locals }, None, syntax)
                    .with_children(vec![resource, self.build_statement(body)])
            }

            BoundStmtKind::ForEach { local, collection, body, .. } => Operation::new(
                OperationKind::Loop { kind: LoopKind::ForEach, locals: vec![local.clone()] },
                None,
                syntax,
            )
            .with_children(vec![self.build_expression(collection), self.build_statement(body)]),

            BoundStmtKind::Lock { value, body, .. } => Operation::new(OperationKind::Lock, None, syntax)
                .with_children(vec![self.build_expression(value), self.build_statement(body)]),

            BoundStmtKind::Empty => Operation::new(OperationKind::Empty, None, syntax),

            BoundStmtKind::Invalid(children) => Operation::new(OperationKind::Invalid, None, syntax)
                .with_children(children.iter().map(|e| self.build_expression(e)).collect()),
        }
    }

    fn build_catch(&self, catch: &BoundCatch) -> Operation {
        let mut children: Vec<Operation> = catch.filter.iter().map(|f| self.build_expression(f)).collect();
        children.push(self.build_statement(&catch.body));
        Operation::new(
            OperationKind::CatchClause {
                exception_type: catch.exception_type.clone(),
                local: catch.local.clone(),
                has_filter: catch.filter.is_some(),
            },
            None,
            catch.syntax.clone(),
        )
        .with_children(children)
    }

    fn build_section(&self, section: &BoundSwitchSection, input_type: &Type) -> Operation {
        let mut children: Vec<Operation> =
            section.labels.iter().map(|l| self.build_case_clause(l, input_type)).collect();
        let body = Operation::new(OperationKind::Block { locals: Vec::new() }, None, section.syntax.clone())
            .implicit()
            .with_children(section.statements.iter().map(|s| self.build_statement(s)).collect());
        children.push(body);
        Operation::new(OperationKind::SwitchCase, None, section.syntax.clone()).with_children(children)
    }

    pub fn build_case_clause(&self, label: &BoundCaseLabel, input_type: &Type) -> Operation {
        let (kind, children) = match &label.kind {
            BoundCaseLabelKind::Value(value) => (CaseClauseKind::SingleValue, vec![self.build_expression(value)]),
            BoundCaseLabelKind::Pattern { pattern, guard } => {
                let mut children = vec![self.build_pattern(pattern, input_type).operation];
                children.extend(guard.as_ref().map(|g| self.build_expression(g)));
                (CaseClauseKind::Pattern { has_guard: guard.is_some() }, children)
            }
            BoundCaseLabelKind::Default => (CaseClauseKind::Default, Vec::new()),
        };
        Operation::new(OperationKind::CaseClause { label: label.label.clone(), kind }, None, label.syntax.clone())
            .with_children(children)
    }
}

fn initializer(kind: OperationKind, value: Operation) -> Operation {
    let syntax = Syntax::text(format!("= {}", value.syntax.text));
    Operation::new(kind, None, syntax).with_child(value)
}

fn branch(kind: BranchKind, label: Option<opflow_bound::LabelSymbol>, syntax: Syntax) -> Operation {
    Operation::new(OperationKind::Branch { kind, label }, None, syntax)
}

/// Wraps a pattern in an implicit `not`.
pub fn negate(pattern: Operation, input_type: &Type) -> Operation {
    let info = PatternInfo {
        input_type: input_type.clone(),
        narrowed_type: input_type.clone(),
        kind: PatternKind::Negated,
    };
    let syntax = pattern.syntax.clone();
    Operation::new(OperationKind::Pattern(info), None, syntax).implicit().with_child(pattern)
}

pub fn unary_operator_kind(op: UnaryOp) -> UnaryOperatorKind {
    match op {
        UnaryOp::Plus => UnaryOperatorKind::Plus,
        UnaryOp::Minus => UnaryOperatorKind::Minus,
        UnaryOp::Not => UnaryOperatorKind::Not,
        UnaryOp::BitwiseNot => UnaryOperatorKind::BitwiseNegation,
    }
}

pub fn binary_operator_kind(op: BinaryOp) -> BinaryOperatorKind {
    match op {
        BinaryOp::Add => BinaryOperatorKind::Add,
        BinaryOp::Subtract => BinaryOperatorKind::Subtract,
        BinaryOp::Multiply => BinaryOperatorKind::Multiply,
        BinaryOp::Divide => BinaryOperatorKind::Divide,
        BinaryOp::Remainder => BinaryOperatorKind::Remainder,
        BinaryOp::LeftShift => BinaryOperatorKind::LeftShift,
        BinaryOp::RightShift => BinaryOperatorKind::RightShift,
        BinaryOp::And => BinaryOperatorKind::And,
        BinaryOp::Or => BinaryOperatorKind::Or,
        BinaryOp::ExclusiveOr => BinaryOperatorKind::ExclusiveOr,
        BinaryOp::Equals => BinaryOperatorKind::Equals,
        BinaryOp::NotEquals => BinaryOperatorKind::NotEquals,
        BinaryOp::LessThan => BinaryOperatorKind::LessThan,
        BinaryOp::LessThanOrEqual => BinaryOperatorKind::LessThanOrEqual,
        BinaryOp::GreaterThan => BinaryOperatorKind::GreaterThan,
        BinaryOp::GreaterThanOrEqual => BinaryOperatorKind::GreaterThanOrEqual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_bound::{ConstValue, MethodSymbol, SymbolFactory};

    #[test]
    fn folds_constant_operators() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let expr = BoundExpr::binary(BinaryOp::Add, BoundExpr::int(2), BoundExpr::int(3), Type::Int32);
        let op = builder.build_expression(&expr);
        assert_eq!(op.constant, Some(ConstValue::Int32(5)));
        assert_eq!(op.children.len(), 2);
    }

    #[test]
    fn folding_can_be_disabled() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types).with_constant_folding(false);
        let expr = BoundExpr::and(BoundExpr::bool(true), BoundExpr::bool(false));
        let op = builder.build_expression(&expr);
        assert_eq!(op.constant, None);
        assert_eq!(op.children[0].constant, Some(ConstValue::Bool(true)));
    }

    #[test]
    fn logical_operators_become_conditional_binaries() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let op = builder.build_expression(&BoundExpr::or(BoundExpr::bool(false), BoundExpr::bool(true)));
        assert!(matches!(
            op.kind,
            OperationKind::Binary { op: BinaryOperatorKind::ConditionalOr, method: None }
        ));
        assert_eq!(op.constant_bool(), Some(true));
    }

    #[test]
    fn omitted_arguments_use_defaults() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let method = MethodSymbol::new(
            Type::Object,
            "M",
            vec![
                ParameterSymbol::new(0, "a", Type::Int32),
                ParameterSymbol::new(1, "b", Type::Int32).with_default(ConstValue::Int32(7)),
            ],
            Type::Void,
        );
        let call = BoundExpr::call(None, &method, vec![BoundExpr::int(1)]);
        let op = builder.build_expression(&call);
        assert_eq!(op.children.len(), 2);
        assert!(!op.children[0].is_implicit());
        let filled = &op.children[1];
        assert!(filled.is_implicit());
        assert_eq!(filled.children[0].constant, Some(ConstValue::Int32(7)));
    }

    #[test]
    fn implicit_nullable_conversion_is_not_constant() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let expr = BoundExpr::implicit_conversion(BoundExpr::int(1), Type::nullable(Type::Int32));
        let op = builder.build_expression(&expr);
        assert!(op.is_implicit());
        assert_eq!(op.constant, None);
    }

    #[test]
    fn negated_is_pattern_wraps_pattern() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let mut symbols = SymbolFactory::new();
        let o = symbols.local("o", Type::Object);
        let expr = BoundExpr::is_not_pattern(BoundExpr::local(&o), BoundPattern::type_pattern(Type::String));
        let op = builder.build_expression(&expr);
        let pattern = &op.children[1];
        assert_eq!(pattern.kind.name(), "NegatedPattern");
        assert!(pattern.is_implicit());
        assert_eq!(pattern.children[0].kind.name(), "TypePattern");
    }

    #[test]
    fn field_initializer_body() {
        let mut types = TypeTable::new();
        let c = types.define("C", opflow_bound::TypeDefKind::Class);
        let field = types.add_field(c, "F", Type::Int32);
        let builder = OperationTreeBuilder::new(&types);
        let body = BoundBody::initializer(BodyKind::FieldInitializer(field), BoundExpr::int(4));
        let op = builder.build_body(&body);
        assert_eq!(op.kind.name(), "FieldInitializer");
        assert_eq!(op.syntax.text, "= 4");
    }

    #[test]
    fn invalid_expression_keeps_children() {
        let types = TypeTable::new();
        let builder = OperationTreeBuilder::new(&types);
        let expr = BoundExpr::invalid(vec![BoundExpr::int(1)], "M(1)");
        let op = builder.build_expression(&expr);
        assert!(op.is_invalid());
        assert_eq!(op.children.len(), 1);
        assert!(!op.children[0].is_invalid());
    }
}
