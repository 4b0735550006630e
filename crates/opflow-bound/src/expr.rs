// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bound expression nodes.

use crate::constant::ConstValue;
use crate::pattern::BoundPattern;
use crate::span::Syntax;
use crate::symbols::{FieldSymbol, LocalSymbol, MethodSymbol, ParameterSymbol, PropertySymbol};
use crate::types::Type;

/// A type-checked expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub ty: Type,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundExprKind {
    Literal(ConstValue),
    /// `default` / `default(T)`
    DefaultValue,
    Local(LocalSymbol),
    Parameter(ParameterSymbol),
    This,
    Field {
        receiver: Option<Box<BoundExpr>>,
        field: FieldSymbol,
    },
    /// Property or indexer access.
    Property {
        receiver: Option<Box<BoundExpr>>,
        property: PropertySymbol,
        arguments: Vec<BoundExpr>,
    },
    /// Method call. Omitted trailing arguments are filled from parameter
    /// defaults during lowering.
    Call {
        receiver: Option<Box<BoundExpr>>,
        method: MethodSymbol,
        arguments: Vec<BoundExpr>,
    },
    ObjectCreation {
        constructor: Option<MethodSymbol>,
        arguments: Vec<BoundExpr>,
    },
    Tuple(Vec<BoundExpr>),
    Conversion {
        operand: Box<BoundExpr>,
        implicit: bool,
        checked: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<BoundExpr>,
        method: Option<MethodSymbol>,
        lifted: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
        method: Option<MethodSymbol>,
        lifted: bool,
    },
    /// Short-circuiting `&&` / `||`.
    Logical {
        op: LogicalOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
        user_defined: Option<UserDefinedLogical>,
    },
    Assignment {
        target: Box<BoundExpr>,
        value: Box<BoundExpr>,
    },
    CompoundAssignment {
        op: BinaryOp,
        target: Box<BoundExpr>,
        value: Box<BoundExpr>,
        method: Option<MethodSymbol>,
        lifted: bool,
    },
    /// `c ? a : b`
    Conditional {
        condition: Box<BoundExpr>,
        when_true: Box<BoundExpr>,
        when_false: Box<BoundExpr>,
    },
    /// `a ?? b`
    Coalesce {
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    /// `receiver?.access`, where `access` refers to the receiver through a
    /// `ConditionalReceiver` placeholder.
    ConditionalAccess {
        receiver: Box<BoundExpr>,
        access: Box<BoundExpr>,
    },
    ConditionalReceiver,
    IsPattern {
        operand: Box<BoundExpr>,
        pattern: Box<BoundPattern>,
        negated: bool,
    },
    Switch {
        governing: Box<BoundExpr>,
        arms: Vec<BoundSwitchArm>,
    },
    /// `throw e` in expression position.
    Throw(Box<BoundExpr>),
    /// Erroneous expression with whatever children could be bound.
    Invalid(Vec<BoundExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Plus,
    Minus,
    /// Logical `!`
    Not,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    LeftShift,
    RightShift,
    /// Non-short-circuiting `&`
    And,
    /// Non-short-circuiting `|`
    Or,
    ExclusiveOr,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equals | BinaryOp::NotEquals)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOp {
    And,
    Or,
}

/// Operators backing a user-defined `&&`/`||`: `op_BitwiseAnd` or
/// `op_BitwiseOr`, plus `op_False` (for `&&`) or `op_True` (for `||`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserDefinedLogical {
    pub operator: MethodSymbol,
    pub short_circuit_test: MethodSymbol,
}

/// One `pattern when guard => value` arm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundSwitchArm {
    pub locals: Vec<LocalSymbol>,
    pub pattern: BoundPattern,
    pub guard: Option<BoundExpr>,
    pub value: BoundExpr,
    pub syntax: Syntax,
}

impl BoundSwitchArm {
    pub fn new(locals: Vec<LocalSymbol>, pattern: BoundPattern, guard: Option<BoundExpr>, value: BoundExpr) -> Self {
        let mut text = pattern.syntax.text.clone();
        if let Some(guard) = &guard {
            text = format!("{} when {}", text, guard.syntax.text);
        }
        let syntax = Syntax::text(format!("{} => {}", text, value.syntax.text));
        BoundSwitchArm { locals, pattern, guard, value, syntax }
    }
}

// =================================================================
// Construction helpers
// =================================================================

impl BoundExpr {
    pub fn new(kind: BoundExprKind, ty: Type, syntax: Syntax) -> Self {
        BoundExpr { kind, ty, syntax }
    }

    pub fn with_syntax(mut self, text: impl Into<String>) -> Self {
        self.syntax = Syntax::text(text);
        self
    }

    pub fn literal(value: ConstValue) -> Self {
        let ty = value.natural_type().unwrap_or(Type::Object);
        let text = match &value {
            ConstValue::Bool(b) => b.to_string(),
            ConstValue::Char(c) => format!("'{}'", c),
            other => other.to_string(),
        };
        BoundExpr::new(BoundExprKind::Literal(value), ty, Syntax::text(text))
    }

    pub fn int(value: i32) -> Self {
        Self::literal(ConstValue::Int32(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(ConstValue::Bool(value))
    }

    pub fn string(value: &str) -> Self {
        Self::literal(ConstValue::String(value.to_string()))
    }

    pub fn null(ty: Type) -> Self {
        BoundExpr::new(BoundExprKind::Literal(ConstValue::Null), ty, Syntax::text("null"))
    }

    pub fn default_value(ty: Type) -> Self {
        BoundExpr::new(BoundExprKind::DefaultValue, ty, Syntax::text("default"))
    }

    pub fn local(local: &LocalSymbol) -> Self {
        BoundExpr::new(
            BoundExprKind::Local(local.clone()),
            local.ty.clone(),
            Syntax::text(local.name.clone()),
        )
    }

    pub fn parameter(parameter: &ParameterSymbol) -> Self {
        BoundExpr::new(
            BoundExprKind::Parameter(parameter.clone()),
            parameter.ty.clone(),
            Syntax::text(parameter.name.clone()),
        )
    }

    pub fn this(ty: Type) -> Self {
        BoundExpr::new(BoundExprKind::This, ty, Syntax::text("this"))
    }

    pub fn field(receiver: Option<BoundExpr>, field: &FieldSymbol) -> Self {
        let text = member_text(receiver.as_ref(), &field.name);
        BoundExpr::new(
            BoundExprKind::Field { receiver: receiver.map(Box::new), field: field.clone() },
            field.ty.clone(),
            Syntax::text(text),
        )
    }

    pub fn property(receiver: Option<BoundExpr>, property: &PropertySymbol) -> Self {
        let text = member_text(receiver.as_ref(), &property.name);
        BoundExpr::new(
            BoundExprKind::Property {
                receiver: receiver.map(Box::new),
                property: property.clone(),
                arguments: Vec::new(),
            },
            property.ty.clone(),
            Syntax::text(text),
        )
    }

    pub fn call(receiver: Option<BoundExpr>, method: &MethodSymbol, arguments: Vec<BoundExpr>) -> Self {
        let args: Vec<&str> = arguments.iter().map(|a| a.syntax.text.as_str()).collect();
        let text = format!("{}({})", member_text(receiver.as_ref(), &method.name), args.join(", "));
        BoundExpr::new(
            BoundExprKind::Call { receiver: receiver.map(Box::new), method: method.clone(), arguments },
            method.return_type.clone(),
            Syntax::text(text),
        )
    }

    pub fn object_creation(ty: Type, constructor: Option<MethodSymbol>, arguments: Vec<BoundExpr>) -> Self {
        let args: Vec<&str> = arguments.iter().map(|a| a.syntax.text.as_str()).collect();
        let text = format!("new {}({})", ty, args.join(", "));
        BoundExpr::new(BoundExprKind::ObjectCreation { constructor, arguments }, ty, Syntax::text(text))
    }

    pub fn tuple(elements: Vec<BoundExpr>) -> Self {
        let ty = Type::tuple(elements.iter().map(|e| e.ty.clone()));
        let texts: Vec<&str> = elements.iter().map(|e| e.syntax.text.as_str()).collect();
        let text = format!("({})", texts.join(", "));
        BoundExpr::new(BoundExprKind::Tuple(elements), ty, Syntax::text(text))
    }

    /// Implicit conversion; shares the operand's syntax.
    pub fn implicit_conversion(operand: BoundExpr, ty: Type) -> Self {
        let syntax = operand.syntax.clone();
        BoundExpr::new(
            BoundExprKind::Conversion { operand: Box::new(operand), implicit: true, checked: false },
            ty,
            syntax,
        )
    }

    pub fn cast(operand: BoundExpr, ty: Type) -> Self {
        let text = format!("({}){}", ty, operand.syntax.text);
        BoundExpr::new(
            BoundExprKind::Conversion { operand: Box::new(operand), implicit: false, checked: false },
            ty,
            Syntax::text(text),
        )
    }

    pub fn unary(op: UnaryOp, operand: BoundExpr, ty: Type) -> Self {
        let symbol = match op {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitwiseNot => "~",
        };
        let text = format!("{}{}", symbol, operand.syntax.text);
        let lifted = operand.ty.is_nullable();
        BoundExpr::new(
            BoundExprKind::Unary { op, operand: Box::new(operand), method: None, lifted },
            ty,
            Syntax::text(text),
        )
    }

    pub fn not(operand: BoundExpr) -> Self {
        let ty = operand.ty.clone();
        Self::unary(UnaryOp::Not, operand, ty)
    }

    /// Built-in binary operator. Lifted when either operand is nullable.
    pub fn binary(op: BinaryOp, left: BoundExpr, right: BoundExpr, ty: Type) -> Self {
        let text = format!("{} {} {}", left.syntax.text, op.symbol(), right.syntax.text);
        let lifted = left.ty.is_nullable() || right.ty.is_nullable();
        BoundExpr::new(
            BoundExprKind::Binary { op, left: Box::new(left), right: Box::new(right), method: None, lifted },
            ty,
            Syntax::text(text),
        )
    }

    pub fn user_defined_binary(op: BinaryOp, left: BoundExpr, right: BoundExpr, method: &MethodSymbol) -> Self {
        let text = format!("{} {} {}", left.syntax.text, op.symbol(), right.syntax.text);
        BoundExpr::new(
            BoundExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                method: Some(method.clone()),
                lifted: false,
            },
            method.return_type.clone(),
            Syntax::text(text),
        )
    }

    pub fn logical(op: LogicalOp, left: BoundExpr, right: BoundExpr) -> Self {
        let symbol = match op {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        };
        let text = format!("{} {} {}", left.syntax.text, symbol, right.syntax.text);
        BoundExpr::new(
            BoundExprKind::Logical { op, left: Box::new(left), right: Box::new(right), user_defined: None },
            Type::Bool,
            Syntax::text(text),
        )
    }

    pub fn and(left: BoundExpr, right: BoundExpr) -> Self {
        Self::logical(LogicalOp::And, left, right)
    }

    pub fn or(left: BoundExpr, right: BoundExpr) -> Self {
        Self::logical(LogicalOp::Or, left, right)
    }

    /// `&&`/`||` over a type with `operator true`/`operator false`.
    pub fn user_defined_logical(op: LogicalOp, left: BoundExpr, right: BoundExpr, operators: UserDefinedLogical) -> Self {
        let ty = operators.operator.return_type.clone();
        let mut expr = Self::logical(op, left, right);
        expr.ty = ty;
        if let BoundExprKind::Logical { user_defined, .. } = &mut expr.kind {
            *user_defined = Some(operators);
        }
        expr
    }

    pub fn assign(target: BoundExpr, value: BoundExpr) -> Self {
        let text = format!("{} = {}", target.syntax.text, value.syntax.text);
        let ty = target.ty.clone();
        BoundExpr::new(
            BoundExprKind::Assignment { target: Box::new(target), value: Box::new(value) },
            ty,
            Syntax::text(text),
        )
    }

    pub fn compound_assign(op: BinaryOp, target: BoundExpr, value: BoundExpr) -> Self {
        let text = format!("{} {}= {}", target.syntax.text, op.symbol(), value.syntax.text);
        let ty = target.ty.clone();
        let lifted = ty.is_nullable() || value.ty.is_nullable();
        BoundExpr::new(
            BoundExprKind::CompoundAssignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
                method: None,
                lifted,
            },
            ty,
            Syntax::text(text),
        )
    }

    pub fn conditional(condition: BoundExpr, when_true: BoundExpr, when_false: BoundExpr, ty: Type) -> Self {
        let text = format!(
            "{} ? {} : {}",
            condition.syntax.text, when_true.syntax.text, when_false.syntax.text
        );
        BoundExpr::new(
            BoundExprKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            },
            ty,
            Syntax::text(text),
        )
    }

    pub fn coalesce(left: BoundExpr, right: BoundExpr, ty: Type) -> Self {
        let text = format!("{} ?? {}", left.syntax.text, right.syntax.text);
        BoundExpr::new(
            BoundExprKind::Coalesce { left: Box::new(left), right: Box::new(right) },
            ty,
            Syntax::text(text),
        )
    }

    /// Placeholder standing for the receiver inside a conditional access.
    pub fn conditional_receiver(ty: Type) -> Self {
        BoundExpr::new(BoundExprKind::ConditionalReceiver, ty, Syntax::none())
    }

    /// `receiver?.access`. The `access` text should start at the `.`.
    pub fn conditional_access(receiver: BoundExpr, access: BoundExpr, ty: Type) -> Self {
        let text = format!("{}?{}", receiver.syntax.text, access.syntax.text);
        BoundExpr::new(
            BoundExprKind::ConditionalAccess { receiver: Box::new(receiver), access: Box::new(access) },
            ty,
            Syntax::text(text),
        )
    }

    pub fn is_pattern(operand: BoundExpr, pattern: BoundPattern) -> Self {
        let text = format!("{} is {}", operand.syntax.text, pattern.syntax.text);
        BoundExpr::new(
            BoundExprKind::IsPattern {
                operand: Box::new(operand),
                pattern: Box::new(pattern),
                negated: false,
            },
            Type::Bool,
            Syntax::text(text),
        )
    }

    pub fn is_not_pattern(operand: BoundExpr, pattern: BoundPattern) -> Self {
        let text = format!("{} is not {}", operand.syntax.text, pattern.syntax.text);
        BoundExpr::new(
            BoundExprKind::IsPattern {
                operand: Box::new(operand),
                pattern: Box::new(pattern),
                negated: true,
            },
            Type::Bool,
            Syntax::text(text),
        )
    }

    pub fn switch(governing: BoundExpr, arms: Vec<BoundSwitchArm>, ty: Type) -> Self {
        let arm_texts: Vec<&str> = arms.iter().map(|a| a.syntax.text.as_str()).collect();
        let text = format!("{} switch {{ {} }}", governing.syntax.text, arm_texts.join(", "));
        BoundExpr::new(
            BoundExprKind::Switch { governing: Box::new(governing), arms },
            ty,
            Syntax::text(text),
        )
    }

    pub fn throw(exception: BoundExpr, ty: Type) -> Self {
        let text = format!("throw {}", exception.syntax.text);
        BoundExpr::new(BoundExprKind::Throw(Box::new(exception)), ty, Syntax::text(text))
    }

    pub fn invalid(children: Vec<BoundExpr>, text: impl Into<String>) -> Self {
        BoundExpr::new(BoundExprKind::Invalid(children), Type::Error, Syntax::text(text))
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn constant(&self) -> Option<&ConstValue> {
        match &self.kind {
            BoundExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Direct subexpressions in evaluation order. Switch arms are not
    /// included; they are visited arm by arm.
    pub fn operands(&self) -> Vec<&BoundExpr> {
        match &self.kind {
            BoundExprKind::Literal(_)
            | BoundExprKind::DefaultValue
            | BoundExprKind::Local(_)
            | BoundExprKind::Parameter(_)
            | BoundExprKind::This
            | BoundExprKind::ConditionalReceiver => Vec::new(),
            BoundExprKind::Field { receiver, .. } => receiver.iter().map(|r| r.as_ref()).collect(),
            BoundExprKind::Property { receiver, arguments, .. }
            | BoundExprKind::Call { receiver, arguments, .. } => receiver
                .iter()
                .map(|r| r.as_ref())
                .chain(arguments.iter())
                .collect(),
            BoundExprKind::ObjectCreation { arguments, .. } => arguments.iter().collect(),
            BoundExprKind::Tuple(elements) => elements.iter().collect(),
            BoundExprKind::Conversion { operand, .. }
            | BoundExprKind::Unary { operand, .. }
            | BoundExprKind::IsPattern { operand, .. } => vec![operand.as_ref()],
            BoundExprKind::Binary { left, right, .. }
            | BoundExprKind::Logical { left, right, .. }
            | BoundExprKind::Coalesce { left, right } => vec![left.as_ref(), right.as_ref()],
            BoundExprKind::Assignment { target, value }
            | BoundExprKind::CompoundAssignment { target, value, .. } => {
                vec![target.as_ref(), value.as_ref()]
            }
            BoundExprKind::Conditional { condition, when_true, when_false } => {
                vec![condition.as_ref(), when_true.as_ref(), when_false.as_ref()]
            }
            BoundExprKind::ConditionalAccess { receiver, access } => {
                vec![receiver.as_ref(), access.as_ref()]
            }
            BoundExprKind::Switch { governing, .. } => vec![governing.as_ref()],
            BoundExprKind::Throw(exception) => vec![exception.as_ref()],
            BoundExprKind::Invalid(children) => children.iter().collect(),
        }
    }
}

fn member_text(receiver: Option<&BoundExpr>, name: &str) -> String {
    match receiver {
        Some(r) if matches!(r.kind, BoundExprKind::ConditionalReceiver) => format!(".{}", name),
        Some(r) => format!("{}.{}", r.syntax.text, name),
        None => name.to_string(),
    }
}
