// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Operation nodes: one typed record per semantic construct.
//!
//! Child layouts are positional and documented per kind; optional children
//! are signalled by a flag on the kind (`has_instance`, `has_filter`, ...)
//! rather than by placeholder nodes.

use std::fmt;

use opflow_bound::{
    ConstValue, FieldSymbol, LabelSymbol, LocalSymbol, MethodSymbol, ParameterSymbol,
    PropertySymbol, Syntax, Type,
};

use crate::pattern::PatternInfo;

/// Identity of a flow capture within one graph. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureId(pub u32);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperationFlags {
    /// Synthesized; has no syntax of its own.
    pub implicit: bool,
    /// The node or one of its descendants is erroneous.
    pub invalid: bool,
    /// Operator applied over nullable operands.
    pub lifted: bool,
    /// Overflow-checked arithmetic or conversion.
    pub checked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOperatorKind {
    Plus,
    Minus,
    Not,
    BitwiseNegation,
    /// `operator true`
    True,
    /// `operator false`
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    LeftShift,
    RightShift,
    And,
    Or,
    ExclusiveOr,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ConditionalAnd,
    ConditionalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopKind {
    While,
    DoWhile,
    For { has_condition: bool },
    ForEach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchKind {
    Break,
    Continue,
    GoTo,
    GotoCase,
    GotoDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaseClauseKind {
    SingleValue,
    Pattern { has_guard: bool },
    Default,
}

/// The closed set of operation kinds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperationKind {
    // -- statements --
    /// children: statements
    Block { locals: Vec<LocalSymbol> },
    /// children: [initializer?]
    VariableDeclaration { local: LocalSymbol },
    /// children: [expression]
    ExpressionStatement,
    /// `if` statement (no type) or `?:` expression.
    /// children: [condition, when_true, when_false?]
    Conditional { has_else: bool },
    /// While/DoWhile: [condition, body].
    /// For: [before (Block), condition?, increments (Block), body].
    /// ForEach: [collection, body]; the iteration variable is the only local.
    Loop { kind: LoopKind, locals: Vec<LocalSymbol> },
    /// children: [statement]
    Labeled { label: LabelSymbol },
    /// GotoCase: [value]; everything else has no children.
    Branch { kind: BranchKind, label: Option<LabelSymbol> },
    /// children: [value?]
    Return,
    /// children: [body, catch clauses..., finally?]
    Try { has_finally: bool },
    /// children: [filter?, handler]
    CatchClause { exception_type: Type, local: Option<LocalSymbol>, has_filter: bool },
    /// children: [value, cases...]
    Switch { locals: Vec<LocalSymbol> },
    /// children: [resource (VariableDeclaration or value), body]
    Using { locals: Vec<LocalSymbol> },
    /// children: [value, body]
    Lock,
    /// children: [clauses..., body (Block)]
    SwitchCase,
    /// SingleValue: [value]; Pattern: [pattern, guard?]; Default: none.
    CaseClause { label: LabelSymbol, kind: CaseClauseKind },
    Empty,

    // -- expressions --
    Literal,
    DefaultValue,
    LocalReference { local: LocalSymbol, is_declaration: bool },
    ParameterReference { parameter: ParameterSymbol },
    InstanceReference,
    /// children: [instance?]
    FieldReference { field: FieldSymbol, has_instance: bool },
    /// children: [instance?, arguments...]
    PropertyReference { property: PropertySymbol, has_instance: bool },
    /// children: [instance?, arguments...]
    Invocation { method: MethodSymbol, has_instance: bool },
    /// children: [value]
    Argument { parameter: Option<ParameterSymbol> },
    /// children: arguments
    ObjectCreation { constructor: Option<MethodSymbol> },
    /// children: elements
    Tuple,
    /// children: [operand]
    Conversion,
    /// children: [operand]
    Unary { op: UnaryOperatorKind, method: Option<MethodSymbol> },
    /// children: [left, right]
    Binary { op: BinaryOperatorKind, method: Option<MethodSymbol> },
    /// children: [target, value]
    SimpleAssignment,
    /// children: [target, value]
    CompoundAssignment { op: BinaryOperatorKind, method: Option<MethodSymbol> },
    /// children: [value, when_null]
    Coalesce,
    /// children: [receiver, when_not_null]
    ConditionalAccess,
    /// Stands for the receiver inside a conditional access.
    ConditionalAccessInstance,
    /// children: [value, pattern]
    IsPattern,
    /// A pattern node; layout depends on the pattern kind.
    Pattern(PatternInfo),
    /// children: [member, pattern]
    PropertySubpattern,
    /// children: [value, arms...]
    SwitchExpression,
    /// children: [pattern, guard?, value]
    SwitchExpressionArm { locals: Vec<LocalSymbol>, has_guard: bool },
    /// children: [exception?]; rethrow has none
    Throw,
    /// children: [value]
    FieldInitializer { field: FieldSymbol },
    /// children: [value]
    PropertyInitializer { property: PropertySymbol },
    /// children: [value]
    ParameterInitializer { parameter: ParameterSymbol },

    // -- flow graph only --
    /// children: [value]
    FlowCapture { id: CaptureId },
    FlowCaptureReference { id: CaptureId },
    /// children: [operand]
    IsNull,
    CaughtException,
    /// Tests whether a `static` local still needs its initializer run.
    StaticLocalInitializationSemaphore { local: LocalSymbol },

    /// Erroneous construct; children are whatever could be recovered.
    Invalid,
}

impl OperationKind {
    /// Stable kind name used by renderers.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Block { .. } => "Block",
            OperationKind::VariableDeclaration { .. } => "VariableDeclaration",
            OperationKind::ExpressionStatement => "ExpressionStatement",
            OperationKind::Conditional { .. } => "Conditional",
            OperationKind::Loop { .. } => "Loop",
            OperationKind::Labeled { .. } => "Labeled",
            OperationKind::Branch { .. } => "Branch",
            OperationKind::Return => "Return",
            OperationKind::Try { .. } => "Try",
            OperationKind::CatchClause { .. } => "CatchClause",
            OperationKind::Switch { .. } => "Switch",
            OperationKind::Using { .. } => "Using",
            OperationKind::Lock => "Lock",
            OperationKind::SwitchCase => "SwitchCase",
            OperationKind::CaseClause { .. } => "CaseClause",
            OperationKind::Empty => "Empty",
            OperationKind::Literal => "Literal",
            OperationKind::DefaultValue => "DefaultValue",
            OperationKind::LocalReference { .. } => "LocalReference",
            OperationKind::ParameterReference { .. } => "ParameterReference",
            OperationKind::InstanceReference => "InstanceReference",
            OperationKind::FieldReference { .. } => "FieldReference",
            OperationKind::PropertyReference { .. } => "PropertyReference",
            OperationKind::Invocation { .. } => "Invocation",
            OperationKind::Argument { .. } => "Argument",
            OperationKind::ObjectCreation { .. } => "ObjectCreation",
            OperationKind::Tuple => "Tuple",
            OperationKind::Conversion => "Conversion",
            OperationKind::Unary { .. } => "Unary",
            OperationKind::Binary { .. } => "Binary",
            OperationKind::SimpleAssignment => "SimpleAssignment",
            OperationKind::CompoundAssignment { .. } => "CompoundAssignment",
            OperationKind::Coalesce => "Coalesce",
            OperationKind::ConditionalAccess => "ConditionalAccess",
            OperationKind::ConditionalAccessInstance => "ConditionalAccessInstance",
            OperationKind::IsPattern => "IsPattern",
            OperationKind::Pattern(info) => info.kind.name(),
            OperationKind::PropertySubpattern => "PropertySubpattern",
            OperationKind::SwitchExpression => "SwitchExpression",
            OperationKind::SwitchExpressionArm { .. } => "SwitchExpressionArm",
            OperationKind::Throw => "Throw",
            OperationKind::FieldInitializer { .. } => "FieldInitializer",
            OperationKind::PropertyInitializer { .. } => "PropertyInitializer",
            OperationKind::ParameterInitializer { .. } => "ParameterInitializer",
            OperationKind::FlowCapture { .. } => "FlowCapture",
            OperationKind::FlowCaptureReference { .. } => "FlowCaptureReference",
            OperationKind::IsNull => "IsNull",
            OperationKind::CaughtException => "CaughtException",
            OperationKind::StaticLocalInitializationSemaphore { .. } => {
                "StaticLocalInitializationSemaphore"
            }
            OperationKind::Invalid => "Invalid",
        }
    }
}

/// An immutable operation node. Owns its children.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    pub kind: OperationKind,
    pub ty: Option<Type>,
    pub constant: Option<ConstValue>,
    pub flags: OperationFlags,
    pub syntax: Syntax,
    pub children: Vec<Operation>,
}

impl Operation {
    pub fn new(kind: OperationKind, ty: Option<Type>, syntax: Syntax) -> Self {
        let invalid = matches!(kind, OperationKind::Invalid) || ty.as_ref().is_some_and(Type::is_error);
        Operation {
            kind,
            ty,
            constant: None,
            flags: OperationFlags { invalid, ..OperationFlags::default() },
            syntax,
            children: Vec::new(),
        }
    }

    /// Attaches children; an invalid child makes the parent invalid.
    pub fn with_children(mut self, children: Vec<Operation>) -> Self {
        if children.iter().any(Operation::is_invalid) {
            self.flags.invalid = true;
        }
        self.children = children;
        self
    }

    pub fn with_child(self, child: Operation) -> Self {
        self.with_children(vec![child])
    }

    pub fn with_constant(mut self, constant: Option<ConstValue>) -> Self {
        self.constant = constant;
        self
    }

    pub fn implicit(mut self) -> Self {
        self.flags.implicit = true;
        self
    }

    pub fn set_implicit(mut self, implicit: bool) -> Self {
        self.flags.implicit = implicit;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.flags.invalid = true;
        self
    }

    pub fn lifted(mut self, lifted: bool) -> Self {
        self.flags.lifted = lifted;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.flags.checked = checked;
        self
    }

    // =================================================================
    // Common shapes
    // =================================================================

    pub fn literal(value: ConstValue, ty: Option<Type>, syntax: Syntax) -> Self {
        Operation::new(OperationKind::Literal, ty, syntax).with_constant(Some(value))
    }

    pub fn flow_capture(id: CaptureId, value: Operation) -> Self {
        let syntax = value.syntax.clone();
        Operation::new(OperationKind::FlowCapture { id }, None, syntax)
            .implicit()
            .with_child(value)
    }

    pub fn flow_capture_reference(id: CaptureId, ty: Option<Type>, syntax: Syntax) -> Self {
        Operation::new(OperationKind::FlowCaptureReference { id }, ty, syntax).implicit()
    }

    pub fn is_null(operand: Operation) -> Self {
        let syntax = operand.syntax.clone();
        Operation::new(OperationKind::IsNull, Some(Type::Bool), syntax)
            .implicit()
            .with_child(operand)
    }

    pub fn expression_statement(expression: Operation, syntax: Syntax) -> Self {
        Operation::new(OperationKind::ExpressionStatement, None, syntax).with_child(expression)
    }

    /// Implicit conversion sharing the operand's syntax.
    pub fn implicit_conversion(operand: Operation, ty: Type) -> Self {
        let syntax = operand.syntax.clone();
        Operation::new(OperationKind::Conversion, Some(ty), syntax)
            .implicit()
            .with_child(operand)
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn is_invalid(&self) -> bool {
        self.flags.invalid
    }

    pub fn is_implicit(&self) -> bool {
        self.flags.implicit
    }

    pub fn is_lifted(&self) -> bool {
        self.flags.lifted
    }

    pub fn child(&self, index: usize) -> Option<&Operation> {
        self.children.get(index)
    }

    /// The constant boolean value, if this is a constant `bool`.
    pub fn constant_bool(&self) -> Option<bool> {
        self.constant.as_ref().and_then(ConstValue::as_bool)
    }

    pub fn capture_id(&self) -> Option<CaptureId> {
        match self.kind {
            OperationKind::FlowCapture { id } | OperationKind::FlowCaptureReference { id } => Some(id),
            _ => None,
        }
    }

    /// Pre-order walk over this node and its descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Operation>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Operation;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_child_taints_parent() {
        let bad = Operation::new(OperationKind::Invalid, None, Syntax::text("?"));
        let parent = Operation::expression_statement(bad, Syntax::text("?;"));
        assert!(parent.is_invalid());
    }

    #[test]
    fn descendants_are_preorder() {
        let a = Operation::literal(ConstValue::Int32(1), Some(Type::Int32), Syntax::text("1"));
        let b = Operation::literal(ConstValue::Int32(2), Some(Type::Int32), Syntax::text("2"));
        let add = Operation::new(
            OperationKind::Binary { op: BinaryOperatorKind::Add, method: None },
            Some(Type::Int32),
            Syntax::text("1 + 2"),
        )
        .with_children(vec![a, b]);
        let texts: Vec<&str> = add.descendants().map(|op| op.syntax.text.as_str()).collect();
        assert_eq!(texts, vec!["1 + 2", "1", "2"]);
    }

    #[test]
    fn capture_shapes_are_implicit() {
        let value = Operation::literal(ConstValue::Bool(true), Some(Type::Bool), Syntax::text("true"));
        let capture = Operation::flow_capture(CaptureId(3), value);
        assert!(capture.is_implicit());
        assert_eq!(capture.capture_id(), Some(CaptureId(3)));
        assert_eq!(capture.syntax.text, "true");
    }
}
