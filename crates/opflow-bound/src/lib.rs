// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bound tree types consumed by the operation and flow-graph builders.
//!
//! A bound tree is the output of an external binder/type checker: every
//! expression carries its semantic type, every name has been resolved to a
//! symbol, and implicit conversions are explicit nodes. Nothing in this crate
//! performs binding; it only describes the shape handed to the lowering
//! passes, plus the `TypeTable` they consult for member lookup.

pub mod body;
pub mod constant;
pub mod expr;
pub mod pattern;
pub mod span;
pub mod stmt;
pub mod symbols;
pub mod types;

pub use body::{BodyKind, BoundBody, BoundRoot};
pub use constant::ConstValue;
pub use expr::{
    BinaryOp, BoundExpr, BoundExprKind, BoundSwitchArm, LogicalOp, UnaryOp, UserDefinedLogical,
};
pub use pattern::{BoundPattern, BoundPatternKind, BoundPropertySubpattern, RelationalOp};
pub use span::{Span, Syntax};
pub use stmt::{
    BoundCaseLabel, BoundCaseLabelKind, BoundCatch, BoundStmt, BoundStmtKind, BoundSwitchSection,
    BoundUsingResource,
};
pub use symbols::{
    FieldSymbol, LabelId, LabelSymbol, LocalId, LocalSymbol, MemberSymbol, MethodKind,
    MethodSymbol, ParameterSymbol, PropertySymbol, SymbolFactory,
};
pub use types::{
    Deconstruction, ForEachEnumerator, NamedType, TupleElement, Type, TypeDef, TypeDefKind, TypeId,
    TypeTable, WellKnownMethod, WellKnownType,
};
