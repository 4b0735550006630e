// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The unit handed to the lowering passes: one analyzable body.

use crate::expr::BoundExpr;
use crate::stmt::BoundStmt;
use crate::symbols::{FieldSymbol, ParameterSymbol, PropertySymbol};

/// What kind of code a body holds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyKind {
    Method,
    FieldInitializer(FieldSymbol),
    PropertyInitializer(PropertySymbol),
    /// Default value of an optional parameter
    ParameterInitializer(ParameterSymbol),
    AttributeArgument,
    /// `: base(...)` / `: this(...)`
    ConstructorInitializer,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundRoot {
    Statement(BoundStmt),
    Expression(BoundExpr),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundBody {
    pub kind: BodyKind,
    pub root: BoundRoot,
}

impl BoundBody {
    pub fn method(body: BoundStmt) -> Self {
        BoundBody { kind: BodyKind::Method, root: BoundRoot::Statement(body) }
    }

    pub fn initializer(kind: BodyKind, value: BoundExpr) -> Self {
        BoundBody { kind, root: BoundRoot::Expression(value) }
    }
}
