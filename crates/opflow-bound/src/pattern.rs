// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bound patterns, as they appear in `is` expressions, switch labels and
//! switch expression arms.

use crate::expr::BoundExpr;
use crate::span::Syntax;
use crate::symbols::LocalSymbol;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundPattern {
    pub kind: BoundPatternKind,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelationalOp {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl RelationalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelationalOp::LessThan => "<",
            RelationalOp::LessThanOrEqual => "<=",
            RelationalOp::GreaterThan => ">",
            RelationalOp::GreaterThanOrEqual => ">=",
        }
    }
}

/// `{ Member: pattern }`. The member name is resolved during lowering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundPropertySubpattern {
    pub member: String,
    pub pattern: BoundPattern,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundPatternKind {
    /// `_`
    Discard,
    /// `T x`, `var x` (no declared type) or `T _` (no local)
    Declaration {
        declared_type: Option<Type>,
        local: Option<LocalSymbol>,
    },
    /// Bare type `T`
    Type(Type),
    Constant(BoundExpr),
    Relational {
        op: RelationalOp,
        value: BoundExpr,
    },
    And(Box<BoundPattern>, Box<BoundPattern>),
    Or(Box<BoundPattern>, Box<BoundPattern>),
    Not(Box<BoundPattern>),
    /// `T (a, b) { P: p } x`
    Recursive {
        declared_type: Option<Type>,
        deconstruction: Option<Vec<BoundPattern>>,
        properties: Vec<BoundPropertySubpattern>,
        local: Option<LocalSymbol>,
    },
    /// `[a, .., b] x`
    List {
        elements: Vec<BoundPattern>,
        local: Option<LocalSymbol>,
    },
    /// `..` or `.. p`, only valid directly inside a list pattern
    Slice(Option<Box<BoundPattern>>),
}

impl BoundPattern {
    pub fn new(kind: BoundPatternKind, syntax: Syntax) -> Self {
        BoundPattern { kind, syntax }
    }

    pub fn discard() -> Self {
        Self::new(BoundPatternKind::Discard, Syntax::text("_"))
    }

    pub fn declaration(declared_type: Type, local: &LocalSymbol) -> Self {
        let text = format!("{} {}", declared_type, local.name);
        Self::new(
            BoundPatternKind::Declaration { declared_type: Some(declared_type), local: Some(local.clone()) },
            Syntax::text(text),
        )
    }

    pub fn var(local: &LocalSymbol) -> Self {
        Self::new(
            BoundPatternKind::Declaration { declared_type: None, local: Some(local.clone()) },
            Syntax::text(format!("var {}", local.name)),
        )
    }

    pub fn type_pattern(ty: Type) -> Self {
        let text = ty.to_string();
        Self::new(BoundPatternKind::Type(ty), Syntax::text(text))
    }

    pub fn constant(value: BoundExpr) -> Self {
        let syntax = value.syntax.clone();
        Self::new(BoundPatternKind::Constant(value), syntax)
    }

    pub fn relational(op: RelationalOp, value: BoundExpr) -> Self {
        let text = format!("{} {}", op.symbol(), value.syntax.text);
        Self::new(BoundPatternKind::Relational { op, value }, Syntax::text(text))
    }

    pub fn and(left: BoundPattern, right: BoundPattern) -> Self {
        let text = format!("{} and {}", left.syntax.text, right.syntax.text);
        Self::new(BoundPatternKind::And(Box::new(left), Box::new(right)), Syntax::text(text))
    }

    pub fn or(left: BoundPattern, right: BoundPattern) -> Self {
        let text = format!("{} or {}", left.syntax.text, right.syntax.text);
        Self::new(BoundPatternKind::Or(Box::new(left), Box::new(right)), Syntax::text(text))
    }

    pub fn not(operand: BoundPattern) -> Self {
        let text = format!("not {}", operand.syntax.text);
        Self::new(BoundPatternKind::Not(Box::new(operand)), Syntax::text(text))
    }

    pub fn recursive(
        declared_type: Option<Type>,
        deconstruction: Option<Vec<BoundPattern>>,
        properties: Vec<BoundPropertySubpattern>,
        local: Option<&LocalSymbol>,
    ) -> Self {
        let mut text = declared_type.as_ref().map(|t| t.to_string()).unwrap_or_default();
        if let Some(elements) = &deconstruction {
            let parts: Vec<&str> = elements.iter().map(|p| p.syntax.text.as_str()).collect();
            text.push_str(&format!("({})", parts.join(", ")));
        }
        if !properties.is_empty() || deconstruction.is_none() {
            if !text.is_empty() {
                text.push(' ');
            }
            let parts: Vec<&str> = properties.iter().map(|p| p.syntax.text.as_str()).collect();
            text.push_str(&format!("{{ {} }}", parts.join(", ")));
        }
        if let Some(local) = local {
            text.push_str(&format!(" {}", local.name));
        }
        Self::new(
            BoundPatternKind::Recursive { declared_type, deconstruction, properties, local: local.cloned() },
            Syntax::text(text),
        )
    }

    pub fn list(elements: Vec<BoundPattern>, local: Option<&LocalSymbol>) -> Self {
        let parts: Vec<&str> = elements.iter().map(|p| p.syntax.text.as_str()).collect();
        let mut text = format!("[{}]", parts.join(", "));
        if let Some(local) = local {
            text.push_str(&format!(" {}", local.name));
        }
        Self::new(BoundPatternKind::List { elements, local: local.cloned() }, Syntax::text(text))
    }

    pub fn slice(inner: Option<BoundPattern>) -> Self {
        let text = match &inner {
            Some(p) => format!(".. {}", p.syntax.text),
            None => "..".to_string(),
        };
        Self::new(BoundPatternKind::Slice(inner.map(Box::new)), Syntax::text(text))
    }
}

impl BoundPropertySubpattern {
    pub fn new(member: impl Into<String>, pattern: BoundPattern) -> Self {
        let member = member.into();
        let syntax = Syntax::text(format!("{}: {}", member, pattern.syntax.text));
        BoundPropertySubpattern { member, pattern, syntax }
    }
}
