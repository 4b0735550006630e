// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bound statement nodes.

use crate::expr::BoundExpr;
use crate::pattern::BoundPattern;
use crate::span::Syntax;
use crate::symbols::{LabelSymbol, LocalSymbol};
use crate::types::{ForEachEnumerator, Type};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundStmt {
    pub kind: BoundStmtKind,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundStmtKind {
    Block {
        locals: Vec<LocalSymbol>,
        statements: Vec<BoundStmt>,
    },
    /// `T x = init;` (a `static` local when `local.is_static`)
    LocalDeclaration {
        local: LocalSymbol,
        initializer: Option<BoundExpr>,
    },
    Expression(BoundExpr),
    If {
        condition: BoundExpr,
        then_branch: Box<BoundStmt>,
        else_branch: Option<Box<BoundStmt>>,
    },
    While {
        condition: BoundExpr,
        body: Box<BoundStmt>,
    },
    DoWhile {
        body: Box<BoundStmt>,
        condition: BoundExpr,
    },
    For {
        locals: Vec<LocalSymbol>,
        initializers: Vec<BoundStmt>,
        condition: Option<BoundExpr>,
        increments: Vec<BoundExpr>,
        body: Box<BoundStmt>,
    },
    Labeled {
        label: LabelSymbol,
        body: Box<BoundStmt>,
    },
    Goto(LabelSymbol),
    /// `goto case value;`, resolved against the enclosing switch
    GotoCase(BoundExpr),
    GotoDefault,
    Break,
    Continue,
    Return(Option<BoundExpr>),
    /// `throw e;`, or a rethrow when `None`
    Throw(Option<BoundExpr>),
    Try {
        body: Box<BoundStmt>,
        catches: Vec<BoundCatch>,
        finally: Option<Box<BoundStmt>>,
    },
    Switch {
        governing: BoundExpr,
        /// Locals declared in any section; they share one scope.
        locals: Vec<LocalSymbol>,
        sections: Vec<BoundSwitchSection>,
    },
    /// `using (resource) body`
    Using {
        resource: BoundUsingResource,
        body: Box<BoundStmt>,
    },
    /// `foreach (T local in collection) body`
    ForEach {
        local: LocalSymbol,
        collection: BoundExpr,
        enumerator: ForEachEnumerator,
        body: Box<BoundStmt>,
    },
    /// `lock (value) body`. `lock_taken` is the flag the binder declares
    /// for `Monitor.Enter`.
    Lock {
        value: BoundExpr,
        lock_taken: LocalSymbol,
        body: Box<BoundStmt>,
    },
    Empty,
    Invalid(Vec<BoundExpr>),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundUsingResource {
    /// `using (T x = init)`
    Declaration { local: LocalSymbol, initializer: BoundExpr },
    /// `using (expr)`
    Expression(BoundExpr),
}

impl BoundUsingResource {
    pub fn ty(&self) -> &Type {
        match self {
            BoundUsingResource::Declaration { local, .. } => &local.ty,
            BoundUsingResource::Expression(expr) => &expr.ty,
        }
    }

    pub fn text(&self) -> String {
        match self {
            BoundUsingResource::Declaration { local, initializer } => {
                format!("{} {} = {}", local.ty, local.name, initializer.syntax.text)
            }
            BoundUsingResource::Expression(expr) => expr.syntax.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundCatch {
    pub exception_type: Type,
    pub local: Option<LocalSymbol>,
    pub filter: Option<BoundExpr>,
    pub body: BoundStmt,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundSwitchSection {
    pub labels: Vec<BoundCaseLabel>,
    pub statements: Vec<BoundStmt>,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundCaseLabel {
    pub label: LabelSymbol,
    pub kind: BoundCaseLabelKind,
    pub syntax: Syntax,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundCaseLabelKind {
    /// `case 1:`
    Value(BoundExpr),
    /// `case P when guard:`
    Pattern {
        pattern: BoundPattern,
        guard: Option<BoundExpr>,
    },
    Default,
}

// =================================================================
// Construction helpers
// =================================================================

impl BoundStmt {
    pub fn new(kind: BoundStmtKind, syntax: Syntax) -> Self {
        BoundStmt { kind, syntax }
    }

    pub fn with_syntax(mut self, text: impl Into<String>) -> Self {
        self.syntax = Syntax::text(text);
        self
    }

    pub fn expression(expr: BoundExpr) -> Self {
        let text = format!("{};", expr.syntax.text);
        Self::new(BoundStmtKind::Expression(expr), Syntax::text(text))
    }

    pub fn block(locals: Vec<LocalSymbol>, statements: Vec<BoundStmt>) -> Self {
        let parts: Vec<&str> = statements.iter().map(|s| s.syntax.text.as_str()).collect();
        let text = format!("{{ {} }}", parts.join(" "));
        Self::new(BoundStmtKind::Block { locals, statements }, Syntax::text(text))
    }

    pub fn declare(local: &LocalSymbol, initializer: Option<BoundExpr>) -> Self {
        let prefix = if local.is_static { "static " } else { "" };
        let text = match &initializer {
            Some(init) => format!("{}{} {} = {};", prefix, local.ty, local.name, init.syntax.text),
            None => format!("{}{} {};", prefix, local.ty, local.name),
        };
        Self::new(
            BoundStmtKind::LocalDeclaration { local: local.clone(), initializer },
            Syntax::text(text),
        )
    }

    pub fn if_then(condition: BoundExpr, then_branch: BoundStmt, else_branch: Option<BoundStmt>) -> Self {
        let text = match &else_branch {
            Some(e) => format!(
                "if ({}) {} else {}",
                condition.syntax.text, then_branch.syntax.text, e.syntax.text
            ),
            None => format!("if ({}) {}", condition.syntax.text, then_branch.syntax.text),
        };
        Self::new(
            BoundStmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            Syntax::text(text),
        )
    }

    pub fn while_loop(condition: BoundExpr, body: BoundStmt) -> Self {
        let text = format!("while ({}) {}", condition.syntax.text, body.syntax.text);
        Self::new(BoundStmtKind::While { condition, body: Box::new(body) }, Syntax::text(text))
    }

    pub fn do_while(body: BoundStmt, condition: BoundExpr) -> Self {
        let text = format!("do {} while ({});", body.syntax.text, condition.syntax.text);
        Self::new(BoundStmtKind::DoWhile { body: Box::new(body), condition }, Syntax::text(text))
    }

    pub fn for_loop(
        locals: Vec<LocalSymbol>,
        initializers: Vec<BoundStmt>,
        condition: Option<BoundExpr>,
        increments: Vec<BoundExpr>,
        body: BoundStmt,
    ) -> Self {
        let inits: Vec<&str> = initializers.iter().map(|s| s.syntax.text.trim_end_matches(';')).collect();
        let incs: Vec<&str> = increments.iter().map(|e| e.syntax.text.as_str()).collect();
        let text = format!(
            "for ({}; {}; {}) {}",
            inits.join(", "),
            condition.as_ref().map(|c| c.syntax.text.as_str()).unwrap_or(""),
            incs.join(", "),
            body.syntax.text
        );
        Self::new(
            BoundStmtKind::For { locals, initializers, condition, increments, body: Box::new(body) },
            Syntax::text(text),
        )
    }

    pub fn labeled(label: &LabelSymbol, body: BoundStmt) -> Self {
        let text = format!("{}: {}", label.name, body.syntax.text);
        Self::new(BoundStmtKind::Labeled { label: label.clone(), body: Box::new(body) }, Syntax::text(text))
    }

    pub fn goto(label: &LabelSymbol) -> Self {
        Self::new(BoundStmtKind::Goto(label.clone()), Syntax::text(format!("goto {};", label.name)))
    }

    pub fn goto_case(value: BoundExpr) -> Self {
        let text = format!("goto case {};", value.syntax.text);
        Self::new(BoundStmtKind::GotoCase(value), Syntax::text(text))
    }

    pub fn goto_default() -> Self {
        Self::new(BoundStmtKind::GotoDefault, Syntax::text("goto default;"))
    }

    pub fn break_stmt() -> Self {
        Self::new(BoundStmtKind::Break, Syntax::text("break;"))
    }

    pub fn continue_stmt() -> Self {
        Self::new(BoundStmtKind::Continue, Syntax::text("continue;"))
    }

    pub fn return_stmt(value: Option<BoundExpr>) -> Self {
        let text = match &value {
            Some(v) => format!("return {};", v.syntax.text),
            None => "return;".to_string(),
        };
        Self::new(BoundStmtKind::Return(value), Syntax::text(text))
    }

    pub fn throw(value: Option<BoundExpr>) -> Self {
        let text = match &value {
            Some(v) => format!("throw {};", v.syntax.text),
            None => "throw;".to_string(),
        };
        Self::new(BoundStmtKind::Throw(value), Syntax::text(text))
    }

    pub fn try_stmt(body: BoundStmt, catches: Vec<BoundCatch>, finally: Option<BoundStmt>) -> Self {
        let mut text = format!("try {}", body.syntax.text);
        for catch in &catches {
            text.push(' ');
            text.push_str(&catch.syntax.text);
        }
        if let Some(f) = &finally {
            text.push_str(&format!(" finally {}", f.syntax.text));
        }
        Self::new(
            BoundStmtKind::Try { body: Box::new(body), catches, finally: finally.map(Box::new) },
            Syntax::text(text),
        )
    }

    pub fn switch(governing: BoundExpr, locals: Vec<LocalSymbol>, sections: Vec<BoundSwitchSection>) -> Self {
        let text = format!("switch ({}) {{ ... }}", governing.syntax.text);
        Self::new(BoundStmtKind::Switch { governing, locals, sections }, Syntax::text(text))
    }

    pub fn using(resource: BoundUsingResource, body: BoundStmt) -> Self {
        let text = format!("using ({}) {}", resource.text(), body.syntax.text);
        Self::new(BoundStmtKind::Using { resource, body: Box::new(body) }, Syntax::text(text))
    }

    pub fn for_each(local: &LocalSymbol, collection: BoundExpr, enumerator: ForEachEnumerator, body: BoundStmt) -> Self {
        let text = format!(
            "foreach ({} {} in {}) {}",
            local.ty, local.name, collection.syntax.text, body.syntax.text
        );
        Self::new(
            BoundStmtKind::ForEach { local: local.clone(), collection, enumerator, body: Box::new(body) },
            Syntax::text(text),
        )
    }

    pub fn lock(value: BoundExpr, lock_taken: &LocalSymbol, body: BoundStmt) -> Self {
        let text = format!("lock ({}) {}", value.syntax.text, body.syntax.text);
        Self::new(
            BoundStmtKind::Lock { value, lock_taken: lock_taken.clone(), body: Box::new(body) },
            Syntax::text(text),
        )
    }

    pub fn empty() -> Self {
        Self::new(BoundStmtKind::Empty, Syntax::text(";"))
    }

    /// Expressions this statement evaluates itself, in evaluation order.
    /// Nested statements, catch filters and case labels are not included.
    pub fn expressions(&self) -> Vec<&BoundExpr> {
        match &self.kind {
            BoundStmtKind::LocalDeclaration { initializer, .. } => initializer.iter().collect(),
            BoundStmtKind::Expression(expr)
            | BoundStmtKind::If { condition: expr, .. }
            | BoundStmtKind::While { condition: expr, .. }
            | BoundStmtKind::DoWhile { condition: expr, .. }
            | BoundStmtKind::GotoCase(expr)
            | BoundStmtKind::Switch { governing: expr, .. }
            | BoundStmtKind::ForEach { collection: expr, .. }
            | BoundStmtKind::Lock { value: expr, .. } => vec![expr],
            BoundStmtKind::For { condition, increments, .. } => condition.iter().chain(increments).collect(),
            BoundStmtKind::Return(value) | BoundStmtKind::Throw(value) => value.iter().collect(),
            BoundStmtKind::Using { resource, .. } => match resource {
                BoundUsingResource::Declaration { initializer, .. } => vec![initializer],
                BoundUsingResource::Expression(expr) => vec![expr],
            },
            BoundStmtKind::Invalid(children) => children.iter().collect(),
            BoundStmtKind::Block { .. }
            | BoundStmtKind::Labeled { .. }
            | BoundStmtKind::Goto(_)
            | BoundStmtKind::GotoDefault
            | BoundStmtKind::Break
            | BoundStmtKind::Continue
            | BoundStmtKind::Try { .. }
            | BoundStmtKind::Empty => Vec::new(),
        }
    }
}

impl BoundCatch {
    pub fn new(exception_type: Type, local: Option<LocalSymbol>, filter: Option<BoundExpr>, body: BoundStmt) -> Self {
        let mut text = match &local {
            Some(local) => format!("catch ({} {})", exception_type, local.name),
            None => format!("catch ({})", exception_type),
        };
        if let Some(filter) = &filter {
            text.push_str(&format!(" when ({})", filter.syntax.text));
        }
        text.push_str(&format!(" {}", body.syntax.text));
        BoundCatch { exception_type, local, filter, body, syntax: Syntax::text(text) }
    }
}

impl BoundSwitchSection {
    pub fn new(labels: Vec<BoundCaseLabel>, statements: Vec<BoundStmt>) -> Self {
        let mut parts: Vec<&str> = labels.iter().map(|l| l.syntax.text.as_str()).collect();
        parts.extend(statements.iter().map(|s| s.syntax.text.as_str()));
        let text = parts.join(" ");
        BoundSwitchSection { labels, statements, syntax: Syntax::text(text) }
    }
}

impl BoundCaseLabel {
    pub fn value(label: LabelSymbol, value: BoundExpr) -> Self {
        let text = format!("case {}:", value.syntax.text);
        BoundCaseLabel { label, kind: BoundCaseLabelKind::Value(value), syntax: Syntax::text(text) }
    }

    pub fn pattern(label: LabelSymbol, pattern: BoundPattern, guard: Option<BoundExpr>) -> Self {
        let text = match &guard {
            Some(g) => format!("case {} when {}:", pattern.syntax.text, g.syntax.text),
            None => format!("case {}:", pattern.syntax.text),
        };
        BoundCaseLabel {
            label,
            kind: BoundCaseLabelKind::Pattern { pattern, guard },
            syntax: Syntax::text(text),
        }
    }

    pub fn default(label: LabelSymbol) -> Self {
        BoundCaseLabel { label, kind: BoundCaseLabelKind::Default, syntax: Syntax::text("default:") }
    }
}
