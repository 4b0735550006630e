// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Display implementation for operation trees.
//!
//! One line per node, children indented two spaces:
//!
//! ```text
//! Binary (Add) (Type: int, Constant: 3) (Syntax: '1 + 2')
//!   Literal (Type: int, Constant: 1) (Syntax: '1')
//!   Literal (Type: int, Constant: 2) (Syntax: '2')
//! ```

use std::fmt::{self, Write};

use opflow_bound::LocalSymbol;

use crate::operation::{BranchKind, CaseClauseKind, LoopKind, Operation, OperationKind};
use crate::pattern::{BinaryPatternOp, PatternKind};

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operation(f, self, 0)
    }
}

/// Renders `op` with every line prefixed by `indent` spaces.
pub fn render_indented(op: &Operation, indent: usize) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_operation(&mut out, op, indent);
    out
}

pub fn write_operation(out: &mut impl Write, op: &Operation, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    write!(out, "{}{}{}", pad, op.kind.name(), detail(&op.kind))?;

    write!(out, " (Type: ")?;
    match &op.ty {
        Some(ty) => write!(out, "{}", ty)?,
        None => write!(out, "null")?,
    }
    if let Some(constant) = &op.constant {
        write!(out, ", Constant: {}", constant)?;
    }
    if let OperationKind::LocalReference { is_declaration: true, .. } = op.kind {
        write!(out, ", IsDeclaration")?;
    }
    if op.flags.invalid {
        write!(out, ", IsInvalid")?;
    }
    if op.flags.implicit {
        write!(out, ", IsImplicit")?;
    }
    if op.flags.lifted {
        write!(out, ", IsLifted")?;
    }
    if op.flags.checked {
        write!(out, ", IsChecked")?;
    }
    writeln!(out, ") (Syntax: '{}')", op.syntax.text)?;

    if let Some(locals) = locals_of(&op.kind) {
        if !locals.is_empty() {
            writeln!(out, "{}  Locals: [{}]", pad, join_locals(locals))?;
        }
    }
    for child in &op.children {
        write_operation(out, child, indent + 2)?;
    }
    Ok(())
}

fn locals_of(kind: &OperationKind) -> Option<&[LocalSymbol]> {
    match kind {
        OperationKind::Block { locals }
        | OperationKind::Loop { locals, .. }
        | OperationKind::Switch { locals }
        | OperationKind::Using { locals }
        | OperationKind::SwitchExpressionArm { locals, .. } => Some(locals),
        _ => None,
    }
}

pub(crate) fn join_locals(locals: &[LocalSymbol]) -> String {
    locals.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
}

fn detail(kind: &OperationKind) -> String {
    match kind {
        OperationKind::VariableDeclaration { local } => format!(": {}", local),
        OperationKind::Loop { kind, .. } => match kind {
            LoopKind::While => " (While)".to_string(),
            LoopKind::DoWhile => " (DoWhile)".to_string(),
            LoopKind::For { .. } => " (For)".to_string(),
            LoopKind::ForEach => " (ForEach)".to_string(),
        },
        OperationKind::Labeled { label } => format!(": {}", label.name),
        OperationKind::Branch { kind, label } => {
            let name = match kind {
                BranchKind::Break => "Break",
                BranchKind::Continue => "Continue",
                BranchKind::GoTo => "GoTo",
                BranchKind::GotoCase => "GotoCase",
                BranchKind::GotoDefault => "GotoDefault",
            };
            match label {
                Some(label) => format!(" ({}): {}", name, label.name),
                None => format!(" ({})", name),
            }
        }
        OperationKind::CatchClause { exception_type, local, .. } => match local {
            Some(local) => format!(" (Exception type: {}): {}", exception_type, local.name),
            None => format!(" (Exception type: {})", exception_type),
        },
        OperationKind::CaseClause { label, kind } => {
            let name = match kind {
                CaseClauseKind::SingleValue => "SingleValue",
                CaseClauseKind::Pattern { .. } => "Pattern",
                CaseClauseKind::Default => "Default",
            };
            format!(" ({}) (Label: {})", name, label.name)
        }
        OperationKind::LocalReference { local, .. } => format!(": {}", local.name),
        OperationKind::ParameterReference { parameter } => format!(": {}", parameter.name),
        OperationKind::FieldReference { field, .. } => format!(": {}", field),
        OperationKind::PropertyReference { property, .. } => format!(": {}", property),
        OperationKind::Invocation { method, .. } => format!(": {}", method),
        OperationKind::Argument { parameter } => match parameter {
            Some(parameter) => format!(": {}", parameter.name),
            None => String::new(),
        },
        OperationKind::ObjectCreation { constructor: Some(ctor) } => format!(": {}", ctor),
        OperationKind::Unary { op, method } => with_method(format!(" ({:?})", op), method.as_ref()),
        OperationKind::Binary { op, method } | OperationKind::CompoundAssignment { op, method } => {
            with_method(format!(" ({:?})", op), method.as_ref())
        }
        OperationKind::Pattern(info) => {
            let head = match &info.kind {
                PatternKind::Declaration { local: Some(local), .. } => format!(": {}", local),
                PatternKind::Recursive { local: Some(local), .. }
                | PatternKind::List { local: Some(local), .. } => format!(": {}", local.name),
                PatternKind::Relational { op } => format!(" ({:?})", op),
                PatternKind::Binary { op } => match op {
                    BinaryPatternOp::And => " (And)".to_string(),
                    BinaryPatternOp::Or => " (Or)".to_string(),
                },
                PatternKind::Recursive { deconstruct: Some(method), .. } => format!(" ({})", method),
                _ => String::new(),
            };
            format!("{} (InputType: {}, NarrowedType: {})", head, info.input_type, info.narrowed_type)
        }
        OperationKind::FieldInitializer { field } => format!(": {}", field),
        OperationKind::PropertyInitializer { property } => format!(": {}", property),
        OperationKind::ParameterInitializer { parameter } => format!(": {}", parameter.name),
        OperationKind::FlowCapture { id } | OperationKind::FlowCaptureReference { id } => format!(": {}", id),
        OperationKind::StaticLocalInitializationSemaphore { local } => format!(": {}", local.name),
        _ => String::new(),
    }
}

fn with_method(head: String, method: Option<&opflow_bound::MethodSymbol>) -> String {
    match method {
        Some(method) => format!("{}: {}", head, method),
        None => head,
    }
}
