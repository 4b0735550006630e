// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pattern nodes and the builder that resolves them against an input type.
//!
//! The builder works top-down: each subpattern receives the type its parent
//! narrowed to, so a recursive pattern's positional and named subpatterns
//! see the element and member types respectively. Resolution failures never
//! abort the build. A missing member becomes an `Invalid` member reference
//! inside its `PropertySubpattern`, and the remaining siblings are still
//! produced so the partial tree stays inspectable.

use opflow_bound::{
    BoundPattern, BoundPatternKind, BoundPropertySubpattern, Deconstruction, FieldSymbol,
    LocalSymbol, MemberSymbol, MethodSymbol, PropertySymbol, RelationalOp, Syntax, Type,
};
use tracing::warn;

use crate::builder::OperationTreeBuilder;
use crate::operation::{BinaryOperatorKind, Operation, OperationKind};

/// Input and narrowed types shared by every pattern node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternInfo {
    /// Type of the value being tested.
    pub input_type: Type,
    /// Type the value is known to have after a successful match.
    pub narrowed_type: Type,
    pub kind: PatternKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryPatternOp {
    And,
    Or,
}

/// Closed set of pattern shapes. Child layouts:
///
/// * `Constant`, `Relational`: `[value]`
/// * `Binary`: `[left, right]`
/// * `Negated`: `[pattern]`
/// * `Recursive`: `[deconstruction subpatterns..., PropertySubpattern...]`
/// * `List`: `[element patterns...]`
/// * `Slice`: `[pattern?]`
/// * everything else: none
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatternKind {
    Declaration {
        /// `None` for `var x`
        matched_type: Option<Type>,
        local: Option<LocalSymbol>,
        /// `var` patterns also match `null`.
        matches_null: bool,
    },
    Type {
        matched_type: Type,
    },
    Constant,
    Relational {
        op: BinaryOperatorKind,
    },
    Binary {
        op: BinaryPatternOp,
    },
    Negated,
    Recursive {
        matched_type: Type,
        deconstruct: Option<MethodSymbol>,
        deconstruction_count: usize,
        local: Option<LocalSymbol>,
    },
    List {
        length: Option<PropertySymbol>,
        indexer: Option<PropertySymbol>,
        local: Option<LocalSymbol>,
    },
    Slice {
        slice: Option<MethodSymbol>,
        has_pattern: bool,
    },
    Discard,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Declaration { .. } => "DeclarationPattern",
            PatternKind::Type { .. } => "TypePattern",
            PatternKind::Constant => "ConstantPattern",
            PatternKind::Relational { .. } => "RelationalPattern",
            PatternKind::Binary { .. } => "BinaryPattern",
            PatternKind::Negated => "NegatedPattern",
            PatternKind::Recursive { .. } => "RecursivePattern",
            PatternKind::List { .. } => "ListPattern",
            PatternKind::Slice { .. } => "SlicePattern",
            PatternKind::Discard => "DiscardPattern",
        }
    }
}

/// A built pattern plus the locals it declares, in declaration order.
#[derive(Debug, Clone)]
pub struct PatternDecision {
    pub operation: Operation,
    pub bindings: Vec<LocalSymbol>,
}

pub struct PatternDecisionBuilder<'b, 'a> {
    ops: &'b OperationTreeBuilder<'a>,
    bindings: Vec<LocalSymbol>,
}

impl<'b, 'a> PatternDecisionBuilder<'b, 'a> {
    pub fn new(ops: &'b OperationTreeBuilder<'a>) -> Self {
        PatternDecisionBuilder { ops, bindings: Vec::new() }
    }

    /// Builds `pattern` as tested against a value of `input_type`.
    pub fn build(mut self, pattern: &BoundPattern, input_type: &Type) -> PatternDecision {
        let operation = self.visit(pattern, input_type, false);
        PatternDecision { operation, bindings: self.bindings }
    }

    fn node(&self, pattern: &BoundPattern, input: &Type, narrowed: Type, kind: PatternKind) -> Operation {
        let info = PatternInfo { input_type: input.clone(), narrowed_type: narrowed, kind };
        Operation::new(OperationKind::Pattern(info), None, pattern.syntax.clone())
    }

    fn bind(&mut self, local: &Option<LocalSymbol>) {
        if let Some(local) = local {
            if !self.bindings.contains(local) {
                self.bindings.push(local.clone());
            }
        }
    }

    /// Whether a value of `input` can possibly be a `target`.
    fn compatible(&self, input: &Type, target: &Type) -> bool {
        let types = self.ops.types();
        types.is_implicitly_convertible(target, input)
            || types.is_implicitly_convertible(input, target)
            || types.is_implicitly_convertible(target, input.strip_nullable())
    }

    fn visit(&mut self, pattern: &BoundPattern, input: &Type, in_list: bool) -> Operation {
        match &pattern.kind {
            BoundPatternKind::Discard => self.node(pattern, input, input.clone(), PatternKind::Discard),

            BoundPatternKind::Declaration { declared_type, local } => {
                self.bind(local);
                let narrowed = declared_type.clone().unwrap_or_else(|| input.clone());
                let op = self.node(
                    pattern,
                    input,
                    narrowed.clone(),
                    PatternKind::Declaration {
                        matched_type: declared_type.clone(),
                        local: local.clone(),
                        matches_null: declared_type.is_none(),
                    },
                );
                if self.compatible(input, &narrowed) {
                    op
                } else {
                    warn!(input = %input, declared = %narrowed, "declaration pattern can never match");
                    op.invalid()
                }
            }

            BoundPatternKind::Type(ty) => {
                let op = self.node(pattern, input, ty.clone(), PatternKind::Type { matched_type: ty.clone() });
                if self.compatible(input, ty) { op } else { op.invalid() }
            }

            BoundPatternKind::Constant(value) => {
                let value_op = self.ops.build_expression(value);
                let narrowed = self.constant_narrowing(input, &value.ty, value_op.constant.is_some());
                self.node(pattern, input, narrowed, PatternKind::Constant).with_child(value_op)
            }

            BoundPatternKind::Relational { op, value } => {
                let value_op = self.ops.build_expression(value);
                let narrowed = self.constant_narrowing(input, &value.ty, true);
                let op = match op {
                    RelationalOp::LessThan => BinaryOperatorKind::LessThan,
                    RelationalOp::LessThanOrEqual => BinaryOperatorKind::LessThanOrEqual,
                    RelationalOp::GreaterThan => BinaryOperatorKind::GreaterThan,
                    RelationalOp::GreaterThanOrEqual => BinaryOperatorKind::GreaterThanOrEqual,
                };
                self.node(pattern, input, narrowed, PatternKind::Relational { op }).with_child(value_op)
            }

            BoundPatternKind::And(left, right) => {
                let left_op = self.visit(left, input, in_list);
                let between = narrowed_of(&left_op).unwrap_or_else(|| input.clone());
                let right_op = self.visit(right, &between, in_list);
                let narrowed = narrowed_of(&right_op).unwrap_or(between);
                self.node(pattern, input, narrowed, PatternKind::Binary { op: BinaryPatternOp::And })
                    .with_children(vec![left_op, right_op])
            }

            BoundPatternKind::Or(left, right) => {
                let left_op = self.visit(left, input, in_list);
                let right_op = self.visit(right, input, in_list);
                let narrowed = self.common_type(input, narrowed_of(&left_op), narrowed_of(&right_op));
                self.node(pattern, input, narrowed, PatternKind::Binary { op: BinaryPatternOp::Or })
                    .with_children(vec![left_op, right_op])
            }

            BoundPatternKind::Not(operand) => {
                let operand_op = self.visit(operand, input, in_list);
                self.node(pattern, input, input.clone(), PatternKind::Negated).with_child(operand_op)
            }

            BoundPatternKind::Recursive { declared_type, deconstruction, properties, local } => {
                self.visit_recursive(pattern, input, declared_type, deconstruction.as_deref(), properties, local)
            }

            BoundPatternKind::List { elements, local } => self.visit_list(pattern, input, elements, local),

            BoundPatternKind::Slice(inner) => {
                // Outside a list pattern there is no range to slice.
                let slice = if in_list { self.ops.types().lookup_slice(input.strip_nullable()) } else { None };
                let slice_type = slice.as_ref().map(|m| m.return_type.clone()).unwrap_or(Type::Error);
                let child = inner.as_ref().map(|p| self.visit(p, &slice_type, false));
                let op = self.node(
                    pattern,
                    input,
                    input.clone(),
                    PatternKind::Slice { slice: slice.clone(), has_pattern: child.is_some() },
                );
                let op = op.with_children(child.into_iter().collect());
                if slice.is_none() {
                    warn!(input = %input, "slice pattern without a usable range accessor");
                    op.invalid()
                } else {
                    op
                }
            }
        }
    }

    /// Constant and relational patterns over `T?` or `object` narrow to the
    /// constant's own type.
    fn constant_narrowing(&self, input: &Type, value_type: &Type, is_constant: bool) -> Type {
        let widens = input.is_nullable() || *input == Type::Object;
        if widens && is_constant && *value_type != Type::Object && !value_type.is_error() {
            value_type.clone()
        } else {
            input.clone()
        }
    }

    fn common_type(&self, input: &Type, left: Option<Type>, right: Option<Type>) -> Type {
        let types = self.ops.types();
        match (left, right) {
            (Some(l), Some(r)) if l == r => l,
            (Some(l), Some(r)) if types.is_implicitly_convertible(&l, &r) && r != *input => r,
            (Some(l), Some(r)) if types.is_implicitly_convertible(&r, &l) && l != *input => l,
            _ => input.clone(),
        }
    }

    fn visit_recursive(
        &mut self,
        pattern: &BoundPattern,
        input: &Type,
        declared_type: &Option<Type>,
        deconstruction: Option<&[BoundPattern]>,
        properties: &[BoundPropertySubpattern],
        local: &Option<LocalSymbol>,
    ) -> Operation {
        self.bind(local);
        let types = self.ops.types();
        let matched = declared_type.clone().unwrap_or_else(|| input.strip_nullable().clone());
        let mut invalid = !self.compatible(input, &matched);
        let mut children = Vec::new();
        let mut deconstruct = None;

        if let Some(elements) = deconstruction {
            match types.deconstruct(&matched, elements.len()) {
                Some(decomposition) => {
                    if let Deconstruction::Method(method, _) = &decomposition {
                        deconstruct = Some(method.clone());
                    }
                    for (element, ty) in elements.iter().zip(decomposition.element_types()) {
                        children.push(self.visit(element, ty, false));
                    }
                }
                None => {
                    warn!(ty = %matched, arity = elements.len(), "type cannot be deconstructed");
                    invalid = true;
                    for element in elements {
                        children.push(self.visit(element, &Type::Error, false));
                    }
                }
            }
        }

        for property in properties {
            children.push(self.visit_property(property, &matched));
        }

        let op = self
            .node(
                pattern,
                input,
                matched.clone(),
                PatternKind::Recursive {
                    matched_type: matched,
                    deconstruct,
                    deconstruction_count: deconstruction.map_or(0, <[_]>::len),
                    local: local.clone(),
                },
            )
            .with_children(children);
        if invalid { op.invalid() } else { op }
    }

    fn visit_property(&mut self, property: &BoundPropertySubpattern, container: &Type) -> Operation {
        let syntax = Syntax::text(property.member.clone());
        let (member, member_type) = match self.ops.types().lookup_member(container, &property.member) {
            Some(MemberSymbol::Field(field)) => {
                let ty = field.ty.clone();
                (member_reference_field(field, syntax), ty)
            }
            Some(MemberSymbol::Property(prop)) => {
                let ty = prop.ty.clone();
                let op = Operation::new(
                    OperationKind::PropertyReference { property: prop, has_instance: false },
                    Some(ty.clone()),
                    syntax,
                );
                (op, ty)
            }
            None => {
                warn!(member = %property.member, ty = %container, "unresolved member in property subpattern");
                (Operation::new(OperationKind::Invalid, None, syntax), Type::Error)
            }
        };
        let pattern = self.visit(&property.pattern, &member_type, false);
        Operation::new(OperationKind::PropertySubpattern, None, property.syntax.clone())
            .with_children(vec![member, pattern])
    }

    fn visit_list(
        &mut self,
        pattern: &BoundPattern,
        input: &Type,
        elements: &[BoundPattern],
        local: &Option<LocalSymbol>,
    ) -> Operation {
        self.bind(local);
        let types = self.ops.types();
        let matched = input.strip_nullable().clone();
        let length = types.lookup_length(&matched);
        let indexer = types.lookup_indexer(&matched);
        let element_type = indexer.as_ref().map(|p| p.ty.clone()).unwrap_or(Type::Error);

        let mut seen_slice = false;
        let mut children = Vec::with_capacity(elements.len());
        for element in elements {
            if let BoundPatternKind::Slice(_) = element.kind {
                let op = self.visit(element, &matched, true);
                if seen_slice {
                    warn!("more than one slice in a list pattern");
                    children.push(op.invalid());
                } else {
                    children.push(op);
                }
                seen_slice = true;
            } else {
                children.push(self.visit(element, &element_type, false));
            }
        }

        let op = self
            .node(
                pattern,
                input,
                matched,
                PatternKind::List { length: length.clone(), indexer: indexer.clone(), local: local.clone() },
            )
            .with_children(children);
        if length.is_none() || indexer.is_none() {
            warn!(ty = %input, "list pattern on a type without a length and int indexer");
            op.invalid()
        } else {
            op
        }
    }
}

fn member_reference_field(field: FieldSymbol, syntax: Syntax) -> Operation {
    let ty = field.ty.clone();
    Operation::new(OperationKind::FieldReference { field, has_instance: false }, Some(ty), syntax)
}

fn narrowed_of(op: &Operation) -> Option<Type> {
    match &op.kind {
        OperationKind::Pattern(info) => Some(info.narrowed_type.clone()),
        _ => None,
    }
}
