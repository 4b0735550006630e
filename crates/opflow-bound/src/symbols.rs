// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resolved symbols referenced by bound nodes.

use std::fmt;

use crate::constant::ConstValue;
use crate::types::Type;

/// Identity of a local variable within one body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalSymbol {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
    /// `static` locals are initialized once per program run.
    pub is_static: bool,
}

impl fmt::Display for LocalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSymbol {
    pub ordinal: u32,
    pub name: String,
    pub ty: Type,
    pub is_out: bool,
    pub is_ref: bool,
    /// Value supplied when a call omits the argument.
    pub default_value: Option<ConstValue>,
}

impl ParameterSymbol {
    pub fn new(ordinal: u32, name: impl Into<String>, ty: Type) -> Self {
        ParameterSymbol {
            ordinal,
            name: name.into(),
            ty,
            is_out: false,
            is_ref: false,
            default_value: None,
        }
    }

    pub fn out(ordinal: u32, name: impl Into<String>, ty: Type) -> Self {
        ParameterSymbol { is_out: true, ..Self::new(ordinal, name, ty) }
    }

    pub fn by_ref(ordinal: u32, name: impl Into<String>, ty: Type) -> Self {
        ParameterSymbol { is_ref: true, ..Self::new(ordinal, name, ty) }
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

impl fmt::Display for ParameterSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_out {
            write!(f, "out ")?;
        } else if self.is_ref {
            write!(f, "ref ")?;
        }
        write!(f, "{} {}", self.ty, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSymbol {
    pub name: String,
    pub containing: Type,
    pub ty: Type,
    pub is_static: bool,
}

impl fmt::Display for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.ty, self.containing, self.name)
    }
}

/// A property; indexers are properties with parameters named `this[]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertySymbol {
    pub name: String,
    pub containing: Type,
    pub ty: Type,
    pub parameters: Vec<ParameterSymbol>,
}

impl PropertySymbol {
    pub fn simple(containing: Type, name: impl Into<String>, ty: Type) -> Self {
        PropertySymbol {
            name: name.into(),
            containing,
            ty,
            parameters: Vec::new(),
        }
    }

    /// Built-in `int` indexer.
    pub fn indexer(containing: Type, ty: Type) -> Self {
        PropertySymbol {
            name: "this[]".to_string(),
            containing,
            ty,
            parameters: vec![ParameterSymbol::new(0, "index", Type::Int32)],
        }
    }

    pub fn is_indexer(&self) -> bool {
        !self.parameters.is_empty()
    }
}

impl fmt::Display for PropertySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_indexer() {
            write!(f, "{} {}.this[", self.ty, self.containing)?;
            write_params(f, &self.parameters)?;
            write!(f, "]")
        } else {
            write!(f, "{} {}.{}", self.ty, self.containing, self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodKind {
    Ordinary,
    Constructor,
    /// `op_Addition`, `op_True`, `op_BitwiseAnd`, ...
    UserDefinedOperator,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodSymbol {
    pub name: String,
    pub containing: Type,
    pub parameters: Vec<ParameterSymbol>,
    pub return_type: Type,
    pub kind: MethodKind,
    pub is_static: bool,
}

impl MethodSymbol {
    /// A free-standing ordinary method on `containing`.
    pub fn new(
        containing: Type,
        name: impl Into<String>,
        parameters: Vec<ParameterSymbol>,
        return_type: Type,
    ) -> Self {
        MethodSymbol {
            name: name.into(),
            containing,
            parameters,
            return_type,
            kind: MethodKind::Ordinary,
            is_static: false,
        }
    }
}

impl fmt::Display for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MethodKind::Constructor => write!(f, "{}..ctor(", self.containing)?,
            _ => write!(f, "{} {}.{}(", self.return_type, self.containing, self.name)?,
        }
        write_params(f, &self.parameters)?;
        write!(f, ")")
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[ParameterSymbol]) -> fmt::Result {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param)?;
    }
    Ok(())
}

/// A data member found by name, as used by property subpatterns.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberSymbol {
    Field(FieldSymbol),
    Property(PropertySymbol),
}

impl MemberSymbol {
    pub fn ty(&self) -> &Type {
        match self {
            MemberSymbol::Field(f) => &f.ty,
            MemberSymbol::Property(p) => &p.ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelId(pub u32);

/// A jump target: a user label or a switch case label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelSymbol {
    pub id: LabelId,
    pub name: String,
}

impl fmt::Display for LabelSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Hands out fresh local and label ids while a bound tree is assembled.
#[derive(Debug, Default)]
pub struct SymbolFactory {
    next_local: u32,
    next_label: u32,
}

impl SymbolFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&mut self, name: impl Into<String>, ty: Type) -> LocalSymbol {
        let id = LocalId(self.next_local);
        self.next_local += 1;
        LocalSymbol {
            id,
            name: name.into(),
            ty,
            is_static: false,
        }
    }

    pub fn static_local(&mut self, name: impl Into<String>, ty: Type) -> LocalSymbol {
        LocalSymbol { is_static: true, ..self.local(name, ty) }
    }

    pub fn label(&mut self, name: impl Into<String>) -> LabelSymbol {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        LabelSymbol { id, name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_ids_are_sequential() {
        let mut symbols = SymbolFactory::new();
        let a = symbols.local("a", Type::Int32);
        let b = symbols.static_local("b", Type::Bool);
        assert_eq!(a.id, LocalId(0));
        assert_eq!(b.id, LocalId(1));
        assert!(b.is_static);
        assert_eq!(symbols.label("case 1:").id, LabelId(0));
    }

    #[test]
    fn method_display() {
        let method = MethodSymbol::new(
            Type::Object,
            "M",
            vec![ParameterSymbol::new(0, "a", Type::Int32), ParameterSymbol::out(1, "b", Type::Bool)],
            Type::Void,
        );
        assert_eq!(method.to_string(), "void object.M(int a, out bool b)");
    }
}
