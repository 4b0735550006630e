// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Semantic types and the table of user-defined type definitions.

use std::fmt;

use crate::symbols::{
    FieldSymbol, MemberSymbol, MethodKind, MethodSymbol, ParameterSymbol, PropertySymbol,
};

/// Unique identifier for named (user-defined or well-known) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(pub u32);

/// A named type reference. The name is carried along so types render
/// without consulting the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedType {
    pub id: TypeId,
    pub name: String,
}

/// One element of a tuple type. Element names do not affect identity.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TupleElement {
    pub name: Option<String>,
    pub ty: Type,
}

impl PartialEq for TupleElement {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl std::hash::Hash for TupleElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
    }
}

/// A semantic type as produced by the type checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Void,
    Bool,
    Char,
    Int32,
    Int64,
    Double,
    String,
    Object,
    /// `T?` over a value type
    Nullable(Box<Type>),
    Tuple(Vec<TupleElement>),
    Array(Box<Type>),
    Named(NamedType),
    /// Type of an erroneous expression
    Error,
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        Type::Nullable(Box::new(inner))
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    /// Tuple type without element names.
    pub fn tuple(elements: impl IntoIterator<Item = Type>) -> Type {
        Type::Tuple(
            elements
                .into_iter()
                .map(|ty| TupleElement { name: None, ty })
                .collect(),
        )
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// The `T` of `T?`, or `None` for non-nullable types.
    pub fn nullable_underlying(&self) -> Option<&Type> {
        match self {
            Type::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    /// Strips one level of `?`.
    pub fn strip_nullable(&self) -> &Type {
        self.nullable_underlying().unwrap_or(self)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Char | Type::Int32 | Type::Int64 | Type::Double)
    }

    /// Built-in types whose equality the switch lowering can test directly.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Char | Type::Int32 | Type::Int64 | Type::Double | Type::String
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Int32 => write!(f, "int"),
            Type::Int64 => write!(f, "long"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Object => write!(f, "object"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &element.name {
                        Some(name) => write!(f, "{} {}", element.ty, name)?,
                        None => write!(f, "{}", element.ty)?,
                    }
                }
                write!(f, ")")
            }
            Type::Array(element) => write!(f, "{}[]", element),
            Type::Named(named) => write!(f, "{}", named.name),
            Type::Error => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeDefKind {
    Class,
    Struct,
    Interface,
}

/// A named type definition with its members.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeDef {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeDefKind,
    pub base: Option<Type>,
    pub fields: Vec<FieldSymbol>,
    pub properties: Vec<PropertySymbol>,
    pub methods: Vec<MethodSymbol>,
}

/// Types the lowering passes synthesize references to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownType {
    Exception,
    InvalidOperationException,
    SwitchExpressionException,
    IDisposable,
    Monitor,
    IEnumerable,
    IEnumerator,
}

/// Methods `using`, `lock` and `foreach` lower to calls of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownMethod {
    /// `IDisposable.Dispose()`
    Dispose,
    /// `Monitor.Enter(object, ref bool)`
    MonitorEnter,
    /// `Monitor.Exit(object)`
    MonitorExit,
    /// `IEnumerable.GetEnumerator()`
    GetEnumerator,
    /// `IEnumerator.MoveNext()`
    MoveNext,
}

/// The enumeration members a `foreach` statement calls.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForEachEnumerator {
    /// Called on the collection, converted to the method's containing type.
    pub get_enumerator: MethodSymbol,
    pub move_next: MethodSymbol,
    pub current: PropertySymbol,
}

impl ForEachEnumerator {
    pub fn enumerator_type(&self) -> &Type {
        &self.get_enumerator.return_type
    }
}

/// How a value decomposes positionally for recursive patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Deconstruction {
    /// Tuple elements, tested directly.
    Tuple(Vec<Type>),
    /// A `Deconstruct` method with one out parameter per element.
    Method(MethodSymbol, Vec<Type>),
}

impl Deconstruction {
    pub fn element_types(&self) -> &[Type] {
        match self {
            Deconstruction::Tuple(types) => types,
            Deconstruction::Method(_, types) => types,
        }
    }
}

/// Registry of named types.
///
/// The binder fills it; lowering only reads it for member lookup, nullable
/// helpers and implicit-convertibility checks.
#[derive(Debug, Clone)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
    exception: TypeId,
    invalid_operation_exception: TypeId,
    switch_expression_exception: TypeId,
    disposable: TypeId,
    monitor: TypeId,
    enumerable: TypeId,
    enumerator: TypeId,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable {
            defs: Vec::new(),
            exception: TypeId(0),
            invalid_operation_exception: TypeId(0),
            switch_expression_exception: TypeId(0),
            disposable: TypeId(0),
            monitor: TypeId(0),
            enumerable: TypeId(0),
            enumerator: TypeId(0),
        };

        table.exception = table.define("System.Exception", TypeDefKind::Class);
        let exception = table.named(table.exception);
        table.add_constructor(table.exception, vec![]);

        table.invalid_operation_exception =
            table.define("System.InvalidOperationException", TypeDefKind::Class);
        table.set_base(table.invalid_operation_exception, exception);
        table.add_constructor(table.invalid_operation_exception, vec![]);

        table.switch_expression_exception = table.define(
            "System.Runtime.CompilerServices.SwitchExpressionException",
            TypeDefKind::Class,
        );
        let invalid_operation = table.named(table.invalid_operation_exception);
        table.set_base(table.switch_expression_exception, invalid_operation);
        table.add_constructor(table.switch_expression_exception, vec![]);
        table.add_constructor(
            table.switch_expression_exception,
            vec![ParameterSymbol::new(0, "unmatchedValue", Type::Object)],
        );

        table.disposable = table.define("System.IDisposable", TypeDefKind::Interface);
        table.monitor = table.define("System.Threading.Monitor", TypeDefKind::Class);
        table.enumerable = table.define("System.Collections.IEnumerable", TypeDefKind::Interface);
        table.enumerator = table.define("System.Collections.IEnumerator", TypeDefKind::Interface);
        table.add_property(table.enumerator, "Current", Type::Object);
        for method in [
            WellKnownMethod::Dispose,
            WellKnownMethod::MonitorEnter,
            WellKnownMethod::MonitorExit,
            WellKnownMethod::GetEnumerator,
            WellKnownMethod::MoveNext,
        ] {
            let symbol = table.well_known_method(method);
            if let Type::Named(named) = &symbol.containing {
                if let Some(def) = table.defs.get_mut(named.id.0 as usize) {
                    def.methods.push(symbol.clone());
                }
            }
        }
        table
    }

    // =================================================================
    // Registration
    // =================================================================

    pub fn define(&mut self, name: impl Into<String>, kind: TypeDefKind) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(TypeDef {
            id,
            name: name.into(),
            kind,
            base: None,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        });
        id
    }

    pub fn set_base(&mut self, id: TypeId, base: Type) {
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.base = Some(base);
        }
    }

    pub fn add_field(&mut self, id: TypeId, name: impl Into<String>, ty: Type) -> FieldSymbol {
        let field = FieldSymbol {
            name: name.into(),
            containing: self.named(id),
            ty,
            is_static: false,
        };
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.fields.push(field.clone());
        }
        field
    }

    pub fn add_property(&mut self, id: TypeId, name: impl Into<String>, ty: Type) -> PropertySymbol {
        let property = PropertySymbol {
            name: name.into(),
            containing: self.named(id),
            ty,
            parameters: Vec::new(),
        };
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.properties.push(property.clone());
        }
        property
    }

    pub fn add_indexer(&mut self, id: TypeId, parameters: Vec<ParameterSymbol>, ty: Type) -> PropertySymbol {
        let indexer = PropertySymbol {
            name: "this[]".to_string(),
            containing: self.named(id),
            ty,
            parameters,
        };
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.properties.push(indexer.clone());
        }
        indexer
    }

    pub fn add_method(
        &mut self,
        id: TypeId,
        name: impl Into<String>,
        parameters: Vec<ParameterSymbol>,
        return_type: Type,
    ) -> MethodSymbol {
        self.push_method(id, name.into(), parameters, return_type, MethodKind::Ordinary, false)
    }

    pub fn add_constructor(&mut self, id: TypeId, parameters: Vec<ParameterSymbol>) -> MethodSymbol {
        self.push_method(id, ".ctor".to_string(), parameters, Type::Void, MethodKind::Constructor, false)
    }

    /// Registers a user-defined operator, e.g. `op_Addition`, `op_True`.
    pub fn add_operator(
        &mut self,
        id: TypeId,
        name: impl Into<String>,
        parameters: Vec<ParameterSymbol>,
        return_type: Type,
    ) -> MethodSymbol {
        self.push_method(id, name.into(), parameters, return_type, MethodKind::UserDefinedOperator, true)
    }

    fn push_method(
        &mut self,
        id: TypeId,
        name: String,
        parameters: Vec<ParameterSymbol>,
        return_type: Type,
        kind: MethodKind,
        is_static: bool,
    ) -> MethodSymbol {
        let method = MethodSymbol {
            name,
            containing: self.named(id),
            parameters,
            return_type,
            kind,
            is_static,
        };
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.methods.push(method.clone());
        }
        method
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn def(&self, id: TypeId) -> Option<&TypeDef> {
        self.defs.get(id.0 as usize)
    }

    /// The `Type::Named` for a registered id.
    pub fn named(&self, id: TypeId) -> Type {
        let name = self
            .def(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("<type {}>", id.0));
        Type::Named(NamedType { id, name })
    }

    pub fn well_known(&self, ty: WellKnownType) -> Type {
        match ty {
            WellKnownType::Exception => self.named(self.exception),
            WellKnownType::InvalidOperationException => self.named(self.invalid_operation_exception),
            WellKnownType::SwitchExpressionException => self.named(self.switch_expression_exception),
            WellKnownType::IDisposable => self.named(self.disposable),
            WellKnownType::Monitor => self.named(self.monitor),
            WellKnownType::IEnumerable => self.named(self.enumerable),
            WellKnownType::IEnumerator => self.named(self.enumerator),
        }
    }

    pub fn well_known_method(&self, method: WellKnownMethod) -> MethodSymbol {
        let object = || ParameterSymbol::new(0, "obj", Type::Object);
        let (containing, name, parameters, return_type, is_static) = match method {
            WellKnownMethod::Dispose => (WellKnownType::IDisposable, "Dispose", vec![], Type::Void, false),
            WellKnownMethod::MonitorEnter => (
                WellKnownType::Monitor,
                "Enter",
                vec![object(), ParameterSymbol::by_ref(1, "lockTaken", Type::Bool)],
                Type::Void,
                true,
            ),
            WellKnownMethod::MonitorExit => (WellKnownType::Monitor, "Exit", vec![object()], Type::Void, true),
            WellKnownMethod::GetEnumerator => (
                WellKnownType::IEnumerable,
                "GetEnumerator",
                vec![],
                self.well_known(WellKnownType::IEnumerator),
                false,
            ),
            WellKnownMethod::MoveNext => (WellKnownType::IEnumerator, "MoveNext", vec![], Type::Bool, false),
        };
        MethodSymbol {
            name: name.to_string(),
            containing: self.well_known(containing),
            parameters,
            return_type,
            kind: MethodKind::Ordinary,
            is_static,
        }
    }

    /// Whether a value of `ty` is disposed through `IDisposable`.
    pub fn is_disposable(&self, ty: &Type) -> bool {
        !ty.is_error() && self.is_implicitly_convertible(ty, &self.well_known(WellKnownType::IDisposable))
    }

    pub fn is_value_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Bool | Type::Char | Type::Int32 | Type::Int64 | Type::Double => true,
            Type::Nullable(_) | Type::Tuple(_) => true,
            Type::Named(named) => self
                .def(named.id)
                .map(|def| def.kind == TypeDefKind::Struct)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Whether `null` is a possible value of `ty`.
    pub fn can_be_null(&self, ty: &Type) -> bool {
        !self.is_value_type(ty) || ty.is_nullable()
    }

    /// `T` for a value type, `T?` lifted; reference types are unchanged.
    pub fn make_nullable(&self, ty: &Type) -> Type {
        if self.is_value_type(ty) && !ty.is_nullable() {
            Type::nullable(ty.clone())
        } else {
            ty.clone()
        }
    }

    fn base_of(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Named(named) => self.def(named.id).and_then(|def| def.base.clone()),
            _ => None,
        }
    }

    /// Identity, numeric widening, nullable wrapping, boxing and base-class
    /// conversions. Error types convert both ways.
    pub fn is_implicitly_convertible(&self, from: &Type, to: &Type) -> bool {
        if from == to || from.is_error() || to.is_error() {
            return true;
        }
        match (from, to) {
            (_, Type::Object) => !matches!(from, Type::Void),
            (Type::Char, Type::Int32 | Type::Int64 | Type::Double) => true,
            (Type::Int32, Type::Int64 | Type::Double) => true,
            (Type::Int64, Type::Double) => true,
            (Type::Nullable(a), Type::Nullable(b)) => self.is_implicitly_convertible(a, b),
            (_, Type::Nullable(inner)) => self.is_implicitly_convertible(from, inner),
            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| self.is_implicitly_convertible(&x.ty, &y.ty))
            }
            (Type::Named(_), Type::Named(_)) => {
                let mut current = self.base_of(from);
                while let Some(base) = current {
                    if &base == to {
                        return true;
                    }
                    current = self.base_of(&base);
                }
                false
            }
            _ => false,
        }
    }

    /// Resolves a field or property by name, walking base types.
    ///
    /// Tuples expose `ItemN` and their element names; `T?` exposes
    /// `HasValue`/`Value`; strings and arrays expose `Length`.
    pub fn lookup_member(&self, ty: &Type, name: &str) -> Option<MemberSymbol> {
        match ty {
            Type::Tuple(elements) => {
                let index = elements
                    .iter()
                    .position(|e| e.name.as_deref() == Some(name))
                    .or_else(|| {
                        name.strip_prefix("Item")
                            .and_then(|n| n.parse::<usize>().ok())
                            .filter(|n| *n >= 1 && *n <= elements.len())
                            .map(|n| n - 1)
                    })?;
                Some(MemberSymbol::Field(FieldSymbol {
                    name: format!("Item{}", index + 1),
                    containing: ty.clone(),
                    ty: elements[index].ty.clone(),
                    is_static: false,
                }))
            }
            Type::Nullable(inner) => match name {
                "HasValue" => Some(MemberSymbol::Property(PropertySymbol::simple(ty.clone(), "HasValue", Type::Bool))),
                "Value" => Some(MemberSymbol::Property(PropertySymbol::simple(ty.clone(), "Value", (**inner).clone()))),
                _ => None,
            },
            Type::String | Type::Array(_) if name == "Length" => Some(MemberSymbol::Property(
                PropertySymbol::simple(ty.clone(), "Length", Type::Int32),
            )),
            Type::Named(named) => {
                let def = self.def(named.id)?;
                if let Some(field) = def.fields.iter().find(|f| f.name == name) {
                    return Some(MemberSymbol::Field(field.clone()));
                }
                if let Some(property) = def
                    .properties
                    .iter()
                    .find(|p| p.name == name && p.parameters.is_empty())
                {
                    return Some(MemberSymbol::Property(property.clone()));
                }
                let base = def.base.clone()?;
                self.lookup_member(&base, name)
            }
            _ => None,
        }
    }

    /// Finds a method by name and parameter count, walking base types.
    pub fn lookup_method(&self, ty: &Type, name: &str, arity: usize) -> Option<MethodSymbol> {
        let Type::Named(named) = ty else {
            return None;
        };
        let def = self.def(named.id)?;
        if let Some(method) = def
            .methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == arity)
        {
            return Some(method.clone());
        }
        let base = def.base.clone()?;
        self.lookup_method(&base, name, arity)
    }

    pub fn constructor(&self, ty: &Type, arity: usize) -> Option<MethodSymbol> {
        self.lookup_method(ty, ".ctor", arity)
    }

    /// An indexer taking a single `int`.
    pub fn lookup_indexer(&self, ty: &Type) -> Option<PropertySymbol> {
        match ty {
            Type::Array(element) => Some(PropertySymbol::indexer(ty.clone(), (**element).clone())),
            Type::String => Some(PropertySymbol::indexer(ty.clone(), Type::Char)),
            Type::Named(named) => {
                let def = self.def(named.id)?;
                if let Some(indexer) = def
                    .properties
                    .iter()
                    .find(|p| p.parameters.len() == 1 && p.parameters[0].ty == Type::Int32)
                {
                    return Some(indexer.clone());
                }
                let base = def.base.clone()?;
                self.lookup_indexer(&base)
            }
            _ => None,
        }
    }

    /// `Length`, falling back to `Count`, of type `int`.
    pub fn lookup_length(&self, ty: &Type) -> Option<PropertySymbol> {
        ["Length", "Count"].iter().find_map(|name| match self.lookup_member(ty, name) {
            Some(MemberSymbol::Property(p)) if p.ty == Type::Int32 => Some(p),
            _ => None,
        })
    }

    /// The range accessor used by slice patterns.
    pub fn lookup_slice(&self, ty: &Type) -> Option<MethodSymbol> {
        let int_pair = || {
            vec![
                ParameterSymbol::new(0, "start", Type::Int32),
                ParameterSymbol::new(1, "length", Type::Int32),
            ]
        };
        match ty {
            Type::Array(_) => Some(MethodSymbol {
                name: "GetSubArray".to_string(),
                containing: ty.clone(),
                parameters: int_pair(),
                return_type: ty.clone(),
                kind: MethodKind::Ordinary,
                is_static: true,
            }),
            Type::String => Some(MethodSymbol {
                name: "Substring".to_string(),
                containing: Type::String,
                parameters: int_pair(),
                return_type: Type::String,
                kind: MethodKind::Ordinary,
                is_static: false,
            }),
            Type::Named(_) => self.lookup_method(ty, "Slice", 2),
            _ => None,
        }
    }

    /// Positional decomposition of `ty` into `arity` elements.
    pub fn deconstruct(&self, ty: &Type, arity: usize) -> Option<Deconstruction> {
        match ty {
            Type::Tuple(elements) if elements.len() == arity => Some(Deconstruction::Tuple(
                elements.iter().map(|e| e.ty.clone()).collect(),
            )),
            Type::Named(_) => {
                let method = self.lookup_method(ty, "Deconstruct", arity)?;
                if !method.parameters.iter().all(|p| p.is_out) {
                    return None;
                }
                let types = method.parameters.iter().map(|p| p.ty.clone()).collect();
                Some(Deconstruction::Method(method, types))
            }
            _ => None,
        }
    }

    /// How `foreach` enumerates `collection`: through a `GetEnumerator`
    /// method on the type or its bases, and through `IEnumerable` for
    /// arrays and strings.
    pub fn foreach_enumerator(&self, collection: &Type) -> Option<ForEachEnumerator> {
        match collection {
            Type::Array(_) | Type::String => {
                let enumerator = self.well_known(WellKnownType::IEnumerator);
                Some(ForEachEnumerator {
                    get_enumerator: self.well_known_method(WellKnownMethod::GetEnumerator),
                    move_next: self.well_known_method(WellKnownMethod::MoveNext),
                    current: PropertySymbol::simple(enumerator, "Current", Type::Object),
                })
            }
            Type::Named(_) => {
                let get_enumerator = self.lookup_method(collection, "GetEnumerator", 0)?;
                let enumerator = get_enumerator.return_type.clone();
                let move_next = self.lookup_method(&enumerator, "MoveNext", 0)?;
                let Some(MemberSymbol::Property(current)) = self.lookup_member(&enumerator, "Current") else {
                    return None;
                };
                Some(ForEachEnumerator { get_enumerator, move_next, current })
            }
            _ => None,
        }
    }

    /// The synthesized `T?.GetValueOrDefault()` accessor.
    pub fn get_value_or_default(&self, nullable: &Type) -> MethodSymbol {
        MethodSymbol {
            name: "GetValueOrDefault".to_string(),
            containing: nullable.clone(),
            parameters: Vec::new(),
            return_type: nullable.strip_nullable().clone(),
            kind: MethodKind::Ordinary,
            is_static: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_keyword_names() {
        assert_eq!(Type::nullable(Type::Int32).to_string(), "int?");
        assert_eq!(Type::tuple([Type::Int32, Type::String]).to_string(), "(int, string)");
        assert_eq!(Type::array(Type::Char).to_string(), "char[]");
        let named = Type::Tuple(vec![TupleElement { name: Some("a".into()), ty: Type::Int64 }]);
        assert_eq!(named.to_string(), "(long a)");
    }

    #[test]
    fn tuple_names_do_not_affect_identity() {
        let plain = Type::tuple([Type::Int32]);
        let named = Type::Tuple(vec![TupleElement { name: Some("x".into()), ty: Type::Int32 }]);
        assert_eq!(plain, named);
    }

    #[test]
    fn tuple_members_by_position_and_name() {
        let table = TypeTable::new();
        let ty = Type::Tuple(vec![
            TupleElement { name: None, ty: Type::Int32 },
            TupleElement { name: Some("label".into()), ty: Type::String },
        ]);
        match table.lookup_member(&ty, "Item1") {
            Some(MemberSymbol::Field(f)) => assert_eq!(f.ty, Type::Int32),
            other => panic!("unexpected {:?}", other),
        }
        match table.lookup_member(&ty, "label") {
            Some(MemberSymbol::Field(f)) => assert_eq!(f.name, "Item2"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.lookup_member(&ty, "Item3").is_none());
    }

    #[test]
    fn members_are_inherited() {
        let mut table = TypeTable::new();
        let base = table.define("Base", TypeDefKind::Class);
        table.add_property(base, "Count", Type::Int32);
        let derived = table.define("Derived", TypeDefKind::Class);
        table.set_base(derived, table.named(base));

        let derived_ty = table.named(derived);
        assert!(table.lookup_length(&derived_ty).is_some());
        assert!(table.is_implicitly_convertible(&derived_ty, &table.named(base)));
        assert!(!table.is_implicitly_convertible(&table.named(base), &derived_ty));
    }

    #[test]
    fn conversions() {
        let table = TypeTable::new();
        assert!(table.is_implicitly_convertible(&Type::Int32, &Type::nullable(Type::Int64)));
        assert!(table.is_implicitly_convertible(&Type::Int32, &Type::Object));
        assert!(!table.is_implicitly_convertible(&Type::Int64, &Type::Int32));
        assert!(!table.is_implicitly_convertible(&Type::nullable(Type::Int32), &Type::Int32));
    }

    #[test]
    fn switch_expression_exception_carries_value() {
        let table = TypeTable::new();
        let ty = table.well_known(WellKnownType::SwitchExpressionException);
        let ctor = table.constructor(&ty, 1).expect("constructor");
        assert_eq!(ctor.parameters[0].ty, Type::Object);
        assert!(table.is_implicitly_convertible(&ty, &table.well_known(WellKnownType::Exception)));
    }

    #[test]
    fn arrays_enumerate_through_ienumerable() {
        let table = TypeTable::new();
        let info = table.foreach_enumerator(&Type::array(Type::Int32)).expect("enumerable");
        assert_eq!(info.get_enumerator.containing, table.well_known(WellKnownType::IEnumerable));
        assert_eq!(info.enumerator_type(), &table.well_known(WellKnownType::IEnumerator));
        assert_eq!(info.current.ty, Type::Object);
        assert!(!table.is_disposable(info.enumerator_type()));
        assert!(table.foreach_enumerator(&Type::Int32).is_none());
    }

    #[test]
    fn enumerators_found_by_pattern_are_disposable_through_their_base() {
        let mut table = TypeTable::new();
        let enumerator = table.define("Enumerator", TypeDefKind::Class);
        table.set_base(enumerator, table.well_known(WellKnownType::IDisposable));
        table.add_method(enumerator, "MoveNext", vec![], Type::Bool);
        table.add_property(enumerator, "Current", Type::Int32);
        let list = table.define("List", TypeDefKind::Class);
        let enumerator_ty = table.named(enumerator);
        table.add_method(list, "GetEnumerator", vec![], enumerator_ty.clone());

        let info = table.foreach_enumerator(&table.named(list)).expect("enumerable");
        assert_eq!(info.enumerator_type(), &enumerator_ty);
        assert_eq!(info.current.ty, Type::Int32);
        assert!(table.is_disposable(&enumerator_ty));
    }

    #[test]
    fn monitor_enter_takes_the_flag_by_reference() {
        let table = TypeTable::new();
        let enter = table.well_known_method(WellKnownMethod::MonitorEnter);
        assert!(enter.is_static);
        assert_eq!(enter.to_string(), "void System.Threading.Monitor.Enter(object obj, ref bool lockTaken)");
        let monitor = table.well_known(WellKnownType::Monitor);
        assert_eq!(table.lookup_method(&monitor, "Exit", 1).map(|m| m.is_static), Some(true));
    }

    #[test]
    fn builtin_list_members() {
        let table = TypeTable::new();
        let ints = Type::array(Type::Int32);
        assert_eq!(table.lookup_indexer(&ints).map(|p| p.ty), Some(Type::Int32));
        assert_eq!(table.lookup_slice(&Type::String).map(|m| m.name), Some("Substring".to_string()));
        assert!(table.lookup_length(&Type::Int32).is_none());
    }
}
