// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Compile-time constant values.

use std::fmt;

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstValue {
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
}

impl ConstValue {
    /// The natural type of the constant. `null` has none.
    pub fn natural_type(&self) -> Option<Type> {
        match self {
            ConstValue::Null => None,
            ConstValue::Bool(_) => Some(Type::Bool),
            ConstValue::Char(_) => Some(Type::Char),
            ConstValue::Int32(_) => Some(Type::Int32),
            ConstValue::Int64(_) => Some(Type::Int64),
            ConstValue::Double(_) => Some(Type::Double),
            ConstValue::String(_) => Some(Type::String),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConstValue::Null)
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Bool(true) => write!(f, "True"),
            ConstValue::Bool(false) => write!(f, "False"),
            ConstValue::Char(c) => write!(f, "{}", c),
            ConstValue::Int32(v) => write!(f, "{}", v),
            ConstValue::Int64(v) => write!(f, "{}", v),
            ConstValue::Double(v) => write!(f, "{}", v),
            ConstValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(ConstValue::Bool(true).to_string(), "True");
        assert_eq!(ConstValue::Int32(-3).to_string(), "-3");
        assert_eq!(ConstValue::String("a".into()).to_string(), "\"a\"");
        assert_eq!(ConstValue::Null.to_string(), "null");
    }

    #[test]
    fn natural_types() {
        assert_eq!(ConstValue::Int64(1).natural_type(), Some(Type::Int64));
        assert_eq!(ConstValue::Null.natural_type(), None);
    }
}
