// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Constant folding over `ConstValue`s.
//!
//! Every function returns `None` when the result is not a compile-time
//! constant: overflow, division by zero, or an unsupported operand mix.

use opflow_bound::{BinaryOp, ConstValue, Type, TypeTable, UnaryOp};

pub fn fold_unary(op: UnaryOp, operand: &ConstValue) -> Option<ConstValue> {
    match (op, operand) {
        (UnaryOp::Plus, ConstValue::Int32(_) | ConstValue::Int64(_) | ConstValue::Double(_)) => {
            Some(operand.clone())
        }
        (UnaryOp::Plus, ConstValue::Char(c)) => Some(ConstValue::Int32(*c as i32)),
        (UnaryOp::Minus, ConstValue::Int32(v)) => v.checked_neg().map(ConstValue::Int32),
        (UnaryOp::Minus, ConstValue::Int64(v)) => v.checked_neg().map(ConstValue::Int64),
        (UnaryOp::Minus, ConstValue::Double(v)) => Some(ConstValue::Double(-v)),
        (UnaryOp::Minus, ConstValue::Char(c)) => Some(ConstValue::Int32(-(*c as i32))),
        (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (UnaryOp::BitwiseNot, ConstValue::Int32(v)) => Some(ConstValue::Int32(!v)),
        (UnaryOp::BitwiseNot, ConstValue::Int64(v)) => Some(ConstValue::Int64(!v)),
        _ => None,
    }
}

/// Numeric operands after the usual promotions.
enum Promoted {
    Int32(i32, i32),
    Int64(i64, i64),
    Double(f64, f64),
}

fn promote(left: &ConstValue, right: &ConstValue) -> Option<Promoted> {
    fn as_i64(v: &ConstValue) -> Option<i64> {
        match v {
            ConstValue::Char(c) => Some(*c as i64),
            ConstValue::Int32(v) => Some(*v as i64),
            ConstValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
    fn as_f64(v: &ConstValue) -> Option<f64> {
        match v {
            ConstValue::Double(d) => Some(*d),
            other => as_i64(other).map(|i| i as f64),
        }
    }
    let is_narrow = |v: &ConstValue| matches!(v, ConstValue::Char(_) | ConstValue::Int32(_));
    if matches!(left, ConstValue::Double(_)) || matches!(right, ConstValue::Double(_)) {
        return Some(Promoted::Double(as_f64(left)?, as_f64(right)?));
    }
    let (l, r) = (as_i64(left)?, as_i64(right)?);
    if is_narrow(left) && is_narrow(right) {
        Some(Promoted::Int32(l as i32, r as i32))
    } else {
        Some(Promoted::Int64(l, r))
    }
}

pub fn fold_binary(op: BinaryOp, left: &ConstValue, right: &ConstValue) -> Option<ConstValue> {
    match (left, right) {
        (ConstValue::Bool(l), ConstValue::Bool(r)) => {
            let value = match op {
                BinaryOp::And => l & r,
                BinaryOp::Or => l | r,
                BinaryOp::ExclusiveOr => l ^ r,
                BinaryOp::Equals => l == r,
                BinaryOp::NotEquals => l != r,
                _ => return None,
            };
            return Some(ConstValue::Bool(value));
        }
        (ConstValue::String(l), ConstValue::String(r)) => {
            return match op {
                BinaryOp::Add => Some(ConstValue::String(format!("{}{}", l, r))),
                BinaryOp::Equals => Some(ConstValue::Bool(l == r)),
                BinaryOp::NotEquals => Some(ConstValue::Bool(l != r)),
                _ => None,
            };
        }
        (ConstValue::Null, ConstValue::Null) => {
            return match op {
                BinaryOp::Equals => Some(ConstValue::Bool(true)),
                BinaryOp::NotEquals => Some(ConstValue::Bool(false)),
                _ => None,
            };
        }
        _ => {}
    }

    match promote(left, right)? {
        Promoted::Int32(l, r) => match op {
            BinaryOp::Add => l.checked_add(r).map(ConstValue::Int32),
            BinaryOp::Subtract => l.checked_sub(r).map(ConstValue::Int32),
            BinaryOp::Multiply => l.checked_mul(r).map(ConstValue::Int32),
            BinaryOp::Divide => l.checked_div(r).map(ConstValue::Int32),
            BinaryOp::Remainder => l.checked_rem(r).map(ConstValue::Int32),
            BinaryOp::LeftShift => Some(ConstValue::Int32(l.wrapping_shl((r & 31) as u32))),
            BinaryOp::RightShift => Some(ConstValue::Int32(l.wrapping_shr((r & 31) as u32))),
            BinaryOp::And => Some(ConstValue::Int32(l & r)),
            BinaryOp::Or => Some(ConstValue::Int32(l | r)),
            BinaryOp::ExclusiveOr => Some(ConstValue::Int32(l ^ r)),
            _ => compare(op, l.partial_cmp(&r)),
        },
        Promoted::Int64(l, r) => match op {
            BinaryOp::Add => l.checked_add(r).map(ConstValue::Int64),
            BinaryOp::Subtract => l.checked_sub(r).map(ConstValue::Int64),
            BinaryOp::Multiply => l.checked_mul(r).map(ConstValue::Int64),
            BinaryOp::Divide => l.checked_div(r).map(ConstValue::Int64),
            BinaryOp::Remainder => l.checked_rem(r).map(ConstValue::Int64),
            BinaryOp::LeftShift => Some(ConstValue::Int64(l.wrapping_shl((r & 63) as u32))),
            BinaryOp::RightShift => Some(ConstValue::Int64(l.wrapping_shr((r & 63) as u32))),
            BinaryOp::And => Some(ConstValue::Int64(l & r)),
            BinaryOp::Or => Some(ConstValue::Int64(l | r)),
            BinaryOp::ExclusiveOr => Some(ConstValue::Int64(l ^ r)),
            _ => compare(op, l.partial_cmp(&r)),
        },
        Promoted::Double(l, r) => match op {
            BinaryOp::Add => Some(ConstValue::Double(l + r)),
            BinaryOp::Subtract => Some(ConstValue::Double(l - r)),
            BinaryOp::Multiply => Some(ConstValue::Double(l * r)),
            BinaryOp::Divide => Some(ConstValue::Double(l / r)),
            BinaryOp::Remainder => Some(ConstValue::Double(l % r)),
            BinaryOp::Equals => Some(ConstValue::Bool(l == r)),
            BinaryOp::NotEquals => Some(ConstValue::Bool(l != r)),
            _ => compare(op, l.partial_cmp(&r)),
        },
    }
}

fn compare(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> Option<ConstValue> {
    use std::cmp::Ordering::*;
    let value = match (op, ordering) {
        (BinaryOp::Equals, o) => o == Some(Equal),
        (BinaryOp::NotEquals, o) => o != Some(Equal),
        (BinaryOp::LessThan, o) => o == Some(Less),
        (BinaryOp::LessThanOrEqual, o) => matches!(o, Some(Less | Equal)),
        (BinaryOp::GreaterThan, o) => o == Some(Greater),
        (BinaryOp::GreaterThanOrEqual, o) => matches!(o, Some(Greater | Equal)),
        _ => return None,
    };
    Some(ConstValue::Bool(value))
}

/// Constant conversion to `target`. Conversions to `T?` and `object` are
/// never constant except for `null` itself.
pub fn fold_conversion(value: &ConstValue, target: &Type, checked: bool) -> Option<ConstValue> {
    let integral = |v: &ConstValue| -> Option<i64> {
        match v {
            ConstValue::Char(c) => Some(*c as i64),
            ConstValue::Int32(i) => Some(*i as i64),
            ConstValue::Int64(i) => Some(*i),
            ConstValue::Double(d) if d.is_finite() => Some(d.trunc() as i64),
            _ => None,
        }
    };
    match (value, target) {
        (ConstValue::Null, Type::Nullable(_) | Type::String | Type::Object | Type::Array(_) | Type::Named(_)) => {
            Some(ConstValue::Null)
        }
        (ConstValue::Bool(_), Type::Bool) | (ConstValue::String(_), Type::String) => Some(value.clone()),
        (_, Type::Int32) => {
            let v = integral(value)?;
            match i32::try_from(v) {
                Ok(i) => Some(ConstValue::Int32(i)),
                Err(_) if !checked => Some(ConstValue::Int32(v as i32)),
                Err(_) => None,
            }
        }
        (_, Type::Int64) => integral(value).map(ConstValue::Int64),
        (_, Type::Char) => {
            let v = integral(value)?;
            u32::try_from(v).ok().and_then(char::from_u32).map(ConstValue::Char)
        }
        (ConstValue::Double(d), Type::Double) => Some(ConstValue::Double(*d)),
        (_, Type::Double) => integral(value).map(|i| ConstValue::Double(i as f64)),
        _ => None,
    }
}

/// Value of `default(T)` when it is a constant.
pub fn default_constant(ty: &Type, types: &TypeTable) -> Option<ConstValue> {
    match ty {
        Type::Bool => Some(ConstValue::Bool(false)),
        Type::Char => Some(ConstValue::Char('\0')),
        Type::Int32 => Some(ConstValue::Int32(0)),
        Type::Int64 => Some(ConstValue::Int64(0)),
        Type::Double => Some(ConstValue::Double(0.0)),
        Type::Nullable(_) => Some(ConstValue::Null),
        _ if !types.is_value_type(ty) && !ty.is_error() => Some(ConstValue::Null),
        _ => None,
    }
}
