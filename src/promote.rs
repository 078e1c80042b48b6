//! Implicit conversions.
//!
//! [`Promoter::promote`] answers "can this expression be used where a value
//! of type T is expected, and what does it look like there?". Literals are
//! special: an integer literal keeps its source text, so `300` can become a
//! `Int16` or `Decimal` constant by re-reading the digits rather than by
//! converting an `Int32` at run time. Text that does not fit the target type
//! makes the promotion fail; it is never truncated. A one-character literal
//! written in single quotes is a `Char` that still reads as a `String` where
//! text is expected.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::{Expr, ExprKind};
use crate::types::{Type, TypeCode, TypeRegistry};
use crate::value::Value;

pub struct Promoter<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Promoter<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Promoter { registry }
    }

    /// Returns `expr` as an expression of type `ty`, or `None` when no
    /// implicit conversion exists.
    ///
    /// A widening to a value type gets an explicit `Convert` node. With
    /// `exact`, so does a reference conversion; otherwise reference types are
    /// passed through unchanged.
    pub fn promote(&self, expr: &Expr, ty: &Type, exact: bool) -> Option<Expr> {
        if expr.ty == *ty {
            return Some(expr.clone());
        }
        if let ExprKind::Literal(literal) = &expr.kind {
            if expr.is_null_literal() {
                if !ty.is_value_type() || ty.is_nullable() {
                    return Some(Expr::constant(Value::Null, ty.clone()));
                }
            } else if let Some(text) = &literal.text {
                let target = ty.non_nullable();
                let value = match expr.ty {
                    Type::Int32 | Type::UInt32 | Type::Int64 | Type::UInt64 => {
                        parse_number(text, target)
                    }
                    Type::Double if *target == Type::Decimal => parse_number(text, target),
                    Type::String => parse_enum(text, target),
                    Type::Char if *target == Type::String => Some(Value::String(text.clone())),
                    _ => None,
                };
                if let Some(value) = value {
                    return Some(Expr::constant(value, ty.clone()));
                }
            }
        }
        if self.is_compatible_with(&expr.ty, ty) {
            if ty.is_value_type() || exact {
                return Some(expr.clone().convert(ty.clone()));
            }
            return Some(expr.clone());
        }
        None
    }

    /// Implicit convertibility between types.
    ///
    /// Reference targets accept anything assignable to them. Value targets
    /// follow the numeric widening lattice; a nullable source never converts
    /// implicitly to a non-nullable target, while the reverse always may.
    pub fn is_compatible_with(&self, source: &Type, target: &Type) -> bool {
        if source == target {
            return true;
        }
        if !target.is_value_type() {
            return self.registry.is_assignable(target, source);
        }
        let st = source.non_nullable();
        let tt = target.non_nullable();
        if st != source && tt == target {
            return false;
        }
        let code = |t: &Type| if t.is_enum() { TypeCode::Object } else { t.type_code() };
        let tc = code(tt);
        use TypeCode::*;
        match code(st) {
            SByte => matches!(tc, SByte | Int16 | Int32 | Int64 | Single | Double | Decimal),
            Byte => matches!(
                tc,
                Byte | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
            ),
            Int16 => matches!(tc, Int16 | Int32 | Int64 | Single | Double | Decimal),
            UInt16 => matches!(
                tc,
                UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
            ),
            Int32 => matches!(tc, Int32 | Int64 | Single | Double | Decimal),
            UInt32 => matches!(tc, UInt32 | Int64 | UInt64 | Single | Double | Decimal),
            Int64 => matches!(tc, Int64 | Single | Double | Decimal),
            UInt64 => matches!(tc, UInt64 | Single | Double | Decimal),
            Single => matches!(tc, Single | Double),
            _ => st == tt,
        }
    }
}

/// Reads numeric literal text as a value of `target`. Integer literals may
/// also name an enum constant by its underlying value.
pub fn parse_number(text: &str, target: &Type) -> Option<Value> {
    let target = target.non_nullable();
    if let Type::Enum(def) = target {
        let value = parse_number(text, &def.underlying)?.as_int()?;
        return Some(Value::Enum(def.clone(), i64::try_from(value).ok()?));
    }
    let value = match target {
        Type::SByte => Value::SByte(text.parse().ok()?),
        Type::Byte => Value::Byte(text.parse().ok()?),
        Type::Int16 => Value::Int16(text.parse().ok()?),
        Type::UInt16 => Value::UInt16(text.parse().ok()?),
        Type::Int32 => Value::Int32(text.parse().ok()?),
        Type::UInt32 => Value::UInt32(text.parse().ok()?),
        Type::Int64 => Value::Int64(text.parse().ok()?),
        Type::UInt64 => Value::UInt64(text.parse().ok()?),
        Type::Single => Value::Single(text.parse().ok()?),
        Type::Double => Value::Double(text.parse().ok()?),
        Type::Decimal => Value::Decimal(
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .ok()?,
        ),
        _ => return None,
    };
    Some(value)
}

/// Reads `name` as a member of `target` when it is an enum, ignoring case.
pub fn parse_enum(name: &str, target: &Type) -> Option<Value> {
    let def = target.as_enum()?;
    let value = def.member(name)?;
    Some(Value::Enum(def.clone(), value))
}
