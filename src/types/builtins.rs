//! Members of the predefined types.
//!
//! The catalog is built once on first use and never changes afterwards.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use regex::RegexBuilder;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::registry::{MethodDef, TypeDef, TypeKind};
use super::Type;
use crate::error::EvalError;
use crate::promote::parse_number;
use crate::value::Value;

/// Types reachable by name from an expression, in keyword-table order.
pub const PREDEFINED_TYPES: [Type; 21] = [
    Type::Object,
    Type::Boolean,
    Type::Char,
    Type::String,
    Type::SByte,
    Type::Byte,
    Type::Int16,
    Type::UInt16,
    Type::Int32,
    Type::UInt32,
    Type::Int64,
    Type::UInt64,
    Type::Single,
    Type::Double,
    Type::Decimal,
    Type::DateTime,
    Type::DateTimeOffset,
    Type::TimeSpan,
    Type::Guid,
    Type::Math,
    Type::Convert,
];

static CATALOG: LazyLock<HashMap<Type, TypeDef>> = LazyLock::new(|| {
    let defs = vec![
        object_def(),
        string_def(),
        numeric_def(Type::SByte),
        numeric_def(Type::Byte),
        numeric_def(Type::Int16),
        numeric_def(Type::UInt16),
        numeric_def(Type::Int32),
        numeric_def(Type::UInt32),
        numeric_def(Type::Int64),
        numeric_def(Type::UInt64),
        numeric_def(Type::Single),
        numeric_def(Type::Double),
        numeric_def(Type::Decimal),
        math_def(),
        convert_def(),
        date_time_def(),
        time_span_def(),
        guid_def(),
        predefined(Type::Boolean),
        predefined(Type::Char),
        predefined(Type::DateTimeOffset),
    ];
    defs.into_iter().map(|def| (def.ty.clone(), def)).collect()
});

/// Predefined type named `name`, ignoring letter case.
pub fn predefined_type(name: &str) -> Option<Type> {
    PREDEFINED_TYPES
        .iter()
        .find(|ty| ty.name().eq_ignore_ascii_case(name))
        .cloned()
}

pub fn definition(ty: &Type) -> Option<&'static TypeDef> {
    CATALOG.get(ty)
}

/// Static method of a predefined type with exactly the given parameter types.
pub(crate) fn static_method(ty: &Type, name: &str, params: &[Type]) -> Option<Arc<MethodDef>> {
    definition(ty)?
        .methods
        .iter()
        .find(|m| {
            m.is_static
                && m.name == name
                && m.params.len() == params.len()
                && m.params.iter().zip(params).all(|(p, t)| p.ty == *t)
        })
        .cloned()
}

fn predefined(ty: Type) -> TypeDef {
    TypeDef::of(ty, TypeKind::Class).predefined()
}

// ============================================================================
// Argument helpers
// ============================================================================

fn text(value: &Value) -> Result<&str, EvalError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Err(EvalError::NullReference("String".to_string())),
        other => Err(EvalError::TypeError(format!("expected String, got {}", other.type_of()))),
    }
}

fn this_text(this: Option<&Value>) -> Result<&str, EvalError> {
    this.map_or(Err(EvalError::NullReference("String".to_string())), text)
}

fn int(value: &Value) -> Result<i32, EvalError> {
    value
        .as_int()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| EvalError::TypeError(format!("expected Int32, got {}", value.type_of())))
}

fn float(value: &Value) -> Result<f64, EvalError> {
    value
        .as_float()
        .ok_or_else(|| EvalError::TypeError(format!("expected Double, got {}", value.type_of())))
}

fn decimal(value: &Value) -> Result<Decimal, EvalError> {
    value
        .as_decimal()
        .ok_or_else(|| EvalError::TypeError(format!("expected Decimal, got {}", value.type_of())))
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

// ============================================================================
// Object and String
// ============================================================================

fn object_def() -> TypeDef {
    predefined(Type::Object)
        .method("ToString", [] as [Type; 0], Some(Type::String), |this, _| {
            Ok(Value::String(this.map(Value::to_string).unwrap_or_default()))
        })
        .method("Equals", [Type::Object], Some(Type::Boolean), |this, args| {
            Ok(Value::Boolean(this == Some(&args[0])))
        })
}

/// Ordinal comparison with null ordered first, as `String.Compare` does.
pub(crate) fn compare_strings(left: &Value, right: &Value) -> i32 {
    match left.compare(right) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Greater) => 1,
        _ => 0,
    }
}

/// Matches `input` against a wildcard pattern where `*` stands for any run of
/// characters and `?` for exactly one, ignoring letter case.
pub fn like(input: &str, pattern: &str) -> Result<bool, EvalError> {
    let body = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    let regex = RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| EvalError::Host(e.to_string()))?;
    Ok(regex.is_match(input))
}

fn string_def() -> TypeDef {
    predefined(Type::String)
        .computed_property("Length", Type::Int32, |this| {
            Ok(Value::Int32(text(this)?.chars().count() as i32))
        })
        .method("Contains", [Type::String], Some(Type::Boolean), |this, args| {
            Ok(Value::Boolean(this_text(this)?.contains(text(&args[0])?)))
        })
        .method("StartsWith", [Type::String], Some(Type::Boolean), |this, args| {
            Ok(Value::Boolean(this_text(this)?.starts_with(text(&args[0])?)))
        })
        .method("EndsWith", [Type::String], Some(Type::Boolean), |this, args| {
            Ok(Value::Boolean(this_text(this)?.ends_with(text(&args[0])?)))
        })
        .method("IndexOf", [Type::String], Some(Type::Int32), |this, args| {
            let haystack = this_text(this)?;
            let index = haystack
                .find(text(&args[0])?)
                .map_or(-1, |byte| haystack[..byte].chars().count() as i32);
            Ok(Value::Int32(index))
        })
        .method("ToUpper", [] as [Type; 0], Some(Type::String), |this, _| {
            Ok(Value::String(this_text(this)?.to_uppercase()))
        })
        .method("ToLower", [] as [Type; 0], Some(Type::String), |this, _| {
            Ok(Value::String(this_text(this)?.to_lowercase()))
        })
        .method("Trim", [] as [Type; 0], Some(Type::String), |this, _| {
            Ok(Value::String(this_text(this)?.trim().to_string()))
        })
        .method("Substring", [Type::Int32], Some(Type::String), |this, args| {
            let chars = chars(this_text(this)?);
            let start = int(&args[0])?;
            if start < 0 || start as usize > chars.len() {
                return Err(EvalError::IndexOutOfRange(start as i64));
            }
            Ok(Value::String(chars[start as usize..].iter().collect()))
        })
        .method("Substring", [Type::Int32, Type::Int32], Some(Type::String), |this, args| {
            let chars = chars(this_text(this)?);
            let (start, length) = (int(&args[0])?, int(&args[1])?);
            let end = start as i64 + length as i64;
            if start < 0 || length < 0 || end > chars.len() as i64 {
                return Err(EvalError::IndexOutOfRange(end));
            }
            Ok(Value::String(chars[start as usize..end as usize].iter().collect()))
        })
        .method("Replace", [Type::String, Type::String], Some(Type::String), |this, args| {
            let replaced = this_text(this)?.replace(text(&args[0])?, text(&args[1])?);
            Ok(Value::String(replaced))
        })
        .static_method("Compare", [Type::String, Type::String], Some(Type::Int32), |args| {
            Ok(Value::Int32(compare_strings(&args[0], &args[1])))
        })
        .static_method("Concat", [Type::String, Type::String], Some(Type::String), |args| {
            Ok(Value::String(format!("{}{}", args[0], args[1])))
        })
        .static_method("Concat", [Type::Object, Type::Object], Some(Type::String), |args| {
            Ok(Value::String(format!("{}{}", args[0], args[1])))
        })
        .static_method("IsNullOrEmpty", [Type::String], Some(Type::Boolean), |args| {
            Ok(Value::Boolean(args[0].as_str().is_none_or(str::is_empty)))
        })
        .static_method("Like", [Type::String, Type::String], Some(Type::Boolean), |args| {
            match (&args[0], &args[1]) {
                (Value::String(input), Value::String(pattern)) => {
                    Ok(Value::Boolean(like(input, pattern)?))
                }
                _ => Ok(Value::Boolean(false)),
            }
        })
}

// ============================================================================
// Numbers
// ============================================================================

fn numeric_bounds(ty: &Type) -> (Value, Value) {
    match ty {
        Type::SByte => (Value::SByte(i8::MIN), Value::SByte(i8::MAX)),
        Type::Byte => (Value::Byte(u8::MIN), Value::Byte(u8::MAX)),
        Type::Int16 => (Value::Int16(i16::MIN), Value::Int16(i16::MAX)),
        Type::UInt16 => (Value::UInt16(u16::MIN), Value::UInt16(u16::MAX)),
        Type::Int32 => (Value::Int32(i32::MIN), Value::Int32(i32::MAX)),
        Type::UInt32 => (Value::UInt32(u32::MIN), Value::UInt32(u32::MAX)),
        Type::Int64 => (Value::Int64(i64::MIN), Value::Int64(i64::MAX)),
        Type::UInt64 => (Value::UInt64(u64::MIN), Value::UInt64(u64::MAX)),
        Type::Single => (Value::Single(f32::MIN), Value::Single(f32::MAX)),
        Type::Double => (Value::Double(f64::MIN), Value::Double(f64::MAX)),
        _ => (Value::Decimal(Decimal::MIN), Value::Decimal(Decimal::MAX)),
    }
}

fn numeric_def(ty: Type) -> TypeDef {
    let (min, max) = numeric_bounds(&ty);
    let target = ty.clone();
    predefined(ty.clone())
        .static_property("MinValue", ty.clone(), move || Ok(min.clone()))
        .static_property("MaxValue", ty.clone(), move || Ok(max.clone()))
        .static_method("Parse", [Type::String], Some(ty), move |args| {
            let s = text(&args[0])?;
            parse_number(s.trim(), &target).ok_or_else(|| EvalError::InvalidFormat(s.to_string()))
        })
}

fn math_def() -> TypeDef {
    let mut def = predefined(Type::Math)
        .static_method("Abs", [Type::Int32], Some(Type::Int32), |args| {
            int(&args[0])?.checked_abs().map(Value::Int32).ok_or(EvalError::Overflow)
        })
        .static_method("Abs", [Type::Int64], Some(Type::Int64), |args| match &args[0] {
            Value::Int64(n) => n.checked_abs().map(Value::Int64).ok_or(EvalError::Overflow),
            other => Err(EvalError::TypeError(format!("expected Int64, got {}", other.type_of()))),
        })
        .static_method("Abs", [Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.abs()))
        })
        .static_method("Abs", [Type::Decimal], Some(Type::Decimal), |args| {
            Ok(Value::Decimal(decimal(&args[0])?.abs()))
        })
        .static_method("Round", [Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.round_ties_even()))
        })
        .static_method("Round", [Type::Decimal], Some(Type::Decimal), |args| {
            Ok(Value::Decimal(decimal(&args[0])?.round()))
        })
        .static_method("Round", [Type::Double, Type::Int32], Some(Type::Double), |args| {
            let scale = 10f64.powi(int(&args[1])?);
            Ok(Value::Double((float(&args[0])? * scale).round_ties_even() / scale))
        })
        .static_method("Round", [Type::Decimal, Type::Int32], Some(Type::Decimal), |args| {
            let digits = u32::try_from(int(&args[1])?).map_err(|_| EvalError::Overflow)?;
            Ok(Value::Decimal(decimal(&args[0])?.round_dp(digits)))
        })
        .static_method("Floor", [Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.floor()))
        })
        .static_method("Floor", [Type::Decimal], Some(Type::Decimal), |args| {
            Ok(Value::Decimal(decimal(&args[0])?.floor()))
        })
        .static_method("Ceiling", [Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.ceil()))
        })
        .static_method("Ceiling", [Type::Decimal], Some(Type::Decimal), |args| {
            Ok(Value::Decimal(decimal(&args[0])?.ceil()))
        })
        .static_method("Sqrt", [Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.sqrt()))
        })
        .static_method("Pow", [Type::Double, Type::Double], Some(Type::Double), |args| {
            Ok(Value::Double(float(&args[0])?.powf(float(&args[1])?)))
        });

    for name in ["Min", "Max"] {
        let pick = move |a: &Value, b: &Value| {
            let first_wins = match a.compare(b) {
                Some(Ordering::Less) => name == "Min",
                _ => name == "Max",
            };
            if first_wins { a.clone() } else { b.clone() }
        };
        for ty in [Type::Int32, Type::Int64, Type::Double, Type::Decimal] {
            def = def.static_method(name, [ty.clone(), ty.clone()], Some(ty), move |args| {
                Ok(pick(&args[0], &args[1]))
            });
        }
    }
    def
}

/// `Convert.ToXxx`: strings are parsed, reals are rounded half to even
/// before narrowing to an integer, and overflow is an error.
fn convert_value(value: &Value, target: &Type) -> Result<Value, EvalError> {
    match value {
        Value::String(s) => {
            parse_number(s.trim(), target).ok_or_else(|| EvalError::InvalidFormat(s.clone()))
        }
        Value::Single(_) | Value::Double(_) if target.is_signed_integral() => {
            Value::Double(float(value)?.round_ties_even()).convert(target, true)
        }
        Value::Decimal(d) if target.is_signed_integral() => {
            Value::Decimal(d.round()).convert(target, true)
        }
        Value::Boolean(b) => Value::Int32(*b as i32).convert(target, true),
        other => other.convert(target, true),
    }
}

fn convert_def() -> TypeDef {
    let mut def = predefined(Type::Convert);
    for (name, target) in [
        ("ToInt32", Type::Int32),
        ("ToInt64", Type::Int64),
        ("ToDouble", Type::Double),
        ("ToDecimal", Type::Decimal),
    ] {
        def = def.static_method(name, [Type::Object], Some(target.clone()), move |args| {
            convert_value(&args[0], &target)
        });
    }
    def.static_method("ToString", [Type::Object], Some(Type::String), |args| {
        Ok(Value::String(args[0].to_string()))
    })
}

// ============================================================================
// Dates, durations and identifiers
// ============================================================================

fn duration_from(amount: f64, unit_millis: f64) -> Result<Duration, EvalError> {
    let millis = (amount * unit_millis).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(EvalError::Overflow);
    }
    Duration::try_milliseconds(millis as i64).ok_or(EvalError::Overflow)
}

const MILLIS_PER_SECOND: f64 = 1_000.0;
const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

const UNITS: [(&str, f64); 4] = [
    ("Days", MILLIS_PER_DAY),
    ("Hours", MILLIS_PER_HOUR),
    ("Minutes", MILLIS_PER_MINUTE),
    ("Seconds", MILLIS_PER_SECOND),
];

fn date_time_def() -> TypeDef {
    fn make(parts: &[Value]) -> Result<Value, EvalError> {
        let mut fields = [0i32; 6];
        for (field, value) in fields.iter_mut().zip(parts) {
            *field = int(value)?;
        }
        let [year, month, day, hour, minute, second] = fields.map(|f| f.max(0) as u32);
        let date = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second));
        match date {
            Some(date) => Ok(Value::DateTime(date)),
            None => Err(EvalError::Host(
                "Year, Month, and Day parameters describe an un-representable DateTime".to_string(),
            )),
        }
    }

    fn component(value: &Value, pick: fn(&chrono::NaiveDateTime) -> i32) -> Result<Value, EvalError> {
        match value {
            Value::DateTime(d) => Ok(Value::Int32(pick(d))),
            other => Err(EvalError::TypeError(format!("expected DateTime, got {}", other.type_of()))),
        }
    }

    let mut def = predefined(Type::DateTime)
        .constructor([Type::Int32, Type::Int32, Type::Int32], make)
        .constructor(vec![Type::Int32; 6], make)
        .computed_property("Year", Type::Int32, |v| component(v, |d| d.year()))
        .computed_property("Month", Type::Int32, |v| component(v, |d| d.month() as i32))
        .computed_property("Day", Type::Int32, |v| component(v, |d| d.day() as i32))
        .computed_property("Hour", Type::Int32, |v| component(v, |d| d.hour() as i32))
        .computed_property("Minute", Type::Int32, |v| component(v, |d| d.minute() as i32))
        .computed_property("Second", Type::Int32, |v| component(v, |d| d.second() as i32));

    for (unit, millis) in UNITS {
        def = def.method(&format!("Add{}", unit), [Type::Double], Some(Type::DateTime), move |this, args| {
            let span = duration_from(float(&args[0])?, millis)?;
            match this {
                Some(Value::DateTime(d)) => d
                    .checked_add_signed(span)
                    .map(Value::DateTime)
                    .ok_or(EvalError::Overflow),
                _ => Err(EvalError::NullReference(format!("Add{}", unit))),
            }
        });
    }
    def
}

fn time_span_def() -> TypeDef {
    fn make(parts: &[Value]) -> Result<Value, EvalError> {
        let (days, rest) = if parts.len() == 4 { (int(&parts[0])?, &parts[1..]) } else { (0, parts) };
        let seconds = days as i64 * 86_400
            + int(&rest[0])? as i64 * 3_600
            + int(&rest[1])? as i64 * 60
            + int(&rest[2])? as i64;
        Duration::try_seconds(seconds)
            .map(Value::TimeSpan)
            .ok_or(EvalError::Overflow)
    }

    fn span(value: &Value) -> Result<Duration, EvalError> {
        match value {
            Value::TimeSpan(d) => Ok(*d),
            other => Err(EvalError::TypeError(format!("expected TimeSpan, got {}", other.type_of()))),
        }
    }

    let mut def = predefined(Type::TimeSpan)
        .constructor(vec![Type::Int32; 3], make)
        .constructor(vec![Type::Int32; 4], make)
        .computed_property("Days", Type::Int32, |v| Ok(Value::Int32(span(v)?.num_days() as i32)))
        .computed_property("Hours", Type::Int32, |v| {
            Ok(Value::Int32((span(v)?.num_hours() % 24) as i32))
        })
        .computed_property("Minutes", Type::Int32, |v| {
            Ok(Value::Int32((span(v)?.num_minutes() % 60) as i32))
        })
        .computed_property("Seconds", Type::Int32, |v| {
            Ok(Value::Int32((span(v)?.num_seconds() % 60) as i32))
        });

    for (unit, millis) in UNITS {
        def = def
            .computed_property(&format!("Total{}", unit), Type::Double, move |v| {
                let d = span(v)?;
                let total = d.num_seconds() as f64 * MILLIS_PER_SECOND
                    + d.subsec_nanos() as f64 / 1_000_000.0;
                Ok(Value::Double(total / millis))
            })
            .static_method(&format!("From{}", unit), [Type::Double], Some(Type::TimeSpan), move |args| {
                duration_from(float(&args[0])?, millis).map(Value::TimeSpan)
            });
    }
    def
}

fn guid_def() -> TypeDef {
    fn parse(args: &[Value]) -> Result<Value, EvalError> {
        let s = text(&args[0])?;
        Uuid::parse_str(s.trim())
            .map(Value::Guid)
            .map_err(|_| EvalError::InvalidFormat(s.to_string()))
    }

    predefined(Type::Guid)
        .constructor([Type::String], parse)
        .static_method("Parse", [Type::String], Some(Type::Guid), parse)
}
