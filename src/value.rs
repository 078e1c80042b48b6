use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use uuid::Uuid;

use crate::error::EvalError;
use crate::record::RecordType;
use crate::types::{EnumType, Type, TypeCode};

/// A runtime value produced by evaluating a compiled expression.
///
/// Each predefined type has its own variant so that a value always knows the
/// exact width it was computed at; `Int32(1)` and `Int64(1)` are different
/// values.
///
/// # Examples
///
/// ```
/// use dynq::Value;
///
/// let age = Value::Int32(42);
/// let name = Value::from("Aaron");
/// let nothing = Value::Null;
///
/// assert_eq!(age.to_string(), "42");
/// assert_eq!(name.as_str(), Some("Aaron"));
/// assert!(nothing.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value of a nullable or reference type
    Null,

    Boolean(bool),
    Char(char),
    String(String),

    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),

    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(Duration),
    Guid(Uuid),

    /// Enum constant stored as its underlying integral value
    Enum(Arc<EnumType>, i64),

    /// Elements of an array or sequence
    List(Vec<Value>),

    /// Instance of a projection record
    Record(RecordValue),

    /// Instance of a host class: named fields read by registered properties
    Object(ObjectValue),
}

/// Field values of a projection record, positioned by its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub ty: Arc<RecordType>,
    pub cells: Vec<Value>,
}

impl RecordValue {
    /// A record with every field set to null.
    pub fn new(ty: Arc<RecordType>) -> Self {
        let cells = vec![Value::Null; ty.len()];
        RecordValue { ty, cells }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.index_of(name).and_then(|i| self.cells.get(i))
    }

    /// Sets a field by name; returns false when the shape has no such field.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.ty.index_of(name) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }
}

impl Hash for RecordValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.cells.hash(state);
    }
}

/// Host object: a class name plus its field values.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ObjectValue {
    pub class: String,
    pub fields: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn new(class: &str) -> Self {
        ObjectValue {
            class: class.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// Integral, floating or decimal magnitude used while converting between
/// numeric widths.
#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i128),
    Float(f64),
    Decimal(Decimal),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of the value. Null has no type of its own and reports
    /// `Object`.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::Object,
            Value::Boolean(_) => Type::Boolean,
            Value::Char(_) => Type::Char,
            Value::String(_) => Type::String,
            Value::SByte(_) => Type::SByte,
            Value::Byte(_) => Type::Byte,
            Value::Int16(_) => Type::Int16,
            Value::UInt16(_) => Type::UInt16,
            Value::Int32(_) => Type::Int32,
            Value::UInt32(_) => Type::UInt32,
            Value::Int64(_) => Type::Int64,
            Value::UInt64(_) => Type::UInt64,
            Value::Single(_) => Type::Single,
            Value::Double(_) => Type::Double,
            Value::Decimal(_) => Type::Decimal,
            Value::DateTime(_) => Type::DateTime,
            Value::DateTimeOffset(_) => Type::DateTimeOffset,
            Value::TimeSpan(_) => Type::TimeSpan,
            Value::Guid(_) => Type::Guid,
            Value::Enum(def, _) => Type::Enum(def.clone()),
            Value::List(items) => {
                let element = items
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Value::type_of)
                    .unwrap_or(Type::Object);
                Type::array(element)
            }
            Value::Record(record) => Type::Record(record.ty.clone()),
            Value::Object(object) => Type::class(&object.class),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral view of any integral value, enum or char.
    pub fn as_int(&self) -> Option<i128> {
        match self.number()? {
            Number::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Floating view of any numeric value.
    pub fn as_float(&self) -> Option<f64> {
        match self.number()? {
            Number::Integer(n) => Some(n as f64),
            Number::Float(f) => Some(f),
            Number::Decimal(d) => d.to_f64(),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.number()? {
            Number::Integer(n) => Decimal::from_i128(n),
            Number::Float(f) => Decimal::from_f64(f),
            Number::Decimal(d) => Some(d),
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Named field of a record or host object.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Record(record) => record.get(name).cloned(),
            Value::Object(object) => object
                .fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn number(&self) -> Option<Number> {
        let number = match self {
            Value::Char(c) => Number::Integer(*c as i128),
            Value::SByte(n) => Number::Integer(*n as i128),
            Value::Byte(n) => Number::Integer(*n as i128),
            Value::Int16(n) => Number::Integer(*n as i128),
            Value::UInt16(n) => Number::Integer(*n as i128),
            Value::Int32(n) => Number::Integer(*n as i128),
            Value::UInt32(n) => Number::Integer(*n as i128),
            Value::Int64(n) => Number::Integer(*n as i128),
            Value::UInt64(n) => Number::Integer(*n as i128),
            Value::Enum(_, n) => Number::Integer(*n as i128),
            Value::Single(f) => Number::Float(*f as f64),
            Value::Double(f) => Number::Float(*f),
            Value::Decimal(d) => Number::Decimal(*d),
            _ => return None,
        };
        Some(number)
    }

    /// Converts to `target`. With `checked`, narrowing that loses magnitude is
    /// an overflow error; otherwise integral narrowing wraps.
    pub fn convert(&self, target: &Type, checked: bool) -> Result<Value, EvalError> {
        if self.is_null() {
            return if target.is_value_type() && !target.is_nullable() {
                Err(EvalError::NullReference(target.to_string()))
            } else {
                Ok(Value::Null)
            };
        }
        let target = target.non_nullable();
        if !target.is_value_type() {
            return Ok(self.clone());
        }
        if self.type_of() == *target {
            return Ok(self.clone());
        }
        if let Type::Enum(def) = target {
            let underlying = self.convert(&def.underlying, checked)?;
            let value = underlying
                .as_int()
                .ok_or_else(|| mismatch(self, target))? as i64;
            return Ok(Value::Enum(def.clone(), value));
        }
        let number = self.number().ok_or_else(|| mismatch(self, target))?;
        from_number(number, target, checked)
    }

    /// Ordering between values of the same comparable type. Strings compare
    /// ordinally.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::TimeSpan(a), Value::TimeSpan(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            _ => match (self.number()?, other.number()?) {
                (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
                (Number::Decimal(a), Number::Decimal(b)) => Some(a.cmp(&b)),
                (a, b) => number_as_float(a).partial_cmp(&number_as_float(b)),
            },
        }
    }
}

fn number_as_float(number: Number) -> f64 {
    match number {
        Number::Integer(n) => n as f64,
        Number::Float(f) => f,
        Number::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
    }
}

fn mismatch(value: &Value, target: &Type) -> EvalError {
    EvalError::TypeError(format!(
        "cannot convert a value of type '{}' to '{}'",
        value.type_of(),
        target
    ))
}

fn from_number(number: Number, target: &Type, checked: bool) -> Result<Value, EvalError> {
    match target.type_code() {
        TypeCode::Single => Ok(Value::Single(number_as_float(number) as f32)),
        TypeCode::Double => Ok(Value::Double(number_as_float(number))),
        TypeCode::Decimal => {
            let decimal = match number {
                Number::Integer(n) => Decimal::from_i128(n),
                Number::Float(f) => Decimal::from_f64(f),
                Number::Decimal(d) => Some(d),
            };
            decimal.map(Value::Decimal).ok_or(EvalError::Overflow)
        }
        code => {
            let integer = match number {
                Number::Integer(n) => n,
                Number::Float(f) => {
                    if checked && !(f.is_finite() && f.trunc().abs() < 1e38) {
                        return Err(EvalError::Overflow);
                    }
                    f.trunc() as i128
                }
                Number::Decimal(d) => d.trunc().to_i128().ok_or(EvalError::Overflow)?,
            };
            integral(integer, code, checked).ok_or(EvalError::Overflow)
        }
    }
}

/// Narrows an integer to the width named by `code`.
fn integral(n: i128, code: TypeCode, checked: bool) -> Option<Value> {
    macro_rules! narrow {
        ($variant:ident, $ty:ty) => {
            if checked {
                <$ty>::try_from(n).ok().map(Value::$variant)
            } else {
                Some(Value::$variant(n as $ty))
            }
        };
    }
    match code {
        TypeCode::SByte => narrow!(SByte, i8),
        TypeCode::Byte => narrow!(Byte, u8),
        TypeCode::Int16 => narrow!(Int16, i16),
        TypeCode::UInt16 => narrow!(UInt16, u16),
        TypeCode::Int32 => narrow!(Int32, i32),
        TypeCode::UInt32 => narrow!(UInt32, u32),
        TypeCode::Int64 => narrow!(Int64, i64),
        TypeCode::UInt64 => narrow!(UInt64, u64),
        TypeCode::Char => {
            let code = if checked { u16::try_from(n).ok()? } else { n as u16 };
            char::from_u32(code as u32).map(Value::Char)
        }
        _ => None,
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Char(c) => c.hash(state),
            Value::String(s) => s.hash(state),
            Value::SByte(n) => n.hash(state),
            Value::Byte(n) => n.hash(state),
            Value::Int16(n) => n.hash(state),
            Value::UInt16(n) => n.hash(state),
            Value::Int32(n) => n.hash(state),
            Value::UInt32(n) => n.hash(state),
            Value::Int64(n) => n.hash(state),
            Value::UInt64(n) => n.hash(state),
            Value::Single(f) => f.to_bits().hash(state),
            Value::Double(f) => f.to_bits().hash(state),
            Value::Decimal(d) => d.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::DateTimeOffset(d) => d.hash(state),
            Value::TimeSpan(d) => d.hash(state),
            Value::Guid(g) => g.hash(state),
            Value::Enum(def, n) => {
                def.name.hash(state);
                n.hash(state);
            }
            Value::List(items) => items.hash(state),
            Value::Record(record) => record.hash(state),
            Value::Object(object) => object.hash(state),
        }
    }
}

impl fmt::Display for Value {
    /// Formats the way the value's own string conversion would.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => f.write_str(s),
            Value::SByte(n) => write!(f, "{}", n),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::UInt16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::UInt32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::UInt64(n) => write!(f, "{}", n),
            Value::Single(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::DateTime(d) => write!(f, "{}", d.format("%m/%d/%Y %H:%M:%S")),
            Value::DateTimeOffset(d) => write!(f, "{}", d.format("%m/%d/%Y %H:%M:%S %:z")),
            Value::TimeSpan(d) => format_time_span(f, d),
            Value::Guid(g) => write!(f, "{}", g.hyphenated()),
            Value::Enum(def, n) => match def.name_of(*n) {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", n),
            },
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(record) => {
                f.write_str("{")?;
                for (i, (name, value)) in record.ty.names().zip(&record.cells).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                f.write_str("}")
            }
            Value::Object(object) => f.write_str(&object.class),
        }
    }
}

/// `[-][d.]hh:mm:ss[.fffffff]`
fn format_time_span(f: &mut fmt::Formatter<'_>, span: &Duration) -> fmt::Result {
    let negative = *span < Duration::zero();
    let span = if negative { -*span } else { *span };
    let days = span.num_days();
    let hours = span.num_hours() % 24;
    let minutes = span.num_minutes() % 60;
    let seconds = span.num_seconds() % 60;
    let ticks = span.subsec_nanos() / 100;
    if negative {
        f.write_str("-")?;
    }
    if days > 0 {
        write!(f, "{}.", days)?;
    }
    write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)?;
    if ticks > 0 {
        write!(f, ".{:07}", ticks)?;
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectValue> for Value {
    fn from(object: ObjectValue) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
