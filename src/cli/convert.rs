//! JSON <-> dynq Value conversion utilities

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::CliError;
use crate::types::parse_type_name;
use crate::{ObjectValue, Type, TypeDef, TypeRegistry, Value};

/// Fields of the host class that JSON rows are read as.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<(String, Type)>,
}

impl Schema {
    /// Parses `Name:String, Age:Int32?`, or a JSON object mapping field
    /// names to type names, against the registry's types.
    pub fn parse(text: &str, registry: &TypeRegistry) -> Result<Self, CliError> {
        if text.trim_start().starts_with('{') {
            return Self::from_json(&serde_json::from_str(text)?, registry);
        }
        let mut fields = Vec::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, ty) = entry
                .split_once(':')
                .ok_or_else(|| CliError::InvalidSchema(entry.to_string()))?;
            let ty = parse_type_name(ty, registry).ok_or_else(|| CliError::UnknownType(ty.trim().to_string()))?;
            fields.push((name.trim().to_string(), ty));
        }
        Ok(Schema { fields })
    }

    fn from_json(schema: &serde_json::Value, registry: &TypeRegistry) -> Result<Self, CliError> {
        let serde_json::Value::Object(entries) = schema else {
            return Err(CliError::InvalidSchema(schema.to_string()));
        };
        let mut fields = Vec::with_capacity(entries.len());
        for (name, ty) in entries {
            let ty = ty
                .as_str()
                .ok_or_else(|| CliError::InvalidSchema(format!("{}: {}", name, ty)))?;
            let ty = parse_type_name(ty, registry).ok_or_else(|| CliError::UnknownType(ty.to_string()))?;
            fields.push((name.clone(), ty));
        }
        Ok(Schema { fields })
    }

    /// Field types guessed from one JSON object.
    pub fn infer(row: &serde_json::Value) -> Self {
        let fields = match row {
            serde_json::Value::Object(obj) => obj.iter().map(|(k, v)| (k.clone(), infer_type(v))).collect(),
            _ => Vec::new(),
        };
        Schema { fields }
    }

    /// Registers the schema as class `name`.
    pub fn register(&self, registry: &mut TypeRegistry, name: &str) -> Type {
        let def = self
            .fields
            .iter()
            .fold(TypeDef::class(name), |def, (field, ty)| def.property(field, ty.clone()));
        registry.register(def)
    }
}

/// Narrowest type that holds a JSON value.
pub fn infer_type(v: &serde_json::Value) -> Type {
    match v {
        serde_json::Value::Bool(_) => Type::Boolean,
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => Type::Int32,
            Some(_) => Type::Int64,
            None => Type::Double,
        },
        serde_json::Value::String(_) => Type::String,
        serde_json::Value::Array(arr) => Type::array(arr.first().map(infer_type).unwrap_or(Type::Object)),
        serde_json::Value::Null | serde_json::Value::Object(_) => Type::Object,
    }
}

fn mismatch(v: &serde_json::Value, ty: &Type) -> CliError {
    CliError::Mismatch(v.to_string(), ty.to_string())
}

/// Convert serde_json::Value to a dynq Value of type `ty`
pub fn json_to_value(v: &serde_json::Value, ty: &Type, registry: &TypeRegistry) -> Result<Value, CliError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let target = ty.non_nullable();
    match (v, target) {
        (serde_json::Value::Bool(b), Type::Boolean) => Ok(Value::Boolean(*b)),
        (serde_json::Value::String(s), Type::String) => Ok(Value::String(s.clone())),
        (serde_json::Value::String(s), Type::Char) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(mismatch(v, target)),
            }
        }
        (serde_json::Value::String(s), Type::DateTime) => NaiveDateTime::from_str(s)
            .map(Value::DateTime)
            .map_err(|_| mismatch(v, target)),
        (serde_json::Value::String(s), Type::DateTimeOffset) => DateTime::parse_from_rfc3339(s)
            .map(Value::DateTimeOffset)
            .map_err(|_| mismatch(v, target)),
        (serde_json::Value::String(s), Type::Guid) => Uuid::parse_str(s)
            .map(Value::Guid)
            .map_err(|_| mismatch(v, target)),
        (serde_json::Value::String(s), Type::Enum(def)) => def
            .member(s)
            .map(|n| Value::Enum(def.clone(), n))
            .ok_or_else(|| mismatch(v, target)),
        (serde_json::Value::Number(n), Type::Decimal) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Value::Decimal)
            .map_err(|_| mismatch(v, target)),
        (serde_json::Value::Number(n), Type::Single | Type::Double) => {
            let f = n.as_f64().ok_or_else(|| mismatch(v, target))?;
            Ok(Value::Double(f).convert(target, false)?)
        }
        (serde_json::Value::Number(n), target) if target.is_numeric() || target.is_enum() => {
            let number = match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int64(i),
                (None, Some(u)) => Value::UInt64(u),
                _ => return Err(mismatch(v, target)),
            };
            number.convert(target, true).map_err(|_| mismatch(v, target))
        }
        (serde_json::Value::Array(arr), Type::Array(element) | Type::Sequence(element)) => arr
            .iter()
            .map(|item| json_to_value(item, element, registry))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (serde_json::Value::Object(obj), Type::Class(name)) => {
            let def = registry.definition(target);
            let mut object = ObjectValue::new(name);
            for (key, item) in obj {
                let field_ty = def
                    .and_then(|d| d.properties.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
                    .map(|p| p.ty.clone())
                    .unwrap_or_else(|| infer_type(item));
                object = object.with(key, json_to_value(item, &field_ty, registry)?);
            }
            Ok(Value::Object(object))
        }
        (_, Type::Object) => json_to_value(v, &infer_type(v), registry),
        _ => Err(mismatch(v, target)),
    }
}

/// Convert a dynq Value to serde_json::Value
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::SByte(n) => (*n).into(),
        Value::Byte(n) => (*n).into(),
        Value::Int16(n) => (*n).into(),
        Value::UInt16(n) => (*n).into(),
        Value::Int32(n) => (*n).into(),
        Value::UInt32(n) => (*n).into(),
        Value::Int64(n) => (*n).into(),
        Value::UInt64(n) => (*n).into(),
        Value::Single(f) => serde_json::Number::from_f64(*f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::DateTime(d) => serde_json::Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Value::DateTimeOffset(d) => serde_json::Value::String(d.to_rfc3339()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Record(record) => serde_json::Value::Object(
            record
                .ty
                .names()
                .zip(&record.cells)
                .map(|(k, v)| (k.to_string(), value_to_json(v)))
                .collect(),
        ),
        Value::Object(object) => serde_json::Value::Object(
            object
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        // Decimal keeps its exact digits as text
        other => serde_json::Value::String(other.to_string()),
    }
}
