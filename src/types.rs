//! # Type descriptors
//!
//! Every node of a compiled tree carries a [`Type`]. The set is closed over the
//! predefined primitives, with four open-ended forms supplied by the embedding
//! application or minted during compilation:
//!
//! - [`Type::Enum`]: a host enum with an integral underlying type
//! - [`Type::Class`]: a host class or interface described in a [`TypeRegistry`]
//! - [`Type::Array`] / [`Type::Sequence`]: `T[]` and `IEnumerable<T>`
//! - [`Type::Record`]: a projection shape produced by `new(...)`
//!
//! Numeric classification and the implicit widening table live in
//! [`crate::promote`]; this module only answers structural questions.

pub mod builtins;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::record::RecordType;

pub use registry::{Getter, Invoker, MethodDef, ParamDef, PropertyDef, TypeDef, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Object,
    Boolean,
    Char,
    String,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    /// Static holder of math functions (`Math.Abs(x)`)
    Math,
    /// Static holder of conversion functions (`Convert.ToInt32(x)`)
    Convert,

    /// `T?` over a value type
    Nullable(Box<Type>),
    Enum(Arc<EnumType>),
    /// Host class or interface, looked up by name in the registry
    Class(Arc<str>),
    Array(Box<Type>),
    /// `IEnumerable<T>`
    Sequence(Box<Type>),
    Record(Arc<RecordType>),
}

/// Underlying primitive code of a type, with enums unwrapped to their
/// underlying integral type and nullables to their value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Object,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    String,
}

/// Coarse numeric classification used for overload tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    None,
    /// `Char`, `Single`, `Double`, `Decimal`
    Real,
    Signed,
    Unsigned,
}

/// A host enum: a named set of integral constants.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: String,
    pub underlying: Type,
    pub members: Vec<(String, i64)>,
}

impl EnumType {
    /// Creates an enum backed by `Int32`.
    pub fn new<N: Into<String>>(name: &str, members: impl IntoIterator<Item = (N, i64)>) -> Self {
        Self::with_underlying(name, Type::Int32, members)
    }

    pub fn with_underlying<N: Into<String>>(
        name: &str,
        underlying: Type,
        members: impl IntoIterator<Item = (N, i64)>,
    ) -> Self {
        EnumType {
            name: name.to_string(),
            underlying,
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// Finds a member by name, ignoring letter case.
    pub fn member(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Name of the first member holding `value`.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

impl Type {
    /// Wraps a host enum definition.
    pub fn enumeration(def: EnumType) -> Type {
        Type::Enum(Arc::new(def))
    }

    pub fn class(name: &str) -> Type {
        Type::Class(Arc::from(name))
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn sequence(element: Type) -> Type {
        Type::Sequence(Box::new(element))
    }

    /// `T?`. Nullable and reference types are returned unchanged.
    pub fn nullable(self) -> Type {
        if self.is_value_type() && !self.is_nullable() {
            Type::Nullable(Box::new(self))
        } else {
            self
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// The `T` of `T?`, or the type itself.
    pub fn non_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            Type::Object
                | Type::String
                | Type::Math
                | Type::Convert
                | Type::Class(_)
                | Type::Array(_)
                | Type::Sequence(_)
                | Type::Record(_)
        )
    }

    /// True for enums and nullable enums.
    pub fn is_enum(&self) -> bool {
        matches!(self.non_nullable(), Type::Enum(_))
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumType>> {
        match self.non_nullable() {
            Type::Enum(def) => Some(def),
            _ => None,
        }
    }

    /// Element type of an array or sequence.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element) | Type::Sequence(element) => Some(element),
            _ => None,
        }
    }

    pub fn type_code(&self) -> TypeCode {
        match self.non_nullable() {
            Type::Boolean => TypeCode::Boolean,
            Type::Char => TypeCode::Char,
            Type::SByte => TypeCode::SByte,
            Type::Byte => TypeCode::Byte,
            Type::Int16 => TypeCode::Int16,
            Type::UInt16 => TypeCode::UInt16,
            Type::Int32 => TypeCode::Int32,
            Type::UInt32 => TypeCode::UInt32,
            Type::Int64 => TypeCode::Int64,
            Type::UInt64 => TypeCode::UInt64,
            Type::Single => TypeCode::Single,
            Type::Double => TypeCode::Double,
            Type::Decimal => TypeCode::Decimal,
            Type::DateTime => TypeCode::DateTime,
            Type::String => TypeCode::String,
            Type::Enum(def) => def.underlying.type_code(),
            _ => TypeCode::Object,
        }
    }

    /// Enums (and nullable enums) are not numeric.
    pub fn numeric_kind(&self) -> NumericKind {
        if self.is_enum() {
            return NumericKind::None;
        }
        match self.type_code() {
            TypeCode::Char | TypeCode::Single | TypeCode::Double | TypeCode::Decimal => {
                NumericKind::Real
            }
            TypeCode::SByte | TypeCode::Int16 | TypeCode::Int32 | TypeCode::Int64 => {
                NumericKind::Signed
            }
            TypeCode::Byte | TypeCode::UInt16 | TypeCode::UInt32 | TypeCode::UInt64 => {
                NumericKind::Unsigned
            }
            _ => NumericKind::None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_kind() != NumericKind::None
    }

    pub fn is_signed_integral(&self) -> bool {
        self.numeric_kind() == NumericKind::Signed
    }

    pub fn is_unsigned_integral(&self) -> bool {
        self.numeric_kind() == NumericKind::Unsigned
    }

    /// Whether the type is one of the keyword-accessible predefined types.
    pub fn is_predefined(&self) -> bool {
        builtins::PREDEFINED_TYPES.contains(self)
    }

    /// Simple type name without nullable decoration.
    pub fn name(&self) -> String {
        match self {
            Type::Object => "Object".to_string(),
            Type::Boolean => "Boolean".to_string(),
            Type::Char => "Char".to_string(),
            Type::String => "String".to_string(),
            Type::SByte => "SByte".to_string(),
            Type::Byte => "Byte".to_string(),
            Type::Int16 => "Int16".to_string(),
            Type::UInt16 => "UInt16".to_string(),
            Type::Int32 => "Int32".to_string(),
            Type::UInt32 => "UInt32".to_string(),
            Type::Int64 => "Int64".to_string(),
            Type::UInt64 => "UInt64".to_string(),
            Type::Single => "Single".to_string(),
            Type::Double => "Double".to_string(),
            Type::Decimal => "Decimal".to_string(),
            Type::DateTime => "DateTime".to_string(),
            Type::DateTimeOffset => "DateTimeOffset".to_string(),
            Type::TimeSpan => "TimeSpan".to_string(),
            Type::Guid => "Guid".to_string(),
            Type::Math => "Math".to_string(),
            Type::Convert => "Convert".to_string(),
            Type::Nullable(inner) => inner.name(),
            Type::Enum(def) => def.name.clone(),
            Type::Class(name) => name.to_string(),
            Type::Array(element) => format!("{}[]", element),
            Type::Sequence(element) => format!("IEnumerable<{}>", element),
            Type::Record(record) => record.name().to_string(),
        }
    }
}

impl fmt::Display for Type {
    /// Renders `Int32?` for nullables, as error messages quote them.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nullable(inner) => write!(f, "{}?", inner.name()),
            other => f.write_str(&other.name()),
        }
    }
}

/// Parses a type name such as `Int32`, `String?`, `Double[]` or
/// `IEnumerable<Int32>` against the predefined types and the registry.
pub fn parse_type_name(name: &str, registry: &TypeRegistry) -> Option<Type> {
    let name = name.trim();
    if let Some(inner) = name.strip_suffix("[]") {
        return parse_type_name(inner, registry).map(Type::array);
    }
    if let Some(inner) = name.strip_suffix('?') {
        let inner = parse_type_name(inner, registry)?;
        return (inner.is_value_type() && !inner.is_nullable()).then(|| inner.nullable());
    }
    if let Some(inner) = name
        .strip_prefix("IEnumerable<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return parse_type_name(inner, registry).map(Type::sequence);
    }
    builtins::predefined_type(name).or_else(|| registry.lookup(name))
}
