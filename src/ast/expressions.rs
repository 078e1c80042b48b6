use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::ast::{AggregateMethod, BinaryOp, UnaryOp};
use crate::record::RecordType;
use crate::types::{MethodDef, PropertyDef, Type};
use crate::value::Value;

static NEXT_PARAMETER: AtomicU64 = AtomicU64::new(1);

/// A node of the compiled expression tree together with its static type.
///
/// Trees are built bottom-up by the parser; every node is fully type-resolved
/// by the time it is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Constant value
    ///
    /// # Examples
    /// ```text
    /// 42
    /// "hello"
    /// true
    /// ```
    Literal(Literal),

    /// Reference to a lambda parameter, including the implicit `it`
    Parameter(Parameter),

    /// Property or field read. `instance` is `None` for static members.
    ///
    /// # Examples
    /// ```text
    /// Name
    /// it.Address.City
    /// Int32.MaxValue
    /// ```
    Member {
        instance: Option<Box<Expr>>,
        declaring: Type,
        property: Arc<PropertyDef>,
    },

    /// Method, constructor or indexer call
    ///
    /// # Examples
    /// ```text
    /// Name.StartsWith("A")
    /// Math.Abs(Balance)
    /// DateTime(2024, 1, 31)
    /// ```
    Call {
        instance: Option<Box<Expr>>,
        method: Arc<MethodDef>,
        args: Vec<Expr>,
    },

    /// Single-dimension array element
    ///
    /// # Example
    /// ```text
    /// Scores[0]
    /// ```
    Index { array: Box<Expr>, index: Box<Expr> },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Unary { op: UnaryOp, operand: Box<Expr> },

    /// `test ? if_true : if_false`, `iif(test, if_true, if_false)`
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },

    /// Conversion to this node's type. Explicit numeric conversions are
    /// checked for overflow.
    Convert { operand: Box<Expr>, checked: bool },

    /// Call of a lambda supplied as an external value
    Invoke { lambda: Box<Lambda>, args: Vec<Expr> },

    /// Sequence operation with an optional per-element lambda
    ///
    /// # Examples
    /// ```text
    /// Orders.Any()
    /// Orders.Where(Total > 100)
    /// Lines.Sum(Quantity * Price)
    /// ```
    Aggregate {
        source: Box<Expr>,
        method: AggregateMethod,
        selector: Option<Box<Lambda>>,
    },

    /// Projection into a generated record type, one binding per field in
    /// field order
    ///
    /// # Example
    /// ```text
    /// new(Name, Age * 12 as Months)
    /// ```
    New {
        record: Arc<RecordType>,
        bindings: Vec<Expr>,
    },
}

/// Constant plus the source text it was written as, when it came straight
/// from a literal token. The text allows re-parsing at a different type.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
    pub text: Option<String>,
}

/// A lambda parameter. Each parameter gets a unique id so nested scopes can
/// be told apart during evaluation; equality only compares name and type.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub id: u64,
}

impl Parameter {
    pub fn new(name: &str, ty: Type) -> Self {
        Parameter {
            name: name.to_string(),
            ty,
            id: NEXT_PARAMETER.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// Unnamed parameter that becomes `it`.
    pub fn it(ty: Type) -> Self {
        Self::new("", ty)
    }

    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }

    pub fn to_expr(&self) -> Expr {
        Expr {
            kind: ExprKind::Parameter(self.clone()),
            ty: self.ty.clone(),
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameters: Vec<Parameter>,
    pub body: Expr,
}

impl Lambda {
    pub fn new(parameters: Vec<Parameter>, body: Expr) -> Self {
        Lambda { parameters, body }
    }

    /// Type of the lambda's result.
    pub fn return_type(&self) -> &Type {
        &self.body.ty
    }
}

/// One key of a parsed ordering list.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub selector: Expr,
    pub ascending: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    /// Literal that remembers its source text.
    pub fn literal(value: Value, text: &str) -> Self {
        let ty = value.type_of();
        Expr::new(
            ExprKind::Literal(Literal {
                value,
                text: Some(text.to_string()),
            }),
            ty,
        )
    }

    /// Constant of the given type with no source text.
    pub fn constant(value: Value, ty: Type) -> Self {
        Expr::new(ExprKind::Literal(Literal { value, text: None }), ty)
    }

    /// The `null` keyword: an untyped null that may become any reference or
    /// nullable type.
    pub fn null_literal() -> Self {
        Expr::new(
            ExprKind::Literal(Literal {
                value: Value::Null,
                text: Some("null".to_string()),
            }),
            Type::Object,
        )
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            &self.kind,
            ExprKind::Literal(Literal { value: Value::Null, text: Some(_) })
        ) && self.ty == Type::Object
    }

    /// Source text if this node is an unmodified literal.
    pub fn literal_text(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Literal(literal) => literal.text.as_deref(),
            _ => None,
        }
    }

    pub fn convert(self, ty: Type) -> Self {
        Expr::new(
            ExprKind::Convert {
                operand: Box::new(self),
                checked: false,
            },
            ty,
        )
    }

    pub fn convert_checked(self, ty: Type) -> Self {
        Expr::new(
            ExprKind::Convert {
                operand: Box::new(self),
                checked: true,
            },
            ty,
        )
    }

    /// Member name when this node is a property or field read.
    pub fn member_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Member { property, .. } => Some(&property.name),
            _ => None,
        }
    }
}

// ============================================================================
// Display
// ============================================================================

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Null => f.write_str("null"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Boolean(b) => write!(f, "{}", b),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unnamed() {
            f.write_str("it")
        } else {
            f.write_str(&self.name)
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameters.as_slice() {
            [single] => write!(f, "{} => {}", single, self.body),
            parameters => {
                f.write_str("(")?;
                write_list(f, parameters)?;
                write!(f, ") => {}", self.body)
            }
        }
    }
}

impl fmt::Display for Expr {
    /// Renders the tree with every binary operation parenthesized, so the
    /// grouping chosen by the parser is visible.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(literal) => write!(f, "{}", literal),
            ExprKind::Parameter(parameter) => write!(f, "{}", parameter),
            ExprKind::Member {
                instance,
                declaring,
                property,
            } => match instance {
                Some(instance) => write!(f, "{}.{}", instance, property.name),
                None => write!(f, "{}.{}", declaring, property.name),
            },
            ExprKind::Call {
                instance,
                method,
                args,
            } => {
                match instance {
                    Some(instance) if method.name == "get_Item" => {
                        write!(f, "{}[", instance)?;
                        write_list(f, args)?;
                        return f.write_str("]");
                    }
                    Some(instance) => write!(f, "{}.{}(", instance, method.name)?,
                    None if method.name == MethodDef::CONSTRUCTOR => {
                        write!(f, "new {}(", method.declaring)?
                    }
                    None => write!(f, "{}.{}(", method.declaring, method.name)?,
                }
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Index { array, index } => write!(f, "{}[{}]", array, index),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "IIF({}, {}, {})", test, if_true, if_false),
            ExprKind::Convert { operand, .. } => write!(f, "Convert({}, {})", operand, self.ty),
            ExprKind::Invoke { lambda, args } => {
                write!(f, "Invoke({}", lambda)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                f.write_str(")")
            }
            ExprKind::Aggregate {
                source,
                method,
                selector,
            } => match selector {
                Some(selector) => write!(f, "{}.{}({})", source, method, selector),
                None => write!(f, "{}.{}()", source, method),
            },
            ExprKind::New { record, bindings } => {
                write!(f, "new {}(", record.name())?;
                for (i, (name, binding)) in record.names().zip(bindings).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", name, binding)?;
                }
                f.write_str(")")
            }
        }
    }
}
