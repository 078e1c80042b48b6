//! # dynq
//!
//! Compiles query expressions written as text (filters, projections and
//! sort keys) into typed expression trees over host types described in a
//! [`TypeRegistry`], and evaluates them over runtime [`Value`]s.
//!
//! ```
//! use dynq::{Evaluator, ExpressionCompiler, ObjectValue, Type, TypeDef, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! let person = registry.register(
//!     TypeDef::class("Person")
//!         .property("Name", Type::String)
//!         .property("Age", Type::Int32),
//! );
//!
//! let filter = ExpressionCompiler::new(&registry)
//!     .parse_lambda_with_it(&person, Some(&Type::Boolean), "Age >= 18 && Name.StartsWith(\"A\")", &[])
//!     .unwrap();
//!
//! let aaron = ObjectValue::new("Person").with("Name", "Aaron").with("Age", 42);
//! let result = Evaluator::new().invoke(&filter, &[aaron.into()]).unwrap();
//! assert_eq!(result, Value::Boolean(true));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod overload;
pub mod parser;
pub mod promote;
pub mod queryable;
pub mod record;
pub mod signatures;
pub mod symbols;
pub mod types;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{AggregateMethod, BinaryOp, Expr, ExprKind, Lambda, Ordering, Parameter, Token, TokenKind, UnaryOp};
pub use error::{ErrorKind, EvalError, ParseError, QueryError};
pub use evaluator::{EvalContext, Evaluator};
pub use lexer::Lexer;
pub use parser::ExpressionCompiler;
pub use queryable::Query;
pub use record::{RecordFactory, RecordType, Signature};
pub use symbols::Binding;
pub use types::{EnumType, MethodDef, ParamDef, PropertyDef, Type, TypeDef, TypeRegistry};
pub use value::{ObjectValue, RecordValue, Value};
