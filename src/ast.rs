//! # Expression tree
//!
//! The parser turns text such as
//!
//! ```text
//! Age > 30 and Name like "A*"
//! ```
//!
//! into a typed tree of [`Expr`] nodes. Unlike a plain syntax tree, every node
//! is already bound: member reads point at a registered property, calls at the
//! chosen overload, and implicit widenings show up as explicit `Convert` nodes.
//!
//! ## Submodules
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Tree nodes, lambdas and ordering keys
//! - **[operators]** - Binary, unary and aggregate operators
//!
//! ## Grammar, lowest precedence first
//!
//! ```text
//! ternary        := logicalOr ('?' ternary ':' ternary)?
//! logicalOr      := logicalAnd (('||' | 'or') logicalAnd)*
//! logicalAnd     := comparison (('&&' | 'and') comparison)*
//! comparison     := additive (relOp additive)*
//! additive       := multiplicative (('+' | '-' | '&') multiplicative)*
//! multiplicative := unary (('*' | '/' | '%' | 'mod') unary)*
//! unary          := ('-' | '!' | 'not') unary | primary
//! primary        := primaryStart ('.' member | '[' args ']')*
//! primaryStart   := identifier | string | integer | real | '(' ternary ')'
//! ```
//!
//! where `relOp` is one of `like = == != <> > >= < <=`.
//!
//! ## Scopes
//!
//! A lambda with a single unnamed parameter exposes it as `it`, and bare
//! identifiers fall back to members of `it`:
//!
//! ```text
//! Orders.Where(Total > 100).Count()   // Total is a member of each order
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, ExprKind, Lambda, Literal, Ordering, Parameter};
pub use operators::{AggregateMethod, BinaryOp, UnaryOp};
pub use tokens::{Token, TokenKind};
