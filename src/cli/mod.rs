//! CLI support for dynq
//!
//! Provides programmatic access to the `check` and `query` commands so they
//! can be driven without going through argument parsing.

mod check;
mod convert;
mod query;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{Schema, infer_type, json_to_value, value_to_json};
pub use query::{QueryOptions, execute_query};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No input provided
    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,

    #[error("Unknown type '{0}' in schema")]
    UnknownType(String),

    #[error("Invalid schema entry '{0}', expected Name:Type")]
    InvalidSchema(String),

    /// JSON value that does not fit the declared type
    #[error("Cannot read {0} as '{1}'")]
    Mismatch(String, String),
}

impl From<crate::QueryError> for CliError {
    fn from(e: crate::QueryError) -> Self {
        match e {
            crate::QueryError::Parse(e) => CliError::Parse(e),
            crate::QueryError::Eval(e) => CliError::Eval(e),
        }
    }
}
