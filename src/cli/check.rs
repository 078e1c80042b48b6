//! Compile an expression and evaluate it against JSON input

use super::{CliError, Schema, json_to_value, value_to_json};
use crate::types::parse_type_name;
use crate::{Evaluator, ExpressionCompiler, Type, TypeRegistry};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to compile
    pub expression: String,
    /// JSON object bound to `it`, or an array of them checked one by one
    pub input: Option<String>,
    /// `Name:Type` list or JSON object describing `it`; inferred from the
    /// input when absent
    pub schema: Option<String>,
    /// Type the expression must promote to
    pub result_type: Option<String>,
    /// Only compile, don't evaluate
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// The expression compiled; carries the rendered tree and its type
    SyntaxValid { tree: String, ty: Type },
    /// Expression evaluated successfully with JSON output
    Success(serde_json::Value),
}

/// Execute a dynq check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let input: Option<serde_json::Value> = options
        .input
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    // An array input is checked element by element
    let rows = match &input {
        Some(serde_json::Value::Array(rows)) => Some(rows.as_slice()),
        Some(row) => Some(std::slice::from_ref(row)),
        None => None,
    };

    let mut registry = TypeRegistry::new();
    let schema = match (&options.schema, rows.and_then(|rows| rows.first())) {
        (Some(text), _) => Schema::parse(text, &registry)?,
        (None, Some(row)) => Schema::infer(row),
        (None, None) => Schema::default(),
    };
    let schema_type = schema.register(&mut registry, "Row");
    let result_type = options
        .result_type
        .as_deref()
        .map(|name| parse_type_name(name, &registry).ok_or_else(|| CliError::UnknownType(name.to_string())))
        .transpose()?;

    let lambda = ExpressionCompiler::new(&registry).parse_lambda_with_it(
        &schema_type,
        result_type.as_ref(),
        &options.expression,
        &[],
    )?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid {
            tree: lambda.body.to_string(),
            ty: lambda.return_type().clone(),
        });
    }

    let evaluator = Evaluator::new();
    let results = rows
        .ok_or(CliError::NoInput)?
        .iter()
        .map(|row| -> Result<serde_json::Value, CliError> {
            let it = json_to_value(row, &schema_type, &registry)?;
            Ok(value_to_json(&evaluator.invoke(&lambda, &[it])?))
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    match &input {
        Some(serde_json::Value::Array(_)) => Ok(CheckResult::Success(serde_json::Value::Array(results))),
        _ => Ok(CheckResult::Success(results.into_iter().next().unwrap_or_default())),
    }
}
