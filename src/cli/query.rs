//! Run a where / order by / skip / take / select pipeline over a JSON array

use super::{CliError, Schema, json_to_value, value_to_json};
use crate::{ExpressionCompiler, Query, TypeRegistry};

/// Options for the query command
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// JSON array of objects
    pub input: Option<String>,
    /// `Name:Type` list describing each element; inferred from the first
    /// element when absent
    pub schema: Option<String>,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub select: Option<String>,
    /// Print the number of matching elements instead of the elements
    pub count: bool,
}

/// Execute a dynq query operation
pub fn execute_query(options: &QueryOptions) -> Result<serde_json::Value, CliError> {
    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let input: serde_json::Value = serde_json::from_str(json_str)?;
    let rows = match &input {
        serde_json::Value::Array(rows) => rows.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut registry = TypeRegistry::new();
    let schema = match (&options.schema, rows.first()) {
        (Some(text), _) => Schema::parse(text, &registry)?,
        (None, Some(first)) => Schema::infer(first),
        (None, None) => Schema::default(),
    };
    let row = schema.register(&mut registry, "Row");
    let items = rows
        .iter()
        .map(|r| json_to_value(r, &row, &registry))
        .collect::<Result<Vec<_>, _>>()?;

    let mut query = Query::new(ExpressionCompiler::new(&registry), row, items);
    if let Some(predicate) = &options.filter {
        query = query.filter(predicate, &[])?;
    }
    if options.count {
        return Ok(query.len().into());
    }
    if let Some(ordering) = &options.order_by {
        query = query.order_by(ordering, &[])?;
    }
    if let Some(n) = options.skip {
        query = query.skip(n);
    }
    if let Some(n) = options.take {
        query = query.take(n);
    }
    if let Some(selector) = &options.select {
        query = query.select(selector, &[])?;
    }

    Ok(serde_json::Value::Array(query.items().iter().map(value_to_json).collect()))
}
