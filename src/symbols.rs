//! Names visible to an expression besides keywords and members of `it`.
//!
//! A parse starts with the named lambda parameters, then the caller's values
//! under the positional names `@0`, `@1`, ... When the last value is a
//! [`Binding::Named`] table, its entries become the externally named values,
//! consulted after the positional symbols. Lookups ignore letter case.

use std::collections::HashMap;

use crate::ast::{Expr, Lambda, Parameter};
use crate::error::ErrorKind;
use crate::value::Value;

/// A value supplied to a parse by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Plain constant
    Value(Value),
    /// Pre-built expression spliced in as is
    Expr(Expr),
    /// Callable with `name(args)`
    Lambda(Lambda),
    /// Table of externally named values; only valid as the last value
    Named(HashMap<String, Binding>),
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<Expr> for Binding {
    fn from(expr: Expr) -> Self {
        Binding::Expr(expr)
    }
}

impl From<Lambda> for Binding {
    fn from(lambda: Lambda) -> Self {
        Binding::Lambda(lambda)
    }
}

impl<S: Into<String>> FromIterator<(S, Binding)> for Binding {
    fn from_iter<I: IntoIterator<Item = (S, Binding)>>(iter: I) -> Self {
        Binding::Named(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Binding>,
    externals: HashMap<String, Binding>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every named parameter. A lone unnamed parameter is returned so
    /// the caller can expose it as `it`.
    pub fn add_parameters(&mut self, parameters: &[Parameter]) -> Result<Option<Parameter>, ErrorKind> {
        for parameter in parameters.iter().filter(|p| !p.is_unnamed()) {
            self.add(&parameter.name, Binding::Expr(parameter.to_expr()))?;
        }
        match parameters {
            [single] if single.is_unnamed() => Ok(Some(single.clone())),
            _ => Ok(None),
        }
    }

    pub fn add_values(&mut self, values: &[Binding]) -> Result<(), ErrorKind> {
        for (i, value) in values.iter().enumerate() {
            match value {
                Binding::Named(named) if i + 1 == values.len() => {
                    self.externals = named
                        .iter()
                        .map(|(name, binding)| (name.to_lowercase(), binding.clone()))
                        .collect();
                }
                Binding::Named(_) => return Err(ErrorKind::NamedValuesNotLast),
                other => self.add(&format!("@{}", i), other.clone())?,
            }
        }
        Ok(())
    }

    pub fn add(&mut self, name: &str, binding: Binding) -> Result<(), ErrorKind> {
        let key = name.to_lowercase();
        if self.symbols.contains_key(&key) {
            return Err(ErrorKind::DuplicateIdentifier(name.to_string()));
        }
        self.symbols.insert(key, binding);
        Ok(())
    }

    /// Positional symbols first, then external names.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let key = name.to_lowercase();
        self.symbols.get(&key).or_else(|| self.externals.get(&key))
    }

    pub fn len(&self) -> usize {
        self.symbols.len() + self.externals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
