//! # Query operators over in-memory sequences
//!
//! [`Query`] pairs a list of values with their element type and applies
//! operators whose arguments are expression strings:
//!
//! ```
//! use dynq::{ExpressionCompiler, Query, Type, TypeDef, TypeRegistry, Value, ObjectValue};
//!
//! let mut registry = TypeRegistry::new();
//! let person = registry.register(
//!     TypeDef::class("Person")
//!         .property("Name", Type::String)
//!         .property("Age", Type::Int32),
//! );
//! let people = vec![
//!     Value::Object(ObjectValue::new("Person").with("Name", "Aaron").with("Age", Value::Int32(41))),
//!     Value::Object(ObjectValue::new("Person").with("Name", "Baron").with("Age", Value::Int32(29))),
//! ];
//!
//! let names = Query::new(ExpressionCompiler::new(&registry), person, people)
//!     .filter("Age > 30", &[])
//!     .and_then(|q| q.select("Name", &[]))
//!     .unwrap()
//!     .into_items();
//! assert_eq!(names, vec![Value::from("Aaron")]);
//! ```
//!
//! Each operator compiles its text once against the current element type and
//! then evaluates the resulting lambda per element.

use std::cmp::Ordering as CmpOrdering;

use crate::ast::{Lambda, Parameter};
use crate::error::{EvalError, QueryError};
use crate::evaluator::{EvalContext, Evaluator};
use crate::parser::ExpressionCompiler;
use crate::symbols::Binding;
use crate::types::Type;
use crate::value::{RecordValue, Value};

#[derive(Debug, Clone)]
pub struct Query<'r> {
    compiler: ExpressionCompiler<'r>,
    element_type: Type,
    items: Vec<Value>,
}

impl<'r> Query<'r> {
    pub fn new(compiler: ExpressionCompiler<'r>, element_type: Type, items: Vec<Value>) -> Self {
        Query {
            compiler,
            element_type,
            items,
        }
    }

    pub fn element_type(&self) -> &Type {
        &self.element_type
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn lambda(&self, text: &str, result_type: Option<&Type>, values: &[Binding]) -> Result<Lambda, QueryError> {
        Ok(self
            .compiler
            .parse_lambda_with_it(&self.element_type, result_type, text, values)?)
    }

    fn predicate(&self, lambda: &Lambda, item: &Value) -> Result<bool, QueryError> {
        let value = Evaluator::new().invoke(lambda, std::slice::from_ref(item))?;
        // A null Boolean? result excludes the element
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Keeps the elements for which `predicate` is true.
    pub fn filter(self, predicate: &str, values: &[Binding]) -> Result<Self, QueryError> {
        let lambda = self.lambda(predicate, Some(&Type::Boolean), values)?;
        let mut kept = Vec::new();
        for item in &self.items {
            if self.predicate(&lambda, item)? {
                kept.push(item.clone());
            }
        }
        log::debug!("Where({}) kept {} of {}", predicate, kept.len(), self.items.len());
        Ok(Query { items: kept, ..self })
    }

    /// Maps every element through `selector`. The element type becomes the
    /// selector's result type.
    pub fn select(self, selector: &str, values: &[Binding]) -> Result<Self, QueryError> {
        let lambda = self.lambda(selector, None, values)?;
        let evaluator = Evaluator::new();
        let items = self
            .items
            .iter()
            .map(|item| evaluator.invoke(&lambda, std::slice::from_ref(item)))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Select({}) as {}", selector, lambda.return_type());
        Ok(Query {
            compiler: self.compiler,
            element_type: lambda.return_type().clone(),
            items,
        })
    }

    /// Stable sort by a list of keys such as `"City, Age desc"`. Nulls sort
    /// before any other value.
    pub fn order_by(self, ordering: &str, values: &[Binding]) -> Result<Self, QueryError> {
        let it = Parameter::it(self.element_type.clone());
        let keys = self
            .compiler
            .parse_ordering(std::slice::from_ref(&it), ordering, values)?;
        let evaluator = Evaluator::new();

        let mut keyed = Vec::with_capacity(self.items.len());
        for item in self.items {
            let context = EvalContext::new().bind(&it, item.clone());
            let row = keys
                .iter()
                .map(|key| evaluator.eval(&key.selector, &context))
                .collect::<Result<Vec<_>, EvalError>>()?;
            keyed.push((row, item));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            keys.iter()
                .zip(a.iter().zip(b))
                .map(|(key, (a, b))| {
                    let ordering = compare_keys(a, b);
                    if key.ascending { ordering } else { ordering.reverse() }
                })
                .find(|ordering| *ordering != CmpOrdering::Equal)
                .unwrap_or(CmpOrdering::Equal)
        });
        log::debug!("OrderBy({}) over {} element(s)", ordering, keyed.len());
        Ok(Query {
            compiler: self.compiler,
            element_type: self.element_type,
            items: keyed.into_iter().map(|(_, item)| item).collect(),
        })
    }

    pub fn take(mut self, count: usize) -> Self {
        self.items.truncate(count);
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.items.drain(..count.min(self.items.len()));
        self
    }

    /// Groups elements by `key`, in order of first appearance. Each group is
    /// a record with a `Key` field and an `Items` sequence holding the
    /// elements, or their `element` projections when one is given.
    pub fn group_by(self, key: &str, element: Option<&str>, values: &[Binding]) -> Result<Self, QueryError> {
        let key_lambda = self.lambda(key, None, values)?;
        let element_lambda = element
            .map(|text| self.lambda(text, None, values))
            .transpose()?;
        let evaluator = Evaluator::new();

        let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
        for item in &self.items {
            let args = std::slice::from_ref(item);
            let group_key = evaluator.invoke(&key_lambda, args)?;
            let member = match &element_lambda {
                Some(lambda) => evaluator.invoke(lambda, args)?,
                None => item.clone(),
            };
            match groups.iter_mut().find(|(k, _)| *k == group_key) {
                Some((_, members)) => members.push(member),
                None => groups.push((group_key, vec![member])),
            }
        }

        let member_type = element_lambda
            .as_ref()
            .map(|lambda| lambda.return_type().clone())
            .unwrap_or_else(|| self.element_type.clone());
        let record = self.compiler.record_factory().create_class([
            ("Key", key_lambda.return_type().clone()),
            ("Items", Type::sequence(member_type)),
        ]);
        log::debug!("GroupBy({}) produced {} group(s)", key, groups.len());

        let items = groups
            .into_iter()
            .map(|(key, members)| {
                Value::Record(RecordValue {
                    ty: record.clone(),
                    cells: vec![key, Value::List(members)],
                })
            })
            .collect();
        Ok(Query {
            compiler: self.compiler,
            element_type: Type::Record(record),
            items,
        })
    }

    /// Whether any element satisfies `predicate`, or whether there are any
    /// elements at all.
    pub fn any(&self, predicate: Option<&str>, values: &[Binding]) -> Result<bool, QueryError> {
        let Some(predicate) = predicate else {
            return Ok(!self.items.is_empty());
        };
        let lambda = self.lambda(predicate, Some(&Type::Boolean), values)?;
        for item in &self.items {
            if self.predicate(&lambda, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn count(&self, predicate: Option<&str>, values: &[Binding]) -> Result<usize, QueryError> {
        let Some(predicate) = predicate else {
            return Ok(self.items.len());
        };
        let lambda = self.lambda(predicate, Some(&Type::Boolean), values)?;
        let mut count = 0;
        for item in &self.items {
            if self.predicate(&lambda, item)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn compare_keys(a: &Value, b: &Value) -> CmpOrdering {
    match (a.is_null(), b.is_null()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Less,
        (false, true) => CmpOrdering::Greater,
        (false, false) => a.compare(b).unwrap_or(CmpOrdering::Equal),
    }
}
