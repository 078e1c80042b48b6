use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::ast::{AggregateMethod, BinaryOp, Expr, ExprKind, Lambda, Parameter, UnaryOp};
use crate::error::EvalError;
use crate::types::Type;
use crate::value::{RecordValue, Value};

/// Values bound to lambda parameters while a tree is evaluated.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    values: HashMap<u64, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `parameter` to `value`.
    pub fn bind(mut self, parameter: &Parameter, value: Value) -> Self {
        self.values.insert(parameter.id, value);
        self
    }

    /// Create a new context with the element of an enclosing aggregate bound
    pub fn with_lambda(&self, parameter: &Parameter, value: Value) -> Self {
        self.clone().bind(parameter, value)
    }

    fn get(&self, parameter: &Parameter) -> Result<Value, EvalError> {
        self.values.get(&parameter.id).cloned().ok_or_else(|| {
            EvalError::UnboundParameter(if parameter.is_unnamed() {
                "it".to_string()
            } else {
                parameter.name.clone()
            })
        })
    }
}

fn type_error(what: &str, value: &Value) -> EvalError {
    EvalError::TypeError(format!("{} got a value of type '{}'", what, value.type_of()))
}

/// Tree interpreter.
///
/// Operands are already promoted by the compiler, so both sides of a binary
/// node hold values of the same type. Nullable operands are lifted: a null on
/// either side of an arithmetic operator yields null, and comparisons against
/// null are false except for equality with another null.
///
/// # Examples
///
/// ```
/// use dynq::{Evaluator, ExpressionCompiler, Type, TypeRegistry, Value};
///
/// let registry = TypeRegistry::new();
/// let lambda = ExpressionCompiler::new(&registry)
///     .parse_lambda_with_it(&Type::Int32, None, "it * 2 + 1", &[])
///     .unwrap();
///
/// let result = Evaluator::new().invoke(&lambda, &[Value::Int32(20)]).unwrap();
/// assert_eq!(result, Value::Int32(41));
/// ```
#[derive(Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Calls `lambda` with one value per parameter.
    pub fn invoke(&self, lambda: &Lambda, args: &[Value]) -> Result<Value, EvalError> {
        if lambda.parameters.len() != args.len() {
            return Err(EvalError::TypeError(format!(
                "lambda takes {} argument(s), {} supplied",
                lambda.parameters.len(),
                args.len()
            )));
        }
        let context = lambda
            .parameters
            .iter()
            .zip(args)
            .fold(EvalContext::new(), |context, (parameter, value)| {
                context.bind(parameter, value.clone())
            });
        self.eval(&lambda.body, &context)
    }

    pub fn eval(&self, expr: &Expr, context: &EvalContext) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal.value.clone()),
            ExprKind::Parameter(parameter) => context.get(parameter),
            ExprKind::Member {
                instance, property, ..
            } => {
                let Some(instance) = instance else {
                    return match &property.getter {
                        Some(getter) => getter(None),
                        None => Err(EvalError::TypeError(format!(
                            "static member '{}' has no getter",
                            property.name
                        ))),
                    };
                };
                let value = self.eval(instance, context)?;
                if value.is_null() && !instance.ty.is_nullable() {
                    return Err(EvalError::NullReference(property.name.clone()));
                }
                match (&property.getter, &value) {
                    (Some(getter), _) => getter(Some(&value)),
                    (None, Value::Object(_) | Value::Record(_)) => {
                        Ok(value.field(&property.name).unwrap_or(Value::Null))
                    }
                    (None, other) => Err(type_error(&format!("member '{}'", property.name), other)),
                }
            }
            ExprKind::Call {
                instance,
                method,
                args,
            } => {
                let this = match instance {
                    Some(instance) => {
                        let value = self.eval(instance, context)?;
                        if value.is_null() {
                            return Err(EvalError::NullReference(method.name.clone()));
                        }
                        Some(value)
                    }
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                (method.invoker)(this.as_ref(), &args)
            }
            ExprKind::Index { array, index } => {
                let array = self.eval(array, context)?;
                let index = self.eval(index, context)?;
                let Value::List(items) = &array else {
                    return Err(match array {
                        Value::Null => EvalError::NullReference("[]".to_string()),
                        other => type_error("indexing", &other),
                    });
                };
                let i = index.as_int().ok_or_else(|| type_error("array index", &index))?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or(EvalError::IndexOutOfRange(i as i64))
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, context),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, context)?;
                apply_unary(*op, &value)
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test = self.eval(test, context)?;
                match test.as_bool() {
                    Some(true) => self.eval(if_true, context),
                    Some(false) => self.eval(if_false, context),
                    None => Err(type_error("condition", &test)),
                }
            }
            ExprKind::Convert { operand, checked } => {
                self.eval(operand, context)?.convert(&expr.ty, *checked)
            }
            ExprKind::Invoke { lambda, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                self.invoke(lambda, &args)
            }
            ExprKind::Aggregate {
                source,
                method,
                selector,
            } => {
                let items = match self.eval(source, context)? {
                    Value::List(items) => items,
                    Value::Null => return Err(EvalError::NullReference(method.name().to_string())),
                    other => return Err(type_error(method.name(), &other)),
                };
                self.eval_aggregate(*method, selector.as_deref(), items, &expr.ty, context)
            }
            ExprKind::New { record, bindings } => {
                let cells = bindings
                    .iter()
                    .map(|binding| self.eval(binding, context))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Record(RecordValue {
                    ty: record.clone(),
                    cells,
                }))
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        context: &EvalContext,
    ) -> Result<Value, EvalError> {
        let left = self.eval(left, context)?;
        match (op, left.as_bool()) {
            (BinaryOp::AndAlso, Some(false)) => return Ok(Value::Boolean(false)),
            (BinaryOp::OrElse, Some(true)) => return Ok(Value::Boolean(true)),
            _ => {}
        }
        let right = self.eval(right, context)?;

        match op {
            BinaryOp::AndAlso | BinaryOp::OrElse => {
                // Three-valued: the short circuit above already handled a
                // deciding left operand
                let decisive = op == BinaryOp::OrElse;
                Ok(match (left.as_bool(), right.as_bool()) {
                    (_, Some(b)) if b == decisive => Value::Boolean(decisive),
                    (Some(_), Some(_)) => Value::Boolean(!decisive),
                    _ => Value::Null,
                })
            }
            BinaryOp::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Boolean(false));
                }
                let ordering = left.compare(&right).ok_or_else(|| {
                    EvalError::TypeError(format!(
                        "cannot order '{}' and '{}'",
                        left.type_of(),
                        right.type_of()
                    ))
                })?;
                Ok(Value::Boolean(match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Null);
                }
                apply_arithmetic(op, &left, &right)
            }
        }
    }

    fn eval_aggregate(
        &self,
        method: AggregateMethod,
        selector: Option<&Lambda>,
        items: Vec<Value>,
        result_type: &Type,
        context: &EvalContext,
    ) -> Result<Value, EvalError> {
        let apply = |item: &Value| -> Result<Value, EvalError> {
            match selector {
                Some(lambda) => {
                    let scope = match lambda.parameters.first() {
                        Some(parameter) => context.with_lambda(parameter, item.clone()),
                        None => context.clone(),
                    };
                    self.eval(&lambda.body, &scope)
                }
                None => Ok(item.clone()),
            }
        };
        let test = |item: &Value| -> Result<bool, EvalError> {
            let value = apply(item)?;
            value.as_bool().ok_or_else(|| type_error(method.name(), &value))
        };

        match method {
            AggregateMethod::Where => {
                let mut kept = Vec::new();
                for item in items {
                    if test(&item)? {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            AggregateMethod::Any => match selector {
                None => Ok(Value::Boolean(!items.is_empty())),
                Some(_) => {
                    for item in &items {
                        if test(item)? {
                            return Ok(Value::Boolean(true));
                        }
                    }
                    Ok(Value::Boolean(false))
                }
            },
            AggregateMethod::All => {
                for item in &items {
                    if !test(item)? {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }
            AggregateMethod::Count => {
                let mut count: i32 = 0;
                for item in &items {
                    if selector.is_none() || test(item)? {
                        count = count.checked_add(1).ok_or(EvalError::Overflow)?;
                    }
                }
                Ok(Value::Int32(count))
            }
            AggregateMethod::Min | AggregateMethod::Max => {
                let wanted = if method == AggregateMethod::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<Value> = None;
                for item in &items {
                    let value = apply(item)?;
                    if value.is_null() {
                        continue;
                    }
                    best = match best {
                        Some(current) if value.compare(&current) != Some(wanted) => Some(current),
                        _ => Some(value),
                    };
                }
                match best {
                    Some(value) => Ok(value),
                    None if result_type.is_value_type() && !result_type.is_nullable() => {
                        Err(EvalError::EmptySequence)
                    }
                    None => Ok(Value::Null),
                }
            }
            AggregateMethod::Sum => {
                let mut sum = Value::Int32(0).convert(result_type.non_nullable(), false)?;
                for item in &items {
                    let value = apply(item)?;
                    if !value.is_null() {
                        sum = apply_arithmetic(BinaryOp::Add, &sum, &value)?;
                    }
                }
                Ok(sum)
            }
            AggregateMethod::Average => {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    let value = apply(item)?;
                    if !value.is_null() {
                        values.push(value);
                    }
                }
                if values.is_empty() {
                    return if result_type.is_nullable() {
                        Ok(Value::Null)
                    } else {
                        Err(EvalError::EmptySequence)
                    };
                }
                average(&values, result_type.non_nullable())
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match left.compare(right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => left == right,
    }
}

fn average(values: &[Value], result_type: &Type) -> Result<Value, EvalError> {
    let count = values.len();
    match result_type {
        Type::Decimal => {
            let mut sum = Decimal::ZERO;
            for value in values {
                let d = value.as_decimal().ok_or_else(|| type_error("Average", value))?;
                sum = sum.checked_add(d).ok_or(EvalError::Overflow)?;
            }
            sum.checked_div(Decimal::from(count))
                .map(Value::Decimal)
                .ok_or(EvalError::Overflow)
        }
        _ => {
            let mut sum = 0f64;
            for value in values {
                sum += value.as_float().ok_or_else(|| type_error("Average", value))?;
            }
            let mean = sum / count as f64;
            Ok(match result_type {
                Type::Single => Value::Single(mean as f32),
                _ => Value::Double(mean),
            })
        }
    }
}

fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Negate, Value::Int32(n)) => n.checked_neg().map(Value::Int32).ok_or(EvalError::Overflow),
        (UnaryOp::Negate, Value::Int64(n)) => n.checked_neg().map(Value::Int64).ok_or(EvalError::Overflow),
        (UnaryOp::Negate, Value::Single(f)) => Ok(Value::Single(-f)),
        (UnaryOp::Negate, Value::Double(f)) => Ok(Value::Double(-f)),
        (UnaryOp::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (op, other) => Err(type_error(&format!("operator '{}'", op.symbol()), other)),
    }
}

macro_rules! checked_integral {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        let result = match $op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide | BinaryOp::Modulo if b == 0 => return Err(EvalError::DivisionByZero),
            BinaryOp::Divide => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        result.map(Value::$variant).ok_or(EvalError::Overflow)
    }};
}

macro_rules! floating {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        Ok(Value::$variant(match $op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            _ => a % b,
        }))
    }};
}

/// `+ - * / %` on two values of the same numeric type, and the date and
/// time-span forms of `+` and `-`.
fn apply_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => checked_integral!(Int32, op, *a, *b),
        (Value::UInt32(a), Value::UInt32(b)) => checked_integral!(UInt32, op, *a, *b),
        (Value::Int64(a), Value::Int64(b)) => checked_integral!(Int64, op, *a, *b),
        (Value::UInt64(a), Value::UInt64(b)) => checked_integral!(UInt64, op, *a, *b),
        (Value::Single(a), Value::Single(b)) => floating!(Single, op, *a, *b),
        (Value::Double(a), Value::Double(b)) => floating!(Double, op, *a, *b),
        (Value::Decimal(a), Value::Decimal(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Divide | BinaryOp::Modulo if b.is_zero() => {
                    return Err(EvalError::DivisionByZero);
                }
                BinaryOp::Divide => a.checked_div(*b),
                _ => a.checked_rem(*b),
            };
            result.map(Value::Decimal).ok_or(EvalError::Overflow)
        }
        (Value::DateTime(a), Value::TimeSpan(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add_signed(*b),
                _ => a.checked_sub_signed(*b),
            };
            result.map(Value::DateTime).ok_or(EvalError::Overflow)
        }
        (Value::DateTimeOffset(a), Value::TimeSpan(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add_signed(*b),
                _ => a.checked_sub_signed(*b),
            };
            result.map(Value::DateTimeOffset).ok_or(EvalError::Overflow)
        }
        (Value::TimeSpan(a), Value::TimeSpan(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                _ => a.checked_sub(b),
            };
            result.map(Value::TimeSpan).ok_or(EvalError::Overflow)
        }
        (Value::DateTime(a), Value::DateTime(b)) => Ok(Value::TimeSpan(a.signed_duration_since(*b))),
        (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => {
            Ok(Value::TimeSpan(a.signed_duration_since(*b)))
        }
        (a, b) => Err(EvalError::TypeError(format!(
            "operator '{}' cannot combine '{}' and '{}'",
            op.symbol(),
            a.type_of(),
            b.type_of()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_overflow_is_an_error() {
        let result = apply_arithmetic(BinaryOp::Add, &Value::Int32(i32::MAX), &Value::Int32(1));
        assert_eq!(result, Err(EvalError::Overflow));
    }

    #[test]
    fn test_integer_division_by_zero() {
        let result = apply_arithmetic(BinaryOp::Modulo, &Value::Int64(5), &Value::Int64(0));
        assert_eq!(result, Err(EvalError::DivisionByZero));
        let result = apply_arithmetic(BinaryOp::Divide, &Value::Double(1.0), &Value::Double(0.0));
        assert_eq!(result, Ok(Value::Double(f64::INFINITY)));
    }

    #[test]
    fn test_negation_of_null_is_null() {
        assert_eq!(apply_unary(UnaryOp::Negate, &Value::Null), Ok(Value::Null));
    }
}
