// tests/evaluator_tests.rs

use dynq::{
    EnumType, EvalError, Evaluator, ExpressionCompiler, ObjectValue, Type, TypeDef, TypeRegistry, Value,
};
use rstest::rstest;
use rust_decimal::Decimal;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    let color = registry.register_enum(EnumType::new("Color", [("Red", 0), ("Green", 1)]));
    let order = registry.register(
        TypeDef::class("Order")
            .property("Total", Type::Decimal)
            .property("Quantity", Type::Int32),
    );
    registry.register(
        TypeDef::class("Person")
            .property("Name", Type::String)
            .property("Age", Type::Int32)
            .property("Score", Type::Double.nullable())
            .property("Color", color)
            .property("Items", Type::array(Type::Int32))
            .property("Orders", Type::sequence(order))
            .property("Manager", Type::class("Person")),
    );
    registry
}

fn green(registry: &TypeRegistry) -> Value {
    match registry.lookup("Color") {
        Some(Type::Enum(def)) => Value::Enum(def, 1),
        other => panic!("Color is not an enum: {:?}", other),
    }
}

fn order(total: i64, quantity: i32) -> Value {
    ObjectValue::new("Order")
        .with("Total", Decimal::new(total, 2))
        .with("Quantity", quantity)
        .into()
}

fn aaron(registry: &TypeRegistry) -> Value {
    ObjectValue::new("Person")
        .with("Name", "Aaron")
        .with("Age", 41)
        .with("Score", Value::Null)
        .with("Color", green(registry))
        .with("Items", vec![Value::Int32(1), Value::Int32(5), Value::Int32(7)])
        .with("Orders", vec![order(1050, 2), order(20000, 1)])
        .with("Manager", Value::Null)
        .into()
}

fn eval(registry: &TypeRegistry, it: &Value, text: &str) -> Result<Value, EvalError> {
    let lambda = ExpressionCompiler::new(registry)
        .parse_lambda_with_it(&Type::class("Person"), None, text, &[])
        .unwrap();
    Evaluator::new().invoke(&lambda, std::slice::from_ref(it))
}

// ============================================================================
// Operators
// ============================================================================

#[rstest]
#[case("1 + 2 * 3", Value::Int32(7))]
#[case("(1 + 2) * 3", Value::Int32(9))]
#[case("7 / 2", Value::Int32(3))]
#[case("7 % 4", Value::Int32(3))]
#[case("7.0 / 2", Value::Double(3.5))]
#[case("-2147483648", Value::Int32(i32::MIN))]
#[case("4294967296 + 1", Value::Int64(4294967297))]
#[case("1.5F * 2", Value::Single(3.0))]
#[case("\"a\" + 1 + true", Value::from("a1True"))]
#[case("\"b\" > \"a\"", Value::Boolean(true))]
#[case("'x' == 'x'", Value::Boolean(true))]
#[case("not (1 > 2) and 3 >= 3", Value::Boolean(true))]
#[case("iif(1 < 2, \"yes\", \"no\")", Value::from("yes"))]
fn test_constant_expressions(#[case] text: &str, #[case] expected: Value) {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry).parse(text, None, &[]).unwrap();
    let value = Evaluator::new().eval(&expr, &Default::default()).unwrap();
    assert_eq!(value, expected, "for {}", text);
}

#[test]
fn test_checked_arithmetic() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Age * 2147483647"), Err(EvalError::Overflow));
    assert_eq!(eval(&registry, &it, "Age / 0"), Err(EvalError::DivisionByZero));
    assert_eq!(eval(&registry, &it, "Int16(Age * 1000)"), Err(EvalError::Overflow));
}

#[test]
fn test_like_wildcards() {
    let registry = registry();
    let mut it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Name LIKE \"A%n\""), Ok(Value::Boolean(true)));
    assert_eq!(eval(&registry, &it, "Name like 'a*'"), Ok(Value::Boolean(true)));
    assert_eq!(eval(&registry, &it, "Name like \"?aron\""), Ok(Value::Boolean(true)));

    if let Value::Object(object) = &mut it {
        object.fields.insert("Name".to_string(), Value::from("Baron"));
    }
    assert_eq!(eval(&registry, &it, "Name LIKE \"A%n\""), Ok(Value::Boolean(false)));
}

#[test]
fn test_enum_equality() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Color == Green"), Ok(Value::Boolean(true)));
    assert_eq!(eval(&registry, &it, "Color == Color.Red"), Ok(Value::Boolean(false)));
    assert_eq!(eval(&registry, &it, "Color.ToString()"), Ok(Value::from("Green")));
}

// ============================================================================
// Nulls
// ============================================================================

#[test]
fn test_nullable_operands_are_lifted() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Score + 1"), Ok(Value::Null));
    assert_eq!(eval(&registry, &it, "Score > 5"), Ok(Value::Boolean(false)));
    assert_eq!(eval(&registry, &it, "Score == null"), Ok(Value::Boolean(true)));
    assert_eq!(eval(&registry, &it, "Score.HasValue"), Ok(Value::Boolean(false)));
    assert_eq!(eval(&registry, &it, "Manager == null"), Ok(Value::Boolean(true)));
}

#[test]
fn test_member_of_null_instance() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(
        eval(&registry, &it, "Manager.Name"),
        Err(EvalError::NullReference("Name".to_string()))
    );
    assert_eq!(
        eval(&registry, &it, "Manager != null and Manager.Name == \"Zed\""),
        Ok(Value::Boolean(false))
    );
}

// ============================================================================
// Members, methods and indexing
// ============================================================================

#[test]
fn test_methods_and_properties() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Name.ToUpper()"), Ok(Value::from("AARON")));
    assert_eq!(eval(&registry, &it, "Name.Length + Age"), Ok(Value::Int32(46)));
    assert_eq!(eval(&registry, &it, "Math.Abs(-Age)"), Ok(Value::Int32(41)));
    assert_eq!(eval(&registry, &it, "Name.Substring(1, 3)"), Ok(Value::from("aro")));
}

#[test]
fn test_array_index() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, "Items[Items.Length - 1]"), Ok(Value::Int32(7)));
    assert_eq!(eval(&registry, &it, "Items[3]"), Err(EvalError::IndexOutOfRange(3)));
}

#[test]
fn test_date_arithmetic() {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry)
        .parse("(DateTime(2024, 3, 1) - DateTime(2024, 2, 1)).Days", None, &[])
        .unwrap();
    let value = Evaluator::new().eval(&expr, &Default::default()).unwrap();
    assert_eq!(value, Value::Int32(29));

    let expr = ExpressionCompiler::new(&registry)
        .parse("(DateTime(2024, 2, 28) + TimeSpan(1, 0, 0, 0)).Day", None, &[])
        .unwrap();
    let value = Evaluator::new().eval(&expr, &Default::default()).unwrap();
    assert_eq!(value, Value::Int32(29));
}

// ============================================================================
// Aggregates
// ============================================================================

#[rstest]
#[case("Items.Where(it > 1).Count()", Value::Int32(2))]
#[case("Items.Count(it > 100)", Value::Int32(0))]
#[case("Items.Any()", Value::Boolean(true))]
#[case("Items.All(it > 0)", Value::Boolean(true))]
#[case("Items.Sum(it)", Value::Int32(13))]
#[case("Items.Max(it)", Value::Int32(7))]
#[case("Items.Min(it * -1)", Value::Int32(-7))]
#[case("Orders.Sum(Total * Quantity)", Value::Decimal(Decimal::new(22100, 2)))]
#[case("Orders.Average(Quantity)", Value::Double(1.5))]
#[case("Orders.Any(Total > 100 and Quantity == 1)", Value::Boolean(true))]
#[case("Orders.Where(Quantity > 1).Sum(Total)", Value::Decimal(Decimal::new(1050, 2)))]
fn test_aggregates(#[case] text: &str, #[case] expected: Value) {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(eval(&registry, &it, text), Ok(expected), "for {}", text);
}

#[test]
fn test_aggregates_over_empty_sequence() {
    let registry = registry();
    let it = aaron(&registry);
    assert_eq!(
        eval(&registry, &it, "Items.Where(it > 100).Average(it)"),
        Err(EvalError::EmptySequence)
    );
    assert_eq!(
        eval(&registry, &it, "Items.Where(it > 100).Max(it)"),
        Err(EvalError::EmptySequence)
    );
    assert_eq!(eval(&registry, &it, "Items.Where(it > 100).Sum(it)"), Ok(Value::Int32(0)));
}

#[test]
fn test_outer_it_inside_selector_is_element() {
    // Inside the selector, Age resolves against the element, so the outer
    // person is not reachable through implicit members
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&Type::class("Person"), None, "Orders.Where(Age > 1).Count()", &[])
        .unwrap_err();
    assert!(err.to_string().contains("Age"));
}

// ============================================================================
// Projections
// ============================================================================

#[test]
fn test_new_builds_record() {
    let registry = registry();
    let it = aaron(&registry);
    let record = eval(&registry, &it, "new(Name, Age * 12 as Months)").unwrap();
    assert_eq!(record.field("months"), Some(Value::Int32(492)));
    assert_eq!(record.field("Name"), Some(Value::from("Aaron")));
    assert_eq!(record.to_string(), "{Name=Aaron, Months=492}");
}

#[test]
fn test_unbound_parameter() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&Type::Int32, None, "it + 1", &[])
        .unwrap();
    assert_eq!(
        Evaluator::new().eval(&lambda.body, &Default::default()),
        Err(EvalError::UnboundParameter("it".to_string()))
    );
}
