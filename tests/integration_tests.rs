#![cfg(feature = "cli")]

use dynq::cli::{
    CheckOptions, CheckResult, CliError, QueryOptions, Schema, execute_check, execute_query, infer_type,
    json_to_value, value_to_json,
};
use dynq::{Type, TypeRegistry, Value};
use serde_json::json;

const PEOPLE: &str = r#"[
    {"name": "Aaron", "city": "Oslo", "age": 41, "balance": 120.5},
    {"name": "Baron", "city": "Lima", "age": 29, "balance": 80.0},
    {"name": "Cara", "city": "Oslo", "age": 35, "balance": 310.25},
    {"name": "Dana", "city": "Lima", "age": 29, "balance": 15.0}
]"#;

fn check(expression: &str, input: &str) -> Result<CheckResult, CliError> {
    execute_check(&CheckOptions {
        expression: expression.to_string(),
        input: Some(input.to_string()),
        ..Default::default()
    })
}

fn query(options: QueryOptions) -> serde_json::Value {
    execute_query(&QueryOptions {
        input: Some(PEOPLE.to_string()),
        ..options
    })
    .unwrap()
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_evaluates_against_input() {
    let input = r#"{"name": "Aaron", "age": 41, "tags": ["a", "b"]}"#;
    match check("name + \" is \" + age", input).unwrap() {
        CheckResult::Success(value) => assert_eq!(value, json!("Aaron is 41")),
        other => panic!("Expected a value, got {:?}", other),
    }
    match check("tags.Count() == 2 and age > 40", input).unwrap() {
        CheckResult::Success(value) => assert_eq!(value, json!(true)),
        other => panic!("Expected a value, got {:?}", other),
    }
}

#[test]
fn test_check_projection_is_an_object() {
    let input = r#"{"name": "Aaron", "age": 41}"#;
    match check("new(name.ToUpper() as Upper, age * 12 as Months)", input).unwrap() {
        CheckResult::Success(value) => assert_eq!(value, json!({"Upper": "AARON", "Months": 492})),
        other => panic!("Expected a value, got {:?}", other),
    }
}

#[test]
fn test_check_array_input_per_element() {
    match check("age >= 35", PEOPLE).unwrap() {
        CheckResult::Success(value) => assert_eq!(value, json!([true, false, true, false])),
        other => panic!("Expected a value, got {:?}", other),
    }
}

#[test]
fn test_check_syntax_only() {
    let result = execute_check(&CheckOptions {
        expression: "Age >= 18 && Name != null".to_string(),
        schema: Some("Name:String, Age:Int32?".to_string()),
        syntax_only: true,
        ..Default::default()
    })
    .unwrap();
    match result {
        CheckResult::SyntaxValid { ty, .. } => assert_eq!(ty, Type::Boolean),
        other => panic!("Expected syntax result, got {:?}", other),
    }
}

#[test]
fn test_check_result_type() {
    let result = execute_check(&CheckOptions {
        expression: "Age".to_string(),
        input: Some(r#"{"Age": 3}"#.to_string()),
        result_type: Some("Decimal".to_string()),
        ..Default::default()
    })
    .unwrap();
    match result {
        CheckResult::Success(value) => assert_eq!(value, json!("3")),
        other => panic!("Expected a value, got {:?}", other),
    }
}

#[test]
fn test_check_errors() {
    assert!(matches!(check("age +", r#"{"age": 1}"#), Err(CliError::Parse(_))));
    assert!(matches!(check("age / 0", r#"{"age": 1}"#), Err(CliError::Eval(_))));
    assert!(matches!(check("age", "{not json"), Err(CliError::Json(_))));

    let no_input = execute_check(&CheckOptions {
        expression: "1 + 1".to_string(),
        ..Default::default()
    });
    assert!(matches!(no_input, Err(CliError::NoInput)));

    let bad_schema = execute_check(&CheckOptions {
        expression: "1".to_string(),
        schema: Some("Age:Integer".to_string()),
        syntax_only: true,
        ..Default::default()
    });
    assert!(matches!(bad_schema, Err(CliError::UnknownType(name)) if name == "Integer"));
}

// ============================================================================
// query
// ============================================================================

#[test]
fn test_query_filter_and_select() {
    let result = query(QueryOptions {
        filter: Some("city == \"Oslo\"".to_string()),
        select: Some("name".to_string()),
        ..Default::default()
    });
    assert_eq!(result, json!(["Aaron", "Cara"]));
}

#[test]
fn test_query_order_skip_take() {
    let result = query(QueryOptions {
        order_by: Some("age, name desc".to_string()),
        skip: Some(1),
        take: Some(2),
        select: Some("name".to_string()),
        ..Default::default()
    });
    assert_eq!(result, json!(["Baron", "Cara"]));
}

#[test]
fn test_query_count() {
    let result = query(QueryOptions {
        filter: Some("balance > 100".to_string()),
        count: true,
        ..Default::default()
    });
    assert_eq!(result, json!(2));
}

#[test]
fn test_query_with_schema() {
    let result = query(QueryOptions {
        schema: Some("name:String, city:String, age:Int64, balance:Decimal".to_string()),
        filter: Some("balance < 100".to_string()),
        select: Some("new(name, balance * 2 as doubled)".to_string()),
        ..Default::default()
    });
    assert_eq!(
        result,
        json!([{"name": "Baron", "doubled": "160.0"}, {"name": "Dana", "doubled": "30.0"}])
    );
}

#[test]
fn test_query_requires_input() {
    let err = execute_query(&QueryOptions::default()).unwrap_err();
    assert!(matches!(err, CliError::NoInput));
}

// ============================================================================
// JSON conversion
// ============================================================================

#[test]
fn test_infer_type() {
    assert_eq!(infer_type(&json!(true)), Type::Boolean);
    assert_eq!(infer_type(&json!(7)), Type::Int32);
    assert_eq!(infer_type(&json!(5_000_000_000i64)), Type::Int64);
    assert_eq!(infer_type(&json!(1.5)), Type::Double);
    assert_eq!(infer_type(&json!("x")), Type::String);
    assert_eq!(infer_type(&json!([1, 2])), Type::array(Type::Int32));
    assert_eq!(infer_type(&json!(null)), Type::Object);
}

#[test]
fn test_schema_parse() {
    let registry = TypeRegistry::new();
    let schema = Schema::parse("Name:String, Age:Int32?, Id:Guid", &registry).unwrap();
    assert_eq!(
        schema.fields,
        vec![
            ("Name".to_string(), Type::String),
            ("Age".to_string(), Type::Int32.nullable()),
            ("Id".to_string(), Type::Guid),
        ]
    );
    let from_json = Schema::parse(r#"{"Name": "String", "Tags": "String[]"}"#, &registry).unwrap();
    assert_eq!(
        from_json.fields,
        vec![
            ("Name".to_string(), Type::String),
            ("Tags".to_string(), Type::array(Type::String)),
        ]
    );
    assert!(matches!(
        Schema::parse("Name", &registry),
        Err(CliError::InvalidSchema(entry)) if entry == "Name"
    ));
}

#[test]
fn test_json_values_follow_declared_type() {
    let registry = TypeRegistry::new();
    assert_eq!(
        json_to_value(&json!(200), &Type::Byte, &registry).unwrap(),
        Value::Byte(200)
    );
    assert!(matches!(
        json_to_value(&json!(300), &Type::Byte, &registry),
        Err(CliError::Mismatch(..))
    ));
    assert_eq!(
        json_to_value(&json!(null), &Type::Int32.nullable(), &registry).unwrap(),
        Value::Null
    );
    let date = json_to_value(&json!("2024-02-29T10:30:00"), &Type::DateTime, &registry).unwrap();
    assert_eq!(value_to_json(&date), json!("2024-02-29T10:30:00"));
}
