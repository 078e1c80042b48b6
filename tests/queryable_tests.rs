// tests/queryable_tests.rs

use dynq::{
    Binding, ExpressionCompiler, ObjectValue, Query, QueryError, Type, TypeDef, TypeRegistry, Value,
};

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(
        TypeDef::class("Person")
            .property("Name", Type::String)
            .property("City", Type::String)
            .property("Age", Type::Int32)
            .property("Score", Type::Double.nullable()),
    );
    registry
}

fn person(name: &str, city: Option<&str>, age: i32, score: Option<f64>) -> Value {
    ObjectValue::new("Person")
        .with("Name", name)
        .with("City", city.map(Value::from).unwrap_or(Value::Null))
        .with("Age", age)
        .with("Score", score.map(Value::Double).unwrap_or(Value::Null))
        .into()
}

fn people() -> Vec<Value> {
    vec![
        person("Aaron", Some("Oslo"), 41, Some(7.5)),
        person("Baron", Some("Lima"), 29, None),
        person("Cara", None, 35, Some(9.0)),
        person("Dana", Some("Oslo"), 29, Some(6.0)),
        person("Eli", Some("Lima"), 52, Some(8.0)),
    ]
}

fn query(registry: &TypeRegistry) -> Query<'_> {
    Query::new(ExpressionCompiler::new(registry), Type::class("Person"), people())
}

fn names(query: &Query) -> Vec<String> {
    query
        .items()
        .iter()
        .map(|item| item.field("Name").and_then(|n| n.as_str().map(str::to_string)).unwrap_or_default())
        .collect()
}

// ============================================================================
// Filtering and projection
// ============================================================================

#[test]
fn test_filter() {
    let registry = registry();
    let filtered = query(&registry).filter("Age > 30 and City != null", &[]).unwrap();
    assert_eq!(names(&filtered), vec!["Aaron", "Eli"]);
}

#[test]
fn test_filter_with_positional_value() {
    let registry = registry();
    let filtered = query(&registry)
        .filter("City == @0", &[Binding::from(Value::from("Lima"))])
        .unwrap();
    assert_eq!(names(&filtered), vec!["Baron", "Eli"]);
}

#[test]
fn test_filter_drops_null_predicates() {
    let registry = registry();
    let filtered = query(&registry).filter("Score > 7", &[]).unwrap();
    assert_eq!(names(&filtered), vec!["Aaron", "Cara", "Eli"]);
}

#[test]
fn test_filter_requires_boolean() {
    let registry = registry();
    let err = query(&registry).filter("Age + 1", &[]).unwrap_err();
    assert!(matches!(err, QueryError::Parse(_)));
}

#[test]
fn test_select_changes_element_type() {
    let registry = registry();
    let selected = query(&registry).select("Age * 2", &[]).unwrap();
    assert_eq!(selected.element_type(), &Type::Int32);
    assert_eq!(
        selected.into_items(),
        vec![Value::Int32(82), Value::Int32(58), Value::Int32(70), Value::Int32(58), Value::Int32(104)]
    );
}

#[test]
fn test_select_then_filter_on_record() {
    let registry = registry();
    let projected = query(&registry)
        .select("new(Name, Age / 10 as Decade)", &[])
        .and_then(|q| q.filter("Decade == 2", &[]))
        .unwrap();
    assert!(matches!(projected.element_type(), Type::Record(_)));
    assert_eq!(names(&projected), vec!["Baron", "Dana"]);
}

// ============================================================================
// Ordering and paging
// ============================================================================

#[test]
fn test_order_by_keys() {
    let registry = registry();
    let ordered = query(&registry).order_by("Age desc, Name", &[]).unwrap();
    assert_eq!(names(&ordered), vec!["Eli", "Aaron", "Cara", "Baron", "Dana"]);
}

#[test]
fn test_order_by_is_stable() {
    let registry = registry();
    let ordered = query(&registry).order_by("City", &[]).unwrap();
    assert_eq!(names(&ordered), vec!["Cara", "Baron", "Eli", "Aaron", "Dana"]);
}

#[test]
fn test_order_by_descending_puts_nulls_last() {
    let registry = registry();
    let ordered = query(&registry).order_by("Score descending", &[]).unwrap();
    assert_eq!(names(&ordered), vec!["Cara", "Eli", "Aaron", "Dana", "Baron"]);
}

#[test]
fn test_skip_and_take() {
    let registry = registry();
    let page = query(&registry).order_by("Name", &[]).unwrap().skip(1).take(2);
    assert_eq!(names(&page), vec!["Baron", "Cara"]);
    assert!(query(&registry).skip(10).is_empty());
    assert_eq!(query(&registry).take(10).len(), 5);
}

// ============================================================================
// Grouping and quantifiers
// ============================================================================

#[test]
fn test_group_by_first_seen_order() {
    let registry = registry();
    let groups = query(&registry).group_by("City", Some("Name"), &[]).unwrap();
    let keys: Vec<Value> = groups.items().iter().filter_map(|g| g.field("Key")).collect();
    assert_eq!(keys, vec![Value::from("Oslo"), Value::from("Lima"), Value::Null]);

    let oslo = groups.items()[0].field("Items").unwrap();
    assert_eq!(oslo, Value::List(vec![Value::from("Aaron"), Value::from("Dana")]));
}

#[test]
fn test_group_records_can_be_queried() {
    let registry = registry();
    let sizes = query(&registry)
        .group_by("City", None, &[])
        .and_then(|q| q.filter("Items.Count() > 1", &[]))
        .and_then(|q| q.select("Items.Max(Age)", &[]))
        .unwrap();
    assert_eq!(sizes.into_items(), vec![Value::Int32(41), Value::Int32(52)]);
}

#[test]
fn test_any_and_count() {
    let registry = registry();
    let q = query(&registry);
    assert!(q.any(None, &[]).unwrap());
    assert!(q.any(Some("Age > 50"), &[]).unwrap());
    assert!(!q.any(Some("Age > 60"), &[]).unwrap());
    assert_eq!(q.count(None, &[]).unwrap(), 5);
    assert_eq!(q.count(Some("Age == 29"), &[]).unwrap(), 2);
    assert_eq!(q.count(Some("Score == null"), &[]).unwrap(), 1);
}

#[test]
fn test_evaluation_errors_surface() {
    let registry = registry();
    let err = query(&registry).select("Name.Length / (Age - 29)", &[]).unwrap_err();
    assert!(matches!(err, QueryError::Eval(_)));
}
