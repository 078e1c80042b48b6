// tests/parser_tests.rs

use dynq::error::ErrorKind;
use dynq::{
    AggregateMethod, BinaryOp, Binding, EnumType, ExprKind, ExpressionCompiler, Parameter, RecordFactory, Type,
    TypeDef, TypeRegistry, Value,
};
use rstest::rstest;

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

fn person() -> Type {
    Type::class("Person")
}

// ============================================================================
// Precedence
// ============================================================================

#[rstest]
#[case("1 + 2 * 3", "(1 + (2 * 3))")]
#[case("(1 + 2) * 3", "((1 + 2) * 3)")]
#[case("1 - 2 - 3", "((1 - 2) - 3)")]
#[case("10 % 4 * 2", "((10 % 4) * 2)")]
#[case("10 mod 4", "(10 % 4)")]
#[case("-5 * 2", "(-5 * 2)")]
fn test_arithmetic_precedence(#[case] input: &str, #[case] expected: &str) {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry).parse(input, None, &[]).unwrap();
    assert_eq!(expr.to_string(), expected);
    assert_eq!(expr.ty, Type::Int32);
}

#[test]
fn test_and_binds_tighter_than_or() {
    let registry = registry();
    let parameters = ["a", "b", "c"].map(|name| Parameter::new(name, Type::Boolean));
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda(&parameters, Some(&Type::Boolean), "a or b and c", &[])
        .unwrap();
    assert_eq!(lambda.body.to_string(), "(a || (b && c))");
}

#[test]
fn test_ternary_is_lowest() {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry)
        .parse("1 < 2 ? 3 + 4 : 5", None, &[])
        .unwrap();
    assert_eq!(expr.to_string(), "IIF((1 < 2), (3 + 4), 5)");
}

// ============================================================================
// Literals
// ============================================================================

#[rstest]
#[case("2147483647", Type::Int32)]
#[case("2147483648", Type::UInt32)]
#[case("4294967296", Type::Int64)]
#[case("9223372036854775808", Type::UInt64)]
#[case("-2147483648", Type::Int32)]
#[case("-2147483649", Type::Int64)]
#[case("1.5", Type::Double)]
#[case("1.5F", Type::Single)]
#[case("\"text\"", Type::String)]
#[case("'x'", Type::Char)]
#[case("'xy'", Type::String)]
#[case("true", Type::Boolean)]
fn test_literal_types(#[case] input: &str, #[case] expected: Type) {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry).parse(input, None, &[]).unwrap();
    assert_eq!(expr.ty, expected);
}

#[test]
fn test_integer_literal_too_large() {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse("18446744073709551616", None, &[])
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidIntegerLiteral(_)));
}

#[test]
fn test_literal_reparsed_at_requested_type() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);

    let expr = compiler.parse("2147483647", Some(&Type::Int32), &[]).unwrap();
    assert_eq!(expr.literal_text(), Some("2147483647"));

    let nullable = Type::Int32.nullable();
    let expr = compiler.parse("2147483647", Some(&nullable), &[]).unwrap();
    assert_eq!(expr.ty, nullable);
    assert!(matches!(&expr.kind, ExprKind::Literal(l) if l.value == Value::Int32(i32::MAX)));

    let err = compiler.parse("2147483648", Some(&Type::Int32), &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExpressionTypeMismatch("Int32".to_string()));

    let expr = compiler.parse("2147483648", Some(&Type::Int64), &[]).unwrap();
    assert!(matches!(&expr.kind, ExprKind::Literal(l) if l.value == Value::Int64(2147483648)));
}

#[test]
fn test_doubled_quote_unescapes() {
    let registry = registry();
    let expr = ExpressionCompiler::new(&registry)
        .parse(r#""say ""hi""""#, None, &[])
        .unwrap();
    assert!(matches!(&expr.kind, ExprKind::Literal(l) if l.value == Value::from("say \"hi\"")));
}

// ============================================================================
// Scopes and identifiers
// ============================================================================

#[test]
fn test_where_binds_it_to_element_type() {
    let registry = registry();
    let x = Parameter::new("x", person());
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda(&[x], None, "x.Items.Where(it > 1).Count()", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Int32);

    let ExprKind::Aggregate {
        source,
        method: AggregateMethod::Count,
        selector: None,
    } = &lambda.body.kind
    else {
        panic!("Expected Count, got {}", lambda.body);
    };
    let ExprKind::Aggregate {
        method: AggregateMethod::Where,
        selector: Some(predicate),
        ..
    } = &source.kind
    else {
        panic!("Expected Where, got {}", source);
    };
    assert_eq!(predicate.parameters.len(), 1);
    assert_eq!(predicate.parameters[0].ty, Type::Int32);
}

#[test]
fn test_nested_it_does_not_leak_out_of_aggregate() {
    let registry = registry();
    let x = Parameter::new("x", person());
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda(&[x], None, "x.Items.Where(it > 1).Count() == it", &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoItInScope);
}

#[test]
fn test_aggregate_selector_sees_element_members() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Orders.Sum(Total * Quantity)", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Decimal);

    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Orders.Average(Quantity)", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Double);
}

#[test]
fn test_unknown_aggregate() {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Orders.Sum(Name)", &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoApplicableAggregate("Sum".to_string()));
}

#[test]
fn test_implicit_it_members_and_case() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), Some(&Type::Boolean), "age > 30 AND name.Length < 10", &[])
        .unwrap();
    assert_eq!(lambda.body.to_string(), "((it.Age > 30) && (it.Name.Length < 10))");
}

#[test]
fn test_unknown_identifier() {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Salary > 10", &[])
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnknownPropertyOrField("Salary".to_string(), "Person".to_string())
    );
    assert_eq!(err.position, 0);

    let err = ExpressionCompiler::new(&registry).parse("Salary", None, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownIdentifier("Salary".to_string()));
}

#[test]
fn test_positional_and_named_values() {
    let registry = registry();
    let named: Binding = [("Minimum", Binding::Value(Value::Int32(18)))].into_iter().collect();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(
            &person(),
            Some(&Type::Boolean),
            "Age >= minimum && Name == @0",
            &[Value::from("Aaron").into(), named],
        )
        .unwrap();
    assert_eq!(lambda.body.to_string(), "((it.Age >= 18) && (it.Name == \"Aaron\"))");
}

#[test]
fn test_lambda_value_invocation() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    let double = compiler
        .parse_lambda(&[Parameter::new("n", Type::Int32)], None, "n * 2", &[])
        .unwrap();
    let values = [Binding::Lambda(double)];

    let expr = compiler.parse("@0(21)", None, &values).unwrap();
    assert_eq!(expr.ty, Type::Int32);

    let err = compiler.parse("@0(\"x\")", None, &values).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgsIncompatibleWithLambda);
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_enum_literal_path() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), Some(&Type::Boolean), "Color == Green", &[])
        .unwrap();
    let ExprKind::Binary {
        op: BinaryOp::Equal,
        left,
        right,
    } = &lambda.body.kind
    else {
        panic!("Expected equality, got {}", lambda.body);
    };
    assert!(left.ty.is_enum());
    assert_eq!(left.ty, right.ty);
    assert!(matches!(&right.kind, ExprKind::Literal(l) if matches!(l.value, Value::Enum(_, 1))));
}

#[rstest]
#[case("Color == (Green)")]
#[case("Color != ((Red))")]
#[case("Color == iif(Age > 1, Green, Red)")]
#[case("Color == (Age > 1 ? Green : Red)")]
fn test_enum_literal_through_parens_and_branches(#[case] input: &str) {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), Some(&Type::Boolean), input, &[])
        .unwrap();
    let ExprKind::Binary { left, right, .. } = &lambda.body.kind else {
        panic!("Expected a comparison, got {}", lambda.body);
    };
    assert!(left.ty.is_enum());
    assert_eq!(left.ty, right.ty);
}

#[test]
fn test_enum_member_by_string_and_type_name() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    assert!(
        compiler
            .parse_lambda_with_it(&person(), Some(&Type::Boolean), "Color == \"Red\"", &[])
            .is_ok()
    );

    let color = registry.lookup("Color").unwrap();
    assert!(
        compiler
            .parse_lambda(&[Parameter::new("c", color)], Some(&Type::Boolean), "c != Color.Green", &[])
            .is_ok()
    );
}

#[test]
fn test_unknown_enum_member() {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Color == Blue", &[])
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnknownEnumMember("Blue".to_string(), "Color".to_string())
    );
}

#[test]
fn test_string_ordering_uses_compare() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Name < \"M\"", &[])
        .unwrap();
    assert_eq!(lambda.body.to_string(), "(String.Compare(it.Name, \"M\") < 0)");
}

#[test]
fn test_concatenation_boxes_operands() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Name & \" is \" + Age", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::String);
    assert!(lambda.body.to_string().contains("Convert(it.Age, Object)"));
}

#[test]
fn test_mixed_numeric_operands_widen() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Age * 1.5", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Double);
    assert_eq!(lambda.body.to_string(), "(Convert(it.Age, Double) * 1.5)");

    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, "Score + Age", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Double.nullable());
}

#[rstest]
#[case("Name + 1 > true", "'>'")]
#[case("Age && true", "'&&'")]
#[case("-Name", "'-'")]
#[case("!Age", "'!'")]
fn test_incompatible_operands(#[case] input: &str, #[case] operator: &str) {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, input, &[])
        .unwrap_err();
    assert!(
        err.to_string().contains(operator),
        "unexpected error for {}: {}",
        input,
        err
    );
}

#[test]
fn test_null_comparison_lifts_value_type() {
    let registry = registry();
    let lambda = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), Some(&Type::Boolean), "Score != null and Manager == null", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Boolean);
}

#[test]
fn test_conditional_branches_reconcile() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    let expr = compiler.parse("iif(true, 1, 2.5)", None, &[]).unwrap();
    assert_eq!(expr.ty, Type::Double);

    let expr = compiler.parse("true ? null : \"a\"", None, &[]).unwrap();
    assert_eq!(expr.ty, Type::String);

    let expr = compiler.parse("false ? Int32?(1) : null", None, &[]).unwrap();
    assert_eq!(expr.ty, Type::Int32.nullable());

    let err = compiler.parse("true ? \"a\" : 5", None, &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NeitherTypeConvertsToOther(_, _)));

    let err = compiler.parse("1 ? 2 : 3", None, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FirstExprMustBeBool);
}

// ============================================================================
// Projections
// ============================================================================

#[test]
fn test_new_creates_record_type() {
    let registry = registry();
    let records = RecordFactory::new();
    let lambda = ExpressionCompiler::new(&registry)
        .with_record_factory(&records)
        .parse_lambda_with_it(&person(), None, "new(Name, Age * 12 as Months)", &[])
        .unwrap();
    let Type::Record(record) = lambda.return_type() else {
        panic!("Expected record type, got {}", lambda.return_type());
    };
    assert_eq!(record.names().collect::<Vec<_>>(), vec!["Name", "Months"]);
    assert_eq!(record.field("months").map(|(_, ty)| ty.clone()), Some(Type::Int32));
    assert_eq!(records.len(), 1);
}

#[rstest]
#[case("new(Age + 1)", ErrorKind::MissingAsClause)]
#[case("new(Name, Age as name)", ErrorKind::DuplicateIdentifier("name".to_string()))]
fn test_new_errors(#[case] input: &str, #[case] expected: ErrorKind) {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&person(), None, input, &[])
        .unwrap_err();
    assert_eq!(err.kind, expected);
}

// ============================================================================
// Types, methods and indexing
// ============================================================================

#[test]
fn test_static_and_instance_methods() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    let expr = compiler.parse("Math.Abs(-3)", None, &[]).unwrap();
    assert_eq!(expr.ty, Type::Int32);

    let lambda = compiler
        .parse_lambda_with_it(&person(), None, "Name.ToUpper().StartsWith(\"A\")", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Boolean);

    let err = compiler
        .parse_lambda_with_it(&person(), None, "Name.Explode()", &[])
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::NoApplicableMethod("Explode".to_string(), "String".to_string())
    );
}

#[test]
fn test_type_conversions() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    assert_eq!(compiler.parse("Int64(5)", None, &[]).unwrap().ty, Type::Int64);
    assert_eq!(compiler.parse("Int32?(5)", None, &[]).unwrap().ty, Type::Int32.nullable());

    let err = compiler.parse("String?(\"a\")", None, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeHasNoNullableForm("String".to_string()));
}

#[test]
fn test_array_index() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    let lambda = compiler
        .parse_lambda_with_it(&person(), None, "Items[0] + Items[Items.Length - 1]", &[])
        .unwrap();
    assert_eq!(lambda.return_type(), &Type::Int32);

    let err = compiler
        .parse_lambda_with_it(&person(), None, "Items[\"a\"]", &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidIndex);

    let err = compiler
        .parse_lambda_with_it(&person(), None, "Items[0, 1]", &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidIndex);
    assert_eq!(err.position, 5);
}

// ============================================================================
// Resolution errors
// ============================================================================

fn host_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    let hidden = registry.register(
        TypeDef::class("Hidden").method("Go", [Type::Int32], Some(Type::Int32), |_, args| Ok(args[0].clone())),
    );
    let plain = registry.register(TypeDef::class("Plain").property("Size", Type::Int32));
    registry.register(
        TypeDef::class("Host")
            .predefined()
            .property("Hidden", hidden)
            .property("N", plain)
            .method("Nothing", [Type::Int32; 0], None, |_, _| Ok(Value::Null))
            .method("F", [Type::Int32, Type::Int64], Some(Type::Int32), |_, _| Ok(Value::Int32(1)))
            .method("F", [Type::Int64, Type::Int32], Some(Type::Int32), |_, _| Ok(Value::Int32(2))),
    );
    registry
}

#[rstest]
#[case("Hidden.Go(1)", ErrorKind::MethodsAreInaccessible("Hidden".to_string()), 7)]
#[case("Nothing()", ErrorKind::MethodIsVoid("Nothing".to_string(), "Host".to_string()), 0)]
#[case("F(1, 2)", ErrorKind::AmbiguousMethodInvocation("F".to_string(), "Host".to_string()), 0)]
#[case("Guid(1, 2)", ErrorKind::NoMatchingConstructor("Guid".to_string()), 0)]
#[case("1 + Int32(\"x\")", ErrorKind::CannotConvertValue("String".to_string(), "Int32".to_string()), 4)]
#[case("N[0]", ErrorKind::NoApplicableIndexer("Plain".to_string()), 1)]
fn test_resolution_errors(#[case] input: &str, #[case] expected: ErrorKind, #[case] position: usize) {
    let registry = host_registry();
    let err = ExpressionCompiler::new(&registry)
        .parse_lambda_with_it(&Type::class("Host"), None, input, &[])
        .unwrap_err();
    assert_eq!(err.kind, expected, "for {}", input);
    assert_eq!(err.position, position, "for {}", input);
}

// ============================================================================
// Errors and determinism
// ============================================================================

#[test]
fn test_missing_operand_position() {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry).parse("1 +", None, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExpressionExpected);
    assert_eq!(err.position, 3);
}

#[rstest]
#[case("(1 + 2", ErrorKind::CloseParenOrOperatorExpected)]
#[case("1 2", ErrorKind::SyntaxError)]
#[case("true ? 1", ErrorKind::ColonExpected)]
#[case("iif(true, 1)", ErrorKind::IifRequiresThreeArgs)]
#[case("it", ErrorKind::NoItInScope)]
fn test_structural_errors(#[case] input: &str, #[case] expected: ErrorKind) {
    let registry = registry();
    let err = ExpressionCompiler::new(&registry).parse(input, None, &[]).unwrap_err();
    assert_eq!(err.kind, expected);
}

#[test]
fn test_parsing_is_deterministic() {
    let registry = registry();
    let compiler = ExpressionCompiler::new(&registry);
    let text = "new(Name, Orders.Where(Total > 100).Count() as Big) ";
    let it = Parameter::it(person());
    let first = compiler.parse_lambda(std::slice::from_ref(&it), None, text, &[]).unwrap();
    let second = compiler.parse_lambda(std::slice::from_ref(&it), None, text, &[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_ordering_keys() {
    let registry = registry();
    let orderings = ExpressionCompiler::new(&registry)
        .parse_ordering(&[Parameter::it(person())], "Name, Age desc, Score ascending", &[])
        .unwrap();
    let directions: Vec<_> = orderings.iter().map(|o| o.ascending).collect();
    assert_eq!(directions, vec![true, false, true]);
    assert_eq!(orderings[1].selector.ty, Type::Int32);
}
