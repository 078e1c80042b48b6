//! Error types for expression compilation and evaluation.
//!
//! Compilation has exactly one failure type, [`ParseError`], which pairs a
//! message class ([`ErrorKind`]) with the character index where the problem was
//! detected. Nothing is recovered internally: the first error aborts the parse.

use thiserror::Error;

/// A compile-time failure with the source position it was detected at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (at index {position})")]
pub struct ParseError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Character index into the source text
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ErrorKind, position: usize) -> Self {
        ParseError { kind, position }
    }
}

/// Message classes for compile-time failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // Lexical
    #[error("Unterminated string literal")]
    UnterminatedStringLiteral,
    #[error("Syntax error '{0}'")]
    InvalidCharacter(char),
    #[error("Digit expected")]
    DigitExpected,
    #[error("Invalid integer literal '{0}'")]
    InvalidIntegerLiteral(String),
    #[error("Invalid real literal '{0}'")]
    InvalidRealLiteral(String),

    // Structural
    #[error("Syntax error")]
    SyntaxError,
    #[error("Expression expected")]
    ExpressionExpected,
    #[error("Identifier expected")]
    IdentifierExpected,
    #[error("':' expected")]
    ColonExpected,
    #[error("'(' expected")]
    OpenParenExpected,
    #[error("')' or operator expected")]
    CloseParenOrOperatorExpected,
    #[error("')' or ',' expected")]
    CloseParenOrCommaExpected,
    #[error("'.' or '(' expected")]
    DotOrOpenParenExpected,
    #[error("'[' expected")]
    OpenBracketExpected,
    #[error("']' or ',' expected")]
    CloseBracketOrCommaExpected,

    // Semantic
    #[error("The identifier '{0}' was defined more than once")]
    DuplicateIdentifier(String),
    #[error("A table of named values must be the last value supplied")]
    NamedValuesNotLast,
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("No 'it' is in scope")]
    NoItInScope,
    #[error("The 'iif' function requires three arguments")]
    IifRequiresThreeArgs,
    #[error("The first expression must be of type 'Boolean'")]
    FirstExprMustBeBool,
    #[error("Both of the types '{0}' and '{1}' convert to the other")]
    BothTypesConvertToOther(String, String),
    #[error("Neither of the types '{0}' and '{1}' converts to the other")]
    NeitherTypeConvertsToOther(String, String),
    #[error("Expression is missing an 'as' clause")]
    MissingAsClause,
    #[error("Argument list incompatible with lambda expression")]
    ArgsIncompatibleWithLambda,
    #[error("Type '{0}' has no nullable form")]
    TypeHasNoNullableForm(String),
    #[error("'{0}' is not a member of enum type '{1}'")]
    UnknownEnumMember(String, String),

    // Resolution
    #[error("No matching constructor in type '{0}'")]
    NoMatchingConstructor(String),
    #[error("Ambiguous invocation of '{0}' constructor")]
    AmbiguousConstructorInvocation(String),
    #[error("A value of type '{0}' cannot be converted to type '{1}'")]
    CannotConvertValue(String, String),
    #[error("No applicable method '{0}' exists in type '{1}'")]
    NoApplicableMethod(String, String),
    #[error("Methods on type '{0}' are not accessible")]
    MethodsAreInaccessible(String),
    #[error("Method '{0}' in type '{1}' does not return a value")]
    MethodIsVoid(String, String),
    #[error("Ambiguous invocation of method '{0}' in type '{1}'")]
    AmbiguousMethodInvocation(String, String),
    #[error("No property or field '{0}' exists in type '{1}'")]
    UnknownPropertyOrField(String, String),
    #[error("No applicable aggregate method '{0}' exists")]
    NoApplicableAggregate(String),
    #[error("Array index must be a single integer expression")]
    InvalidIndex,
    #[error("No applicable indexer exists in type '{0}'")]
    NoApplicableIndexer(String),
    #[error("Ambiguous invocation of indexer in type '{0}'")]
    AmbiguousIndexerInvocation(String),
    #[error("Operator '{0}' incompatible with operand type '{1}'")]
    IncompatibleOperand(String, String),
    #[error("Operator '{0}' incompatible with operand types '{1}' and '{2}'")]
    IncompatibleOperands(String, String, String),
    #[error("Expression of type '{0}' expected")]
    ExpressionTypeMismatch(String),
}

/// Errors raised while evaluating a compiled expression tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A value did not have the type the tree promised
    #[error("Type error: {0}")]
    TypeError(String),

    /// Checked arithmetic or a checked conversion overflowed
    #[error("Arithmetic operation resulted in an overflow")]
    Overflow,

    /// Integral or decimal division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Member access or call on a null instance
    #[error("Null reference: cannot access '{0}' on a null value")]
    NullReference(String),

    /// Array index outside of bounds
    #[error("Index {0} was outside the bounds of the array")]
    IndexOutOfRange(i64),

    /// A lambda parameter had no value bound in the environment
    #[error("Parameter '{0}' has no value in the current scope")]
    UnboundParameter(String),

    /// A sequence operation required at least one element
    #[error("Sequence contains no elements")]
    EmptySequence,

    /// Text could not be parsed into the requested type
    #[error("Input string '{0}' was not in a correct format")]
    InvalidFormat(String),

    /// A host invoker reported a failure
    #[error("{0}")]
    Host(String),
}

/// Failure of a [`crate::queryable::Query`] operator: either its text did not
/// compile or an element failed to evaluate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
