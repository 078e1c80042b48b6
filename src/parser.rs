//! Recursive-descent compiler from expression text to a typed [`Expr`] tree.
//!
//! Every operator, member access and call is bound while it is parsed, so a
//! successful parse yields a tree that needs no further checking. See
//! [`crate::ast`] for the grammar.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::ast::{
    BinaryOp, Expr, ExprKind, Lambda, Literal, Ordering, Parameter, Token, TokenKind, UnaryOp,
};
use crate::error::{ErrorKind, ParseError};
use crate::lexer::Lexer;
use crate::overload::{OverloadResolver, Resolution};
use crate::promote::Promoter;
use crate::record::{RecordFactory, Signature};
use crate::signatures::{self, OperatorFamily};
use crate::symbols::{Binding, SymbolTable};
use crate::types::{EnumType, MethodDef, ParamDef, Type, TypeRegistry, builtins};
use crate::value::Value;

#[derive(Debug, Clone)]
enum Keyword {
    True,
    False,
    Null,
    It,
    Iif,
    New,
    Type(Type),
}

static KEYWORDS: LazyLock<HashMap<String, Keyword>> = LazyLock::new(|| {
    let mut keywords = HashMap::from([
        ("true".to_string(), Keyword::True),
        ("false".to_string(), Keyword::False),
        ("null".to_string(), Keyword::Null),
        ("it".to_string(), Keyword::It),
        ("iif".to_string(), Keyword::Iif),
        ("new".to_string(), Keyword::New),
    ]);
    for ty in builtins::PREDEFINED_TYPES {
        keywords.insert(ty.name().to_lowercase(), Keyword::Type(ty));
    }
    keywords
});

/// Entry point for compiling expressions against a set of host types.
///
/// # Examples
///
/// ```
/// use dynq::{ExpressionCompiler, Type, TypeDef, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// let person = registry.register(
///     TypeDef::class("Person")
///         .property("Name", Type::String)
///         .property("Age", Type::Int32),
/// );
///
/// let compiler = ExpressionCompiler::new(&registry);
/// let lambda = compiler
///     .parse_lambda_with_it(&person, Some(&Type::Boolean), "Age > 30 and Name like 'A*'", &[])
///     .unwrap();
/// assert_eq!(lambda.return_type(), &Type::Boolean);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExpressionCompiler<'r> {
    registry: &'r TypeRegistry,
    records: &'r RecordFactory,
}

impl<'r> ExpressionCompiler<'r> {
    /// Projections register their record types with [`RecordFactory::global`].
    pub fn new(registry: &'r TypeRegistry) -> Self {
        ExpressionCompiler {
            registry,
            records: RecordFactory::global(),
        }
    }

    pub fn with_record_factory(mut self, records: &'r RecordFactory) -> Self {
        self.records = records;
        self
    }

    pub fn record_factory(&self) -> &'r RecordFactory {
        self.records
    }

    /// Compiles a standalone expression. With `result_type`, the expression
    /// must be promotable to that type.
    pub fn parse(
        &self,
        text: &str,
        result_type: Option<&Type>,
        values: &[Binding],
    ) -> Result<Expr, ParseError> {
        log::debug!("parsing expression {:?}", text);
        let mut parser = Parser::new(self, &[], text, values)?;
        let expr = parser.parse(result_type)?;
        log::debug!("parsed {:?} as {}: {}", text, expr.ty, expr);
        Ok(expr)
    }

    /// Compiles `text` as the body of a lambda over `parameters`. Named
    /// parameters are visible by name; a single unnamed one is `it`.
    pub fn parse_lambda(
        &self,
        parameters: &[Parameter],
        result_type: Option<&Type>,
        text: &str,
        values: &[Binding],
    ) -> Result<Lambda, ParseError> {
        log::debug!("parsing lambda over {} parameter(s): {:?}", parameters.len(), text);
        let mut parser = Parser::new(self, parameters, text, values)?;
        let body = parser.parse(result_type)?;
        let lambda = Lambda::new(parameters.to_vec(), body);
        log::debug!("parsed lambda {}", lambda);
        Ok(lambda)
    }

    /// [`Self::parse_lambda`] over a single unnamed parameter of `it_type`.
    pub fn parse_lambda_with_it(
        &self,
        it_type: &Type,
        result_type: Option<&Type>,
        text: &str,
        values: &[Binding],
    ) -> Result<Lambda, ParseError> {
        self.parse_lambda(&[Parameter::it(it_type.clone())], result_type, text, values)
    }

    /// Compiles a comma separated list of sort keys, each optionally followed
    /// by `asc`, `ascending`, `desc` or `descending`.
    pub fn parse_ordering(
        &self,
        parameters: &[Parameter],
        text: &str,
        values: &[Binding],
    ) -> Result<Vec<Ordering>, ParseError> {
        log::debug!("parsing ordering {:?}", text);
        let mut parser = Parser::new(self, parameters, text, values)?;
        let orderings = parser.parse_ordering()?;
        log::debug!("parsed {} ordering key(s)", orderings.len());
        Ok(orderings)
    }
}

struct Parser<'r> {
    registry: &'r TypeRegistry,
    records: &'r RecordFactory,
    promoter: Promoter<'r>,
    lexer: Lexer,
    current_token: Token,
    symbols: SymbolTable,
    it: Option<Parameter>,
    /// Enum type of the left operand while the right side of a comparison
    /// starts; lets a bare member name stand for the enum constant.
    enum_hint: Option<Arc<EnumType>>,
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let ty = match op {
        op if op.is_comparison() => Type::Boolean,
        BinaryOp::OrElse | BinaryOp::AndAlso => left.ty.clone(),
        _ => signatures::arithmetic_result_type(&left.ty, &right.ty),
    };
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        ty,
    )
}

fn static_call(ty: &Type, name: &str, params: &[Type], args: Vec<Expr>) -> Option<Expr> {
    let method = builtins::static_method(ty, name, params)?;
    let returns = method.returns.clone()?;
    Some(Expr::new(
        ExprKind::Call {
            instance: None,
            method,
            args,
        },
        returns,
    ))
}

fn incompatible_operands(op: &Token, left: &Expr, right: &Expr) -> ParseError {
    ParseError::new(
        ErrorKind::IncompatibleOperands(op.text.clone(), left.ty.to_string(), right.ty.to_string()),
        op.position,
    )
}

impl<'r> Parser<'r> {
    fn new(
        compiler: &ExpressionCompiler<'r>,
        parameters: &[Parameter],
        text: &str,
        values: &[Binding],
    ) -> Result<Self, ParseError> {
        let mut symbols = SymbolTable::new();
        let it = symbols
            .add_parameters(parameters)
            .map_err(|kind| ParseError::new(kind, 0))?;
        symbols
            .add_values(values)
            .map_err(|kind| ParseError::new(kind, 0))?;
        let mut lexer = Lexer::new(text);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            registry: compiler.registry,
            records: compiler.records,
            promoter: Promoter::new(compiler.registry),
            lexer,
            current_token,
            symbols,
            it,
            enum_hint: None,
        })
    }

    fn resolver(&self) -> OverloadResolver<'_, 'r> {
        OverloadResolver::new(&self.promoter)
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token.kind == kind
    }

    fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError::new(kind, self.current_token.position)
    }

    fn validate(&self, kind: TokenKind, error: ErrorKind) -> Result<(), ParseError> {
        if self.check(kind) {
            Ok(())
        } else {
            Err(self.error(error))
        }
    }

    fn expect(&mut self, kind: TokenKind, error: ErrorKind) -> Result<(), ParseError> {
        self.validate(kind, error)?;
        self.advance()
    }

    /// Current identifier with a leading `@` removed.
    fn identifier(&self) -> Result<String, ParseError> {
        self.validate(TokenKind::Identifier, ErrorKind::IdentifierExpected)?;
        let text = &self.current_token.text;
        match text.strip_prefix('@') {
            Some(rest) if !rest.is_empty() => Ok(rest.to_string()),
            _ => Ok(text.clone()),
        }
    }

    fn parse(&mut self, result_type: Option<&Type>) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        let mut expr = self.parse_expression()?;
        if let Some(ty) = result_type {
            expr = self.promoter.promote(&expr, ty, true).ok_or_else(|| {
                ParseError::new(ErrorKind::ExpressionTypeMismatch(ty.to_string()), position)
            })?;
        }
        self.validate(TokenKind::End, ErrorKind::SyntaxError)?;
        Ok(expr)
    }

    fn parse_ordering(&mut self) -> Result<Vec<Ordering>, ParseError> {
        let mut orderings = Vec::new();
        loop {
            let selector = self.parse_expression()?;
            let mut ascending = true;
            if self.current_token.is_identifier("asc") || self.current_token.is_identifier("ascending") {
                self.advance()?;
            } else if self.current_token.is_identifier("desc")
                || self.current_token.is_identifier("descending")
            {
                self.advance()?;
                ascending = false;
            }
            orderings.push(Ordering { selector, ascending });
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        self.validate(TokenKind::End, ErrorKind::SyntaxError)?;
        Ok(orderings)
    }

    // ========================================================================
    // Operators, lowest precedence first
    // ========================================================================

    /// `test ? if_true : if_false`
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        let enum_hint = self.enum_hint.clone();
        let expr = self.parse_logical_or()?;
        if self.check(TokenKind::Question) {
            self.advance()?;
            self.enum_hint = enum_hint.clone();
            let if_true = self.parse_expression()?;
            self.expect(TokenKind::Colon, ErrorKind::ColonExpected)?;
            self.enum_hint = enum_hint;
            let if_false = self.parse_expression()?;
            return self.conditional(expr, if_true, if_false, position);
        }
        Ok(expr)
    }

    /// `||`, `or`
    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.check(TokenKind::DoubleBar) || self.current_token.is_identifier("or") {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_logical_and()?;
            let (l, r) = self.bind_operands(OperatorFamily::Logical, &op, left, right)?;
            left = binary(BinaryOp::OrElse, l, r);
        }
        Ok(left)
    }

    /// `&&`, `and`
    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::DoubleAmpersand) || self.current_token.is_identifier("and") {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_comparison()?;
            let (l, r) = self.bind_operands(OperatorFamily::Logical, &op, left, right)?;
            left = binary(BinaryOp::AndAlso, l, r);
        }
        Ok(left)
    }

    /// `=`, `==`, `!=`, `<>`, `>`, `>=`, `<`, `<=`, `like`
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_token.kind {
                TokenKind::Equal | TokenKind::DoubleEqual => BinaryOp::Equal,
                TokenKind::ExclamationEqual | TokenKind::LessGreater => BinaryOp::NotEqual,
                TokenKind::GreaterThan => BinaryOp::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOp::GreaterThanOrEqual,
                TokenKind::LessThan => BinaryOp::LessThan,
                TokenKind::LessThanEqual => BinaryOp::LessThanOrEqual,
                TokenKind::Like => {
                    left = self.parse_like(left)?;
                    continue;
                }
                _ => return Ok(left),
            };
            let token = self.current_token.clone();
            self.advance()?;
            self.enum_hint = left.ty.as_enum().cloned();
            let right = self.parse_additive();
            self.enum_hint = None;
            left = self.comparison(op, &token, left, right?)?;
        }
    }

    fn comparison(&self, op: BinaryOp, token: &Token, left: Expr, right: Expr) -> Result<Expr, ParseError> {
        let is_equality = matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);
        let (left, right) = if is_equality && !left.ty.is_value_type() && !right.ty.is_value_type() {
            if left.ty == right.ty {
                (left, right)
            } else if self.registry.is_assignable(&left.ty, &right.ty) {
                let ty = left.ty.clone();
                (left, right.convert(ty))
            } else if self.registry.is_assignable(&right.ty, &left.ty) {
                let ty = right.ty.clone();
                (left.convert(ty), right)
            } else {
                return Err(incompatible_operands(token, &left, &right));
            }
        } else if left.ty.is_enum() || right.ty.is_enum() {
            self.enum_operands(token, left, right)?
        } else {
            let family = if is_equality {
                OperatorFamily::Equality
            } else {
                OperatorFamily::Relational
            };
            self.bind_operands(family, token, left, right)?
        };

        if !is_equality && left.ty == Type::String {
            let compare = static_call(
                &Type::String,
                "Compare",
                &[Type::String, Type::String],
                vec![left, right],
            )
            .ok_or_else(|| {
                ParseError::new(
                    ErrorKind::NoApplicableMethod("Compare".to_string(), Type::String.to_string()),
                    token.position,
                )
            })?;
            return Ok(binary(op, compare, Expr::constant(Value::Int32(0), Type::Int32)));
        }
        Ok(binary(op, left, right))
    }

    /// Brings an enum operand and its counterpart to the same type, trying
    /// the right side first.
    fn enum_operands(&self, token: &Token, left: Expr, right: Expr) -> Result<(Expr, Expr), ParseError> {
        if left.ty == right.ty {
            return Ok((left, right));
        }
        if let Some(promoted) = self.promoter.promote(&right, &left.ty, true) {
            return Ok((left, promoted));
        }
        if let Some(promoted) = self.promoter.promote(&left, &right.ty, true) {
            return Ok((promoted, right));
        }
        for (side, other) in [(&left, &right), (&right, &left)] {
            if let (Some(def), Some(text)) = (side.ty.as_enum(), other.literal_text()) {
                if other.ty == Type::String {
                    return Err(ParseError::new(
                        ErrorKind::UnknownEnumMember(text.to_string(), def.name.clone()),
                        token.position,
                    ));
                }
            }
        }
        Err(incompatible_operands(token, &left, &right))
    }

    /// `input like pattern`: both sides must be text; a literal pattern may
    /// use `%` in place of `*`.
    fn parse_like(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let token = self.current_token.clone();
        self.advance()?;
        let right = self.parse_additive()?;
        let operands = self
            .promoter
            .promote(&left, &Type::String, false)
            .zip(self.promoter.promote(&right, &Type::String, false));
        let Some((input, pattern)) = operands else {
            return Err(incompatible_operands(&token, &left, &right));
        };
        let pattern = match &pattern.kind {
            ExprKind::Literal(Literal {
                value: Value::String(text),
                ..
            }) => Expr::constant(Value::String(text.replace('%', "*")), Type::String),
            _ => pattern,
        };
        static_call(
            &Type::String,
            "Like",
            &[Type::String, Type::String],
            vec![input, pattern],
        )
        .ok_or_else(|| incompatible_operands(&token, &left, &right))
    }

    /// `+`, `-`, `&`
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while matches!(
            self.current_token.kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Ampersand
        ) {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = match op.kind {
                TokenKind::Plus if left.ty != Type::String && right.ty != Type::String => {
                    let (l, r) = self.bind_operands(OperatorFamily::Add, &op, left, right)?;
                    binary(BinaryOp::Add, l, r)
                }
                TokenKind::Minus => {
                    let (l, r) = self.bind_operands(OperatorFamily::Subtract, &op, left, right)?;
                    binary(BinaryOp::Subtract, l, r)
                }
                _ => self.concat(&op, left, right)?,
            };
        }
        Ok(left)
    }

    fn concat(&self, op: &Token, left: Expr, right: Expr) -> Result<Expr, ParseError> {
        let boxed = |e: Expr| {
            if e.ty.is_value_type() {
                e.convert(Type::Object)
            } else {
                e
            }
        };
        let error = incompatible_operands(op, &left, &right);
        static_call(
            &Type::String,
            "Concat",
            &[Type::Object, Type::Object],
            vec![boxed(left), boxed(right)],
        )
        .ok_or(error)
    }

    /// `*`, `/`, `%`, `mod`
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_token.kind {
                TokenKind::Asterisk => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ if self.current_token.is_identifier("mod") => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            let token = self.current_token.clone();
            self.advance()?;
            let right = self.parse_unary()?;
            let (l, r) = self.bind_operands(OperatorFamily::Arithmetic, &token, left, right)?;
            left = binary(op, l, r);
        }
    }

    /// `-`, `!`, `not`. A minus directly in front of a numeric literal becomes
    /// part of the literal, so `-2147483648` is an `Int32`.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::Minus)
            || self.check(TokenKind::Exclamation)
            || self.current_token.is_identifier("not")
        {
            let token = self.current_token.clone();
            self.advance()?;
            if token.kind == TokenKind::Minus
                && matches!(
                    self.current_token.kind,
                    TokenKind::IntegerLiteral | TokenKind::RealLiteral
                )
            {
                self.current_token.text = format!("-{}", self.current_token.text);
                self.current_token.position = token.position;
                return self.parse_primary();
            }
            let operand = self.parse_unary()?;
            let (family, op) = if token.kind == TokenKind::Minus {
                (OperatorFamily::Negation, UnaryOp::Negate)
            } else {
                (OperatorFamily::Not, UnaryOp::Not)
            };
            let operand = self.bind_operand(family, &token, operand)?;
            let ty = operand.ty.clone();
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                ty,
            ));
        }
        self.parse_primary()
    }

    fn bind_operands(
        &self,
        family: OperatorFamily,
        op: &Token,
        left: Expr,
        right: Expr,
    ) -> Result<(Expr, Expr), ParseError> {
        let operands = [left, right];
        let promoted = family
            .bind(&self.resolver(), &operands)
            .and_then(|args| <[Expr; 2]>::try_from(args).ok());
        match promoted {
            Some([l, r]) => Ok((l, r)),
            None => Err(incompatible_operands(op, &operands[0], &operands[1])),
        }
    }

    fn bind_operand(&self, family: OperatorFamily, op: &Token, operand: Expr) -> Result<Expr, ParseError> {
        family
            .bind(&self.resolver(), std::slice::from_ref(&operand))
            .and_then(|args| args.into_iter().next())
            .ok_or_else(|| {
                ParseError::new(
                    ErrorKind::IncompatibleOperand(op.text.clone(), operand.ty.to_string()),
                    op.position,
                )
            })
    }

    /// Reconciles the branch types of `?:` and `iif`. Exactly one branch
    /// must convert to the other's type; the `null` keyword only ever
    /// converts, it is never the target.
    fn conditional(
        &self,
        test: Expr,
        if_true: Expr,
        if_false: Expr,
        position: usize,
    ) -> Result<Expr, ParseError> {
        if test.ty != Type::Boolean {
            return Err(ParseError::new(ErrorKind::FirstExprMustBeBool, position));
        }
        let (if_true, if_false) = if if_true.ty != if_false.ty {
            let true_as_false = if if_false.is_null_literal() {
                None
            } else {
                self.promoter.promote(&if_true, &if_false.ty, true)
            };
            let false_as_true = if if_true.is_null_literal() {
                None
            } else {
                self.promoter.promote(&if_false, &if_true.ty, true)
            };
            match (true_as_false, false_as_true) {
                (Some(promoted), None) => (promoted, if_false),
                (None, Some(promoted)) => (if_true, promoted),
                (both, _) => {
                    let name = |e: &Expr| {
                        if e.is_null_literal() {
                            "null".to_string()
                        } else {
                            e.ty.to_string()
                        }
                    };
                    let (t1, t2) = (name(&if_true), name(&if_false));
                    let kind = if both.is_some() {
                        ErrorKind::BothTypesConvertToOther(t1, t2)
                    } else {
                        ErrorKind::NeitherTypeConvertsToOther(t1, t2)
                    };
                    return Err(ParseError::new(kind, position));
                }
            }
        } else {
            (if_true, if_false)
        };
        let ty = if_true.ty.clone();
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
            ty,
        ))
    }

    // ========================================================================
    // Primary expressions
    // ========================================================================

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_start()?;
        loop {
            if self.check(TokenKind::Dot) {
                self.advance()?;
                let ty = expr.ty.clone();
                expr = self.parse_member_access(ty, Some(expr))?;
            } else if self.check(TokenKind::OpenBracket) {
                expr = self.parse_element_access(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary_start(&mut self) -> Result<Expr, ParseError> {
        let hint = self.enum_hint.take();
        match self.current_token.kind {
            TokenKind::Identifier => self.parse_identifier(hint),
            TokenKind::StringLiteral => self.parse_string_literal(),
            TokenKind::IntegerLiteral => self.parse_integer_literal(),
            TokenKind::RealLiteral => self.parse_real_literal(),
            TokenKind::OpenParen => {
                self.enum_hint = hint;
                self.parse_paren_expression()
            }
            _ => Err(self.error(ErrorKind::ExpressionExpected)),
        }
    }

    /// `"text"` is a `String`; `'c'` is a `Char` when it holds exactly one
    /// character. A doubled quote stands for the quote itself.
    fn parse_string_literal(&mut self) -> Result<Expr, ParseError> {
        let text = &self.current_token.text;
        let quote = text.chars().next().unwrap_or('"');
        let inner = &text[quote.len_utf8()..text.len() - quote.len_utf8()];
        let value = inner.replace(&format!("{quote}{quote}"), &quote.to_string());
        self.advance()?;

        let mut chars = value.chars();
        if let (Some(c), None, '\'') = (chars.next(), chars.next(), quote) {
            return Ok(Expr::literal(Value::Char(c), &value));
        }
        Ok(Expr::literal(Value::String(value.clone()), &value))
    }

    /// Picks the first of `Int32`, `UInt32`, `Int64`, `UInt64` that holds
    /// the value. Negative literals are `Int32` or `Int64`.
    fn parse_integer_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.current_token.text.clone();
        let invalid = || self.error(ErrorKind::InvalidIntegerLiteral(text.clone()));
        let value = if text.starts_with('-') {
            let n: i64 = text.parse().map_err(|_| invalid())?;
            match i32::try_from(n) {
                Ok(n) => Value::Int32(n),
                Err(_) => Value::Int64(n),
            }
        } else {
            let n: u64 = text.parse().map_err(|_| invalid())?;
            if let Ok(n) = i32::try_from(n) {
                Value::Int32(n)
            } else if let Ok(n) = u32::try_from(n) {
                Value::UInt32(n)
            } else if let Ok(n) = i64::try_from(n) {
                Value::Int64(n)
            } else {
                Value::UInt64(n)
            }
        };
        self.advance()?;
        Ok(Expr::literal(value, &text))
    }

    /// `Double`, or `Single` with an `F` suffix.
    fn parse_real_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.current_token.text.clone();
        let value = match text.strip_suffix('F').or_else(|| text.strip_suffix('f')) {
            Some(digits) => digits.parse::<f32>().ok().map(Value::Single),
            None => text.parse::<f64>().ok().map(Value::Double),
        };
        let value = value.ok_or_else(|| self.error(ErrorKind::InvalidRealLiteral(text.clone())))?;
        self.advance()?;
        Ok(Expr::literal(value, &text))
    }

    fn parse_paren_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrOperatorExpected)?;
        Ok(expr)
    }

    /// Resolves a name: keyword or type name, then symbol, then member of
    /// `it`.
    fn parse_identifier(&mut self, enum_hint: Option<Arc<EnumType>>) -> Result<Expr, ParseError> {
        self.validate(TokenKind::Identifier, ErrorKind::IdentifierExpected)?;
        let name = self.current_token.text.clone();

        if let Some(keyword) = KEYWORDS.get(&name.to_lowercase()) {
            let constant = match keyword {
                Keyword::Type(ty) => return self.parse_type_access(ty.clone()),
                Keyword::It => return self.parse_it(),
                Keyword::Iif => return self.parse_iif(enum_hint),
                Keyword::New => return self.parse_new(),
                Keyword::True => Expr::constant(Value::Boolean(true), Type::Boolean),
                Keyword::False => Expr::constant(Value::Boolean(false), Type::Boolean),
                Keyword::Null => Expr::null_literal(),
            };
            self.advance()?;
            return Ok(constant);
        }

        // A member of `it` shadows a registered type of the same name
        let is_it_member = self
            .it
            .as_ref()
            .is_some_and(|it| self.has_member(&it.ty, &name));

        if let Some(ty) = self
            .registry
            .lookup(&name)
            .filter(|ty| !is_it_member && (ty.is_enum() || self.registry.is_predefined(ty)))
        {
            return self.parse_type_access(ty);
        }

        if let Some(binding) = self.symbols.lookup(&name) {
            let expr = match binding.clone() {
                Binding::Lambda(lambda) => return self.parse_lambda_invocation(lambda),
                Binding::Expr(expr) => expr,
                Binding::Value(value) => {
                    let ty = value.type_of();
                    Expr::constant(value, ty)
                }
                Binding::Named(_) => return Err(self.error(ErrorKind::UnknownIdentifier(name))),
            };
            self.advance()?;
            return Ok(expr);
        }

        if let Some(def) = enum_hint {
            if !is_it_member {
                let value = def.member(&name).ok_or_else(|| {
                    self.error(ErrorKind::UnknownEnumMember(name.clone(), def.name.clone()))
                })?;
                self.advance()?;
                return Ok(Expr::constant(Value::Enum(def.clone(), value), Type::Enum(def)));
            }
        }

        if let Some(it) = self.it.clone() {
            return self.parse_member_access(it.ty.clone(), Some(it.to_expr()));
        }
        Err(self.error(ErrorKind::UnknownIdentifier(name)))
    }

    fn has_member(&self, ty: &Type, name: &str) -> bool {
        self.registry.find_property(ty, name, false).is_some()
            || self
                .registry
                .self_and_base_types(ty)
                .iter()
                .any(|t| !self.registry.declared_methods(t, name, false).is_empty())
    }

    fn parse_it(&mut self) -> Result<Expr, ParseError> {
        let it = self.it.clone().ok_or_else(|| self.error(ErrorKind::NoItInScope))?;
        self.advance()?;
        Ok(it.to_expr())
    }

    /// An enum hint from the enclosing comparison applies to both branches.
    fn parse_iif(&mut self, enum_hint: Option<Arc<EnumType>>) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        self.advance()?;
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::CloseParen) {
            loop {
                if !args.is_empty() {
                    self.enum_hint = enum_hint.clone();
                }
                args.push(self.parse_expression()?);
                if !self.check(TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrCommaExpected)?;
        let Ok([test, if_true, if_false]) = <[Expr; 3]>::try_from(args) else {
            return Err(ParseError::new(ErrorKind::IifRequiresThreeArgs, position));
        };
        self.conditional(test, if_true, if_false, position)
    }

    /// `new(expr [as Name], ...)`
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.advance()?;
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let mut properties = Vec::new();
        let mut bindings = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let position = self.current_token.position;
            let expr = self.parse_expression()?;
            let name = if self.current_token.is_identifier("as") {
                self.advance()?;
                let name = self.identifier()?;
                self.advance()?;
                name
            } else {
                expr.member_name()
                    .map(str::to_string)
                    .ok_or_else(|| ParseError::new(ErrorKind::MissingAsClause, position))?
            };
            if !seen.insert(name.to_lowercase()) {
                return Err(ParseError::new(ErrorKind::DuplicateIdentifier(name), position));
            }
            properties.push((name, expr.ty.clone()));
            bindings.push(expr);
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrCommaExpected)?;
        let record = self.records.get_or_create(Signature::new(properties));
        Ok(Expr::new(
            ExprKind::New {
                record: record.clone(),
                bindings,
            },
            Type::Record(record),
        ))
    }

    fn parse_lambda_invocation(&mut self, lambda: Lambda) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        self.advance()?;
        let args = self.parse_argument_list()?;
        let signature: Vec<ParamDef> = lambda
            .parameters
            .iter()
            .map(|p| ParamDef::from(p.ty.clone()))
            .collect();
        match self.resolver().find_best(&[signature], &args) {
            Resolution::Match { args, .. } => {
                let ty = lambda.return_type().clone();
                Ok(Expr::new(
                    ExprKind::Invoke {
                        lambda: Box::new(lambda),
                        args,
                    },
                    ty,
                ))
            }
            _ => Err(ParseError::new(ErrorKind::ArgsIncompatibleWithLambda, position)),
        }
    }

    /// `Type.Member`, `Type(args)`, `Type?(arg)`
    fn parse_type_access(&mut self, ty: Type) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        self.advance()?;
        let mut ty = ty;
        if self.check(TokenKind::Question) {
            if !ty.is_value_type() || ty.is_nullable() {
                return Err(ParseError::new(
                    ErrorKind::TypeHasNoNullableForm(ty.to_string()),
                    position,
                ));
            }
            ty = ty.nullable();
            self.advance()?;
        }
        if self.check(TokenKind::OpenParen) {
            let args = self.parse_argument_list()?;
            let constructors = self.registry.constructors(&ty);
            return match self.resolver().find_best(&constructors, &args) {
                Resolution::NoMatch => match <[Expr; 1]>::try_from(args) {
                    Ok([arg]) => self.conversion(arg, ty, position),
                    Err(_) => Err(ParseError::new(
                        ErrorKind::NoMatchingConstructor(ty.to_string()),
                        position,
                    )),
                },
                Resolution::Match { candidate, args } => Ok(Expr::new(
                    ExprKind::Call {
                        instance: None,
                        method: candidate,
                        args,
                    },
                    ty,
                )),
                Resolution::Ambiguous(_) => Err(ParseError::new(
                    ErrorKind::AmbiguousConstructorInvocation(ty.to_string()),
                    position,
                )),
            };
        }
        self.expect(TokenKind::Dot, ErrorKind::DotOrOpenParenExpected)?;
        self.parse_member_access(ty, None)
    }

    /// Explicit conversion `Type(expr)`. Numeric narrowing is checked.
    fn conversion(&self, expr: Expr, ty: Type, position: usize) -> Result<Expr, ParseError> {
        let source = expr.ty.clone();
        if source == ty {
            return Ok(expr);
        }
        if source.is_value_type() && ty.is_value_type() {
            if (source.is_nullable() || ty.is_nullable()) && source.non_nullable() == ty.non_nullable() {
                return Ok(expr.convert(ty));
            }
            let numeric = |t: &Type| t.is_numeric() || t.is_enum();
            if numeric(&source) && numeric(&ty) {
                return Ok(expr.convert_checked(ty));
            }
        }
        if self.registry.is_assignable(&source, &ty)
            || self.registry.is_assignable(&ty, &source)
            || self.registry.is_interface(&source)
            || self.registry.is_interface(&ty)
        {
            return Ok(expr.convert(ty));
        }
        Err(ParseError::new(
            ErrorKind::CannotConvertValue(source.to_string(), ty.to_string()),
            position,
        ))
    }

    /// `.Name` or `.Name(args)` on `instance`, or on the type itself when
    /// `instance` is `None`.
    fn parse_member_access(&mut self, ty: Type, instance: Option<Expr>) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        let name = self.identifier()?;
        self.advance()?;

        if self.check(TokenKind::OpenParen) {
            let element = match &instance {
                Some(_) if ty != Type::String => self.registry.enumerable_element(&ty),
                _ => None,
            };
            if let (Some(element), Some(source)) = (element, &instance) {
                return self.parse_aggregate(source.clone(), element, &name, position);
            }
            let args = self.parse_argument_list()?;
            return match self.find_method(&ty, &name, instance.is_none(), &args) {
                Resolution::NoMatch => Err(ParseError::new(
                    ErrorKind::NoApplicableMethod(name, ty.to_string()),
                    position,
                )),
                Resolution::Match { candidate, args } => {
                    self.method_call(candidate, instance, args, &name, position)
                }
                Resolution::Ambiguous(_) => Err(ParseError::new(
                    ErrorKind::AmbiguousMethodInvocation(name, ty.to_string()),
                    position,
                )),
            };
        }

        if instance.is_none() {
            if let Some(def) = ty.as_enum().filter(|_| !ty.is_nullable()) {
                let value = def.member(&name).ok_or_else(|| {
                    ParseError::new(
                        ErrorKind::UnknownEnumMember(name.clone(), def.name.clone()),
                        position,
                    )
                })?;
                return Ok(Expr::constant(Value::Enum(def.clone(), value), ty.clone()));
            }
        }

        let property = self
            .registry
            .find_property(&ty, &name, instance.is_none())
            .ok_or_else(|| {
                ParseError::new(
                    ErrorKind::UnknownPropertyOrField(name.clone(), ty.to_string()),
                    position,
                )
            })?;
        let property_ty = property.ty.clone();
        Ok(Expr::new(
            ExprKind::Member {
                instance: instance.map(Box::new),
                declaring: ty,
                property,
            },
            property_ty,
        ))
    }

    fn method_call(
        &self,
        method: Arc<MethodDef>,
        instance: Option<Expr>,
        args: Vec<Expr>,
        name: &str,
        position: usize,
    ) -> Result<Expr, ParseError> {
        if !self.registry.is_predefined(&method.declaring) {
            return Err(ParseError::new(
                ErrorKind::MethodsAreInaccessible(method.declaring.to_string()),
                position,
            ));
        }
        let Some(returns) = method.returns.clone() else {
            return Err(ParseError::new(
                ErrorKind::MethodIsVoid(name.to_string(), method.declaring.to_string()),
                position,
            ));
        };
        Ok(Expr::new(
            ExprKind::Call {
                instance: instance.map(Box::new),
                method,
                args,
            },
            returns,
        ))
    }

    /// Method overloads of the nearest type along the lookup chain that has
    /// any applicable one.
    fn find_method(
        &self,
        ty: &Type,
        name: &str,
        static_access: bool,
        args: &[Expr],
    ) -> Resolution<Arc<MethodDef>> {
        for t in self.registry.self_and_base_types(ty) {
            let methods = self.registry.declared_methods(&t, name, static_access);
            let resolution = self.resolver().find_best(&methods, args);
            if resolution.count() != 0 {
                return resolution;
            }
        }
        Resolution::NoMatch
    }

    fn find_indexer(&self, ty: &Type, args: &[Expr]) -> Resolution<Arc<MethodDef>> {
        for t in self.registry.self_and_base_types(ty) {
            let indexers = self.registry.declared_indexers(&t);
            if indexers.is_empty() {
                continue;
            }
            let resolution = self.resolver().find_best(&indexers, args);
            if resolution.count() != 0 {
                return resolution;
            }
        }
        Resolution::NoMatch
    }

    /// `source.Method(args)` over a sequence. The arguments are parsed with
    /// a fresh `it` bound to the element type; the outer `it` is restored
    /// afterwards.
    fn parse_aggregate(
        &mut self,
        source: Expr,
        element: Type,
        name: &str,
        position: usize,
    ) -> Result<Expr, ParseError> {
        let inner = Parameter::it(element.clone());
        let outer = self.it.replace(inner.clone());
        let args = self.parse_argument_list();
        self.it = outer;
        let args = args?;

        let candidates = signatures::aggregate_signatures(name);
        let Resolution::Match {
            candidate,
            args: mut promoted,
        } = self.resolver().find_best(&candidates, &args)
        else {
            return Err(ParseError::new(
                ErrorKind::NoApplicableAggregate(name.to_string()),
                position,
            ));
        };
        let selector = promoted
            .pop()
            .map(|body| Box::new(Lambda::new(vec![inner], body)));
        let ty = signatures::aggregate_result_type(
            candidate.method,
            &element,
            selector.as_ref().map(|lambda| lambda.return_type()),
        );
        Ok(Expr::new(
            ExprKind::Aggregate {
                source: Box::new(source),
                method: candidate.method,
                selector,
            },
            ty,
        ))
    }

    /// `expr[args]`: a one-dimensional array takes one `Int32` index, other
    /// types go through their indexers.
    fn parse_element_access(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        let position = self.current_token.position;
        self.expect(TokenKind::OpenBracket, ErrorKind::OpenBracketExpected)?;
        let args = self.parse_arguments()?;
        self.expect(TokenKind::CloseBracket, ErrorKind::CloseBracketOrCommaExpected)?;

        if let Type::Array(element) = &expr.ty {
            let element = (**element).clone();
            let Ok([index]) = <[Expr; 1]>::try_from(args) else {
                return Err(ParseError::new(ErrorKind::InvalidIndex, position));
            };
            let index = self
                .promoter
                .promote(&index, &Type::Int32, true)
                .ok_or_else(|| ParseError::new(ErrorKind::InvalidIndex, position))?;
            return Ok(Expr::new(
                ExprKind::Index {
                    array: Box::new(expr),
                    index: Box::new(index),
                },
                element,
            ));
        }

        match self.find_indexer(&expr.ty, &args) {
            Resolution::NoMatch => Err(ParseError::new(
                ErrorKind::NoApplicableIndexer(expr.ty.to_string()),
                position,
            )),
            Resolution::Match { candidate, args } => {
                let ty = candidate.result_type().cloned().unwrap_or(Type::Object);
                Ok(Expr::new(
                    ExprKind::Call {
                        instance: Some(Box::new(expr)),
                        method: candidate,
                        args,
                    },
                    ty,
                ))
            }
            Resolution::Ambiguous(_) => Err(ParseError::new(
                ErrorKind::AmbiguousIndexerInvocation(expr.ty.to_string()),
                position,
            )),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let args = if self.check(TokenKind::CloseParen) {
            Vec::new()
        } else {
            self.parse_arguments()?
        };
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrCommaExpected)?;
        Ok(args)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse_expression()?);
            if !self.check(TokenKind::Comma) {
                return Ok(args);
            }
            self.advance()?;
        }
    }
}
