//! Operand signatures of the built-in operators and sequence aggregates.
//!
//! Operators are bound by running overload resolution against a fixed list of
//! operand-type tuples. Families extend one another in tiers: the equality
//! family first tries its own entries, then the relational ones, then plain
//! arithmetic. The first tier with any applicable entry decides the outcome,
//! so `Boolean == Boolean` never competes with the numeric pairs.

use std::sync::LazyLock;

use crate::ast::{AggregateMethod, Expr};
use crate::overload::{Overload, OverloadResolver, Resolution};
use crate::types::{ParamDef, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    /// `&&`, `||`
    Logical,
    /// `*`, `/`, `%`
    Arithmetic,
    /// `<`, `<=`, `>`, `>=`
    Relational,
    /// `==`, `!=`
    Equality,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// unary `-`
    Negation,
    /// `!`, `not`
    Not,
}

type Tier = Vec<Vec<ParamDef>>;

fn unary(types: &[Type]) -> Tier {
    types
        .iter()
        .flat_map(|ty| [ty.clone(), ty.clone().nullable()])
        .map(|ty| vec![ParamDef::from(ty)])
        .collect()
}

fn same_pairs(types: &[Type]) -> Tier {
    types
        .iter()
        .flat_map(|ty| [ty.clone(), ty.clone().nullable()])
        .map(|ty| vec![ParamDef::from(ty.clone()), ParamDef::from(ty)])
        .collect()
}

fn pairs(types: &[(Type, Type)]) -> Tier {
    types
        .iter()
        .flat_map(|(l, r)| {
            [
                (l.clone(), r.clone()),
                (l.clone().nullable(), r.clone().nullable()),
            ]
        })
        .map(|(l, r)| vec![ParamDef::from(l), ParamDef::from(r)])
        .collect()
}

static LOGICAL: LazyLock<Tier> = LazyLock::new(|| same_pairs(&[Type::Boolean]));

static ARITHMETIC: LazyLock<Tier> = LazyLock::new(|| {
    same_pairs(&[
        Type::Int32,
        Type::UInt32,
        Type::Int64,
        Type::UInt64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ])
});

static RELATIONAL: LazyLock<Tier> = LazyLock::new(|| {
    let mut tier = vec![vec![ParamDef::from(Type::String), ParamDef::from(Type::String)]];
    tier.extend(same_pairs(&[
        Type::Char,
        Type::DateTime,
        Type::DateTimeOffset,
        Type::TimeSpan,
    ]));
    tier
});

static EQUALITY: LazyLock<Tier> = LazyLock::new(|| same_pairs(&[Type::Boolean, Type::Guid]));

static ADD: LazyLock<Tier> = LazyLock::new(|| {
    pairs(&[
        (Type::DateTime, Type::TimeSpan),
        (Type::DateTimeOffset, Type::TimeSpan),
        (Type::TimeSpan, Type::TimeSpan),
    ])
});

static SUBTRACT: LazyLock<Tier> = LazyLock::new(|| {
    pairs(&[
        (Type::DateTime, Type::DateTime),
        (Type::DateTimeOffset, Type::DateTimeOffset),
    ])
});

static NEGATION: LazyLock<Tier> = LazyLock::new(|| {
    unary(&[
        Type::Int32,
        Type::Int64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ])
});

static NOT: LazyLock<Tier> = LazyLock::new(|| unary(&[Type::Boolean]));

impl OperatorFamily {
    /// Signature tiers, most specific first.
    fn tiers(&self) -> Vec<&'static Tier> {
        match self {
            OperatorFamily::Logical => vec![&*LOGICAL],
            OperatorFamily::Arithmetic => vec![&*ARITHMETIC],
            OperatorFamily::Relational => vec![&*RELATIONAL, &*ARITHMETIC],
            OperatorFamily::Equality => vec![&*EQUALITY, &*RELATIONAL, &*ARITHMETIC],
            OperatorFamily::Add => vec![&*ADD, &*ARITHMETIC],
            OperatorFamily::Subtract => vec![&*SUBTRACT, &*ADD, &*ARITHMETIC],
            OperatorFamily::Negation => vec![&*NEGATION],
            OperatorFamily::Not => vec![&*NOT],
        }
    }

    /// Promotes `operands` to the best signature of this family.
    ///
    /// Returns the promoted operands, or `None` when no signature applies or
    /// the best one is ambiguous.
    pub fn bind(&self, resolver: &OverloadResolver<'_, '_>, operands: &[Expr]) -> Option<Vec<Expr>> {
        for tier in self.tiers() {
            match resolver.find_best(tier, operands) {
                Resolution::NoMatch => continue,
                Resolution::Match { args, .. } => return Some(args),
                Resolution::Ambiguous(_) => return None,
            }
        }
        None
    }
}

/// One overload of a sequence aggregate. `params` lists the selector's
/// result type; an empty list is the parameterless form.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSignature {
    pub method: AggregateMethod,
    pub params: Vec<ParamDef>,
}

impl Overload for AggregateSignature {
    fn parameters(&self) -> &[ParamDef] {
        &self.params
    }
}

const SUMMABLE: [Type; 5] = [Type::Int32, Type::Int64, Type::Single, Type::Double, Type::Decimal];

static AGGREGATES: LazyLock<Vec<AggregateSignature>> = LazyLock::new(|| {
    let sig = |method, params: Vec<Type>| AggregateSignature {
        method,
        params: params.into_iter().map(ParamDef::from).collect(),
    };
    let mut signatures = vec![
        sig(AggregateMethod::Where, vec![Type::Boolean]),
        sig(AggregateMethod::Any, vec![]),
        sig(AggregateMethod::Any, vec![Type::Boolean]),
        sig(AggregateMethod::All, vec![Type::Boolean]),
        sig(AggregateMethod::Count, vec![]),
        sig(AggregateMethod::Count, vec![Type::Boolean]),
        sig(AggregateMethod::Min, vec![Type::Object]),
        sig(AggregateMethod::Max, vec![Type::Object]),
    ];
    for method in [AggregateMethod::Sum, AggregateMethod::Average] {
        for ty in SUMMABLE {
            signatures.push(sig(method, vec![ty.clone()]));
            signatures.push(sig(method, vec![ty.nullable()]));
        }
    }
    signatures
});

/// Aggregate overloads whose name matches `name`, ignoring case.
pub fn aggregate_signatures(name: &str) -> Vec<AggregateSignature> {
    match AggregateMethod::from_name(name) {
        Some(method) => AGGREGATES
            .iter()
            .filter(|sig| sig.method == method)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

/// Result type of an aggregate call over elements of `element`, given the
/// promoted selector, if any.
pub fn aggregate_result_type(method: AggregateMethod, element: &Type, selector: Option<&Type>) -> Type {
    match (method, selector) {
        (AggregateMethod::Where, _) => Type::sequence(element.clone()),
        (AggregateMethod::Any | AggregateMethod::All, _) => Type::Boolean,
        (AggregateMethod::Count, _) => Type::Int32,
        (AggregateMethod::Average, Some(ty)) => {
            let result = match ty.non_nullable() {
                Type::Int32 | Type::Int64 => Type::Double,
                other => other.clone(),
            };
            if ty.is_nullable() { result.nullable() } else { result }
        }
        (_, Some(ty)) => ty.clone(),
        (_, None) => element.clone(),
    }
}

/// Result type of an arithmetic operator once both operands share a
/// signature. Date arithmetic is the only place the two differ.
pub fn arithmetic_result_type(left: &Type, right: &Type) -> Type {
    let is_instant = |ty: &Type| matches!(ty.non_nullable(), Type::DateTime | Type::DateTimeOffset);
    if is_instant(left) && left.non_nullable() == right.non_nullable() {
        if left.is_nullable() {
            Type::TimeSpan.nullable()
        } else {
            Type::TimeSpan
        }
    } else {
        left.clone()
    }
}
