//! Overload resolution.
//!
//! One algorithm serves operators, methods, constructors, indexers, aggregate
//! calls and lambda invocations:
//!
//! 1. A candidate is applicable when it has one parameter per argument, none
//!    of them output-only, and every argument promotes to its parameter type.
//! 2. If several are applicable, the one that is better than every other
//!    wins. "Better" compares the conversion from each argument's own type to
//!    the two parameter types: identical beats convertible, a type that
//!    converts to the other beats the other, and signed beats unsigned.
//! 3. No applicable candidate is a miss; several applicable candidates
//!    without a single best one are ambiguous.

use std::sync::Arc;

use crate::ast::Expr;
use crate::promote::Promoter;
use crate::types::{MethodDef, ParamDef, Type};

/// Anything with a parameter list that can take part in overload resolution.
pub trait Overload {
    fn parameters(&self) -> &[ParamDef];
}

impl Overload for Arc<MethodDef> {
    fn parameters(&self) -> &[ParamDef] {
        &self.params
    }
}

impl Overload for Vec<ParamDef> {
    fn parameters(&self) -> &[ParamDef] {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    NoMatch,
    /// The unique best candidate with the arguments promoted to its
    /// parameter types
    Match { candidate: T, args: Vec<Expr> },
    /// Number of applicable candidates none of which is best
    Ambiguous(usize),
}

impl<T> Resolution<T> {
    /// Number of candidates the resolution ended with.
    pub fn count(&self) -> usize {
        match self {
            Resolution::NoMatch => 0,
            Resolution::Match { .. } => 1,
            Resolution::Ambiguous(n) => *n,
        }
    }
}

pub struct OverloadResolver<'a, 'r> {
    promoter: &'a Promoter<'r>,
}

impl<'a, 'r> OverloadResolver<'a, 'r> {
    pub fn new(promoter: &'a Promoter<'r>) -> Self {
        OverloadResolver { promoter }
    }

    pub fn find_best<T: Overload + Clone>(&self, candidates: &[T], args: &[Expr]) -> Resolution<T> {
        let applicable: Vec<(&T, Vec<Expr>)> = candidates
            .iter()
            .filter_map(|c| self.applicable_args(c.parameters(), args).map(|promoted| (c, promoted)))
            .collect();

        let resolution = match applicable.len() {
            0 => Resolution::NoMatch,
            1 => {
                let (candidate, promoted) = &applicable[0];
                Resolution::Match {
                    candidate: (*candidate).clone(),
                    args: promoted.clone(),
                }
            }
            n => {
                let mut best = applicable.iter().enumerate().filter(|(i, (m, _))| {
                    applicable.iter().enumerate().all(|(j, (other, _))| {
                        *i == j || self.is_better_than(args, m.parameters(), other.parameters())
                    })
                });
                match (best.next(), best.next()) {
                    (Some((_, (candidate, promoted))), None) => Resolution::Match {
                        candidate: (*candidate).clone(),
                        args: promoted.clone(),
                    },
                    _ => Resolution::Ambiguous(n),
                }
            }
        };
        log::trace!(
            "overload resolution over {} candidates with {} args: {} match(es)",
            candidates.len(),
            args.len(),
            resolution.count()
        );
        resolution
    }

    fn applicable_args(&self, params: &[ParamDef], args: &[Expr]) -> Option<Vec<Expr>> {
        if params.len() != args.len() {
            return None;
        }
        params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                if param.is_out {
                    None
                } else {
                    self.promoter.promote(arg, &param.ty, false)
                }
            })
            .collect()
    }

    /// `m1` is better than `m2` when no argument converts worse to it and at
    /// least one converts better.
    fn is_better_than(&self, args: &[Expr], m1: &[ParamDef], m2: &[ParamDef]) -> bool {
        let mut better = false;
        for ((arg, p1), p2) in args.iter().zip(m1).zip(m2) {
            match self.compare_conversions(&arg.ty, &p1.ty, &p2.ty) {
                c if c < 0 => return false,
                c if c > 0 => better = true,
                _ => {}
            }
        }
        better
    }

    /// Positive when converting from `source` to `t1` is better than to
    /// `t2`, negative for the reverse, zero when neither is.
    pub fn compare_conversions(&self, source: &Type, t1: &Type, t2: &Type) -> i32 {
        if t1 == t2 {
            return 0;
        }
        if source == t1 {
            return 1;
        }
        if source == t2 {
            return -1;
        }
        let t1t2 = self.promoter.is_compatible_with(t1, t2);
        let t2t1 = self.promoter.is_compatible_with(t2, t1);
        if t1t2 && !t2t1 {
            return 1;
        }
        if t2t1 && !t1t2 {
            return -1;
        }
        if t1.is_signed_integral() && t2.is_unsigned_integral() {
            return 1;
        }
        if t2.is_signed_integral() && t1.is_unsigned_integral() {
            return -1;
        }
        0
    }
}
