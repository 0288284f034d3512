//! Symbolic algebraic expressions over model variables and parameters.
//!
//! Expressions are plain trees. Components build them with the usual
//! arithmetic operators and hand them to the [`ModelContext`](crate::ModelContext)
//! as constraint bodies or named expressions; they are only ever evaluated
//! numerically (against a solution or bounds), never solved here.

use crate::interval::Interval;
use dh_core::{ParamId, VarId};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Reference to one scalar element of a declared variable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarRef {
    pub var: VarId,
    pub offset: usize,
}

/// Reference to one scalar element of a declared parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamRef {
    pub param: ParamId,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(VarRef),
    Param(ParamRef),
    Sum(Vec<Expr>),
    Product(Box<Expr>, Box<Expr>),
    Quotient(Box<Expr>, Box<Expr>),
    Powf(Box<Expr>, f64),
    Ln(Box<Expr>),
    Neg(Box<Expr>),
}

/// Numeric values for the leaves of an expression.
pub trait Env {
    fn var(&self, r: VarRef) -> f64;
    fn param(&self, r: ParamRef) -> f64;
}

/// Interval ranges for the leaves of an expression.
pub trait IntervalEnv {
    fn var(&self, r: VarRef) -> Interval;
    fn param(&self, r: ParamRef) -> Interval;
}

impl Expr {
    pub fn constant(v: f64) -> Self {
        Expr::Const(v)
    }

    /// Sum of an arbitrary number of terms; an empty sum is `0`.
    pub fn sum<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Expr::Sum(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(0.0),
            1 => flat.pop().unwrap_or(Expr::Const(0.0)),
            _ => Expr::Sum(flat),
        }
    }

    pub fn ln(self) -> Self {
        Expr::Ln(Box::new(self))
    }

    pub fn powf(self, exponent: f64) -> Self {
        Expr::Powf(Box::new(self), exponent)
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    /// Evaluate against concrete leaf values. Domain errors yield NaN.
    pub fn eval(&self, env: &dyn Env) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Var(r) => env.var(*r),
            Expr::Param(r) => env.param(*r),
            Expr::Sum(terms) => terms.iter().map(|t| t.eval(env)).sum(),
            Expr::Product(a, b) => a.eval(env) * b.eval(env),
            Expr::Quotient(a, b) => a.eval(env) / b.eval(env),
            Expr::Powf(a, p) => a.eval(env).powf(*p),
            Expr::Ln(a) => a.eval(env).ln(),
            Expr::Neg(a) => -a.eval(env),
        }
    }

    /// Enclosure of the expression's range over the leaf intervals.
    pub fn interval(&self, env: &dyn IntervalEnv) -> Interval {
        match self {
            Expr::Const(v) => Interval::point(*v),
            Expr::Var(r) => env.var(*r),
            Expr::Param(r) => env.param(*r),
            Expr::Sum(terms) => terms
                .iter()
                .fold(Interval::point(0.0), |acc, t| acc.add(t.interval(env))),
            Expr::Product(a, b) => a.interval(env).mul(b.interval(env)),
            Expr::Quotient(a, b) => a.interval(env).div(b.interval(env)),
            Expr::Powf(a, p) => a.interval(env).powf(*p),
            Expr::Ln(a) => a.interval(env).ln(),
            Expr::Neg(a) => a.interval(env).neg(),
        }
    }

    /// Polynomial degree in the variables, `None` when not polynomial.
    pub fn degree(&self) -> Option<u32> {
        match self {
            Expr::Const(_) | Expr::Param(_) => Some(0),
            Expr::Var(_) => Some(1),
            Expr::Sum(terms) => terms
                .iter()
                .try_fold(0, |acc, t| t.degree().map(|d| acc.max(d))),
            Expr::Product(a, b) => Some(a.degree()? + b.degree()?),
            Expr::Quotient(a, b) => match b.degree()? {
                0 => a.degree(),
                _ => None,
            },
            Expr::Powf(a, p) => {
                let d = a.degree()?;
                if d == 0 {
                    Some(0)
                } else if *p >= 0.0 && p.fract() == 0.0 {
                    Some(d * (*p as u32))
                } else {
                    None
                }
            }
            Expr::Ln(a) => match a.degree()? {
                0 => Some(0),
                _ => None,
            },
            Expr::Neg(a) => a.degree(),
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.degree(), Some(d) if d <= 1)
    }

    /// Collect every variable reference in the tree.
    pub fn collect_vars(&self, out: &mut Vec<VarRef>) {
        self.walk(&mut |e| {
            if let Expr::Var(r) = e {
                out.push(*r);
            }
        });
    }

    /// Collect every parameter reference in the tree.
    pub fn collect_params(&self, out: &mut Vec<ParamRef>) {
        self.walk(&mut |e| {
            if let Expr::Param(r) = e {
                out.push(*r);
            }
        });
    }

    fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Param(_) => {}
            Expr::Sum(terms) => terms.iter().for_each(|t| t.walk(f)),
            Expr::Product(a, b) | Expr::Quotient(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            Expr::Powf(a, _) | Expr::Ln(a) | Expr::Neg(a) => a.walk(f),
        }
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<VarRef> for Expr {
    fn from(r: VarRef) -> Self {
        Expr::Var(r)
    }
}

impl From<ParamRef> for Expr {
    fn from(r: ParamRef) -> Self {
        Expr::Param(r)
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a + b),
            (Expr::Const(z), e) | (e, Expr::Const(z)) if z == 0.0 => e,
            (a, b) => Expr::sum([a, b]),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b),
            (Expr::Const(one), e) | (e, Expr::Const(one)) if one == 1.0 => e,
            (a, b) => Expr::Product(Box::new(a), Box::new(b)),
        }
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a / b),
            (e, Expr::Const(one)) if one == 1.0 => e,
            (a, b) => Expr::Quotient(Box::new(a), Box::new(b)),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Const(v) => Expr::Const(-v),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }
}

// Mixed scalar/expression operators.
macro_rules! scalar_ops {
    ($($trait:ident :: $method:ident),*) => {
        $(
            impl $trait<f64> for Expr {
                type Output = Expr;
                fn $method(self, rhs: f64) -> Expr {
                    $trait::$method(self, Expr::Const(rhs))
                }
            }

            impl $trait<Expr> for f64 {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    $trait::$method(Expr::Const(self), rhs)
                }
            }
        )*
    };
}

scalar_ops!(Add::add, Sub::sub, Mul::mul, Div::div);

#[cfg(test)]
mod tests {
    use super::*;
    use dh_core::Id;

    struct Fixed;

    impl Env for Fixed {
        fn var(&self, r: VarRef) -> f64 {
            (r.offset + 1) as f64
        }
        fn param(&self, _r: ParamRef) -> f64 {
            10.0
        }
    }

    fn x(offset: usize) -> Expr {
        Expr::Var(VarRef {
            var: Id::from_index(0),
            offset,
        })
    }

    fn p() -> Expr {
        Expr::Param(ParamRef {
            param: Id::from_index(0),
            offset: 0,
        })
    }

    #[test]
    fn evaluates_nested_tree() {
        // (x0 + 2*x1) / p - ln(x2)
        let e = (x(0) + 2.0 * x(1)) / p() - x(2).ln();
        let expected = (1.0 + 4.0) / 10.0 - 3.0_f64.ln();
        assert!((e.eval(&Fixed) - expected).abs() < 1e-12);
    }

    #[test]
    fn constants_fold() {
        assert_eq!(Expr::Const(2.0) * 3.0, Expr::Const(6.0));
        assert_eq!(x(0) * 1.0, x(0));
        assert_eq!(x(0) + 0.0, x(0));
        assert_eq!(-(-x(0)), x(0));
    }

    #[test]
    fn sums_flatten() {
        let e = x(0) + x(1) + x(2);
        match e {
            Expr::Sum(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected flat sum, got {other:?}"),
        }
    }

    #[test]
    fn degree_classification() {
        assert_eq!((x(0) + 3.0 * p()).degree(), Some(1));
        assert_eq!((x(0) * x(1)).degree(), Some(2));
        assert_eq!((x(0) / p()).degree(), Some(1));
        assert_eq!((x(0) / x(1)).degree(), None);
        assert_eq!(x(0).ln().degree(), None);
        assert_eq!(x(0).powf(-0.7).degree(), None);
        assert!((x(0) - p().ln()).is_linear());
    }

    #[test]
    fn ln_of_negative_is_nan() {
        let e = (-1.0 * x(0)).ln();
        assert!(e.eval(&Fixed).is_nan());
    }

    #[test]
    fn collects_leaves() {
        let e = x(0) * p() + x(3);
        let mut vars = Vec::new();
        e.collect_vars(&mut vars);
        assert_eq!(vars.len(), 2);
        let mut params = Vec::new();
        e.collect_params(&mut params);
        assert_eq!(params.len(), 1);
    }
}
