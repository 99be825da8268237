//! Algebraic rate expressions.
//!
//! An [`Expr`] is a small expression tree over constants, named parameters,
//! named compartments and the total population `N`. Expressions are written
//! with ordinary arithmetic operators:
//!
//! ```
//! use epiflow_core::expr::{comp, param};
//!
//! // Mass-action infection term: beta * S * I.
//! let infection = param("beta") * comp("S") * comp("I");
//!
//! // Carrier-state force of infection: beta * S * (I + epsilon * C).
//! let carrier = param("beta") * comp("S") * (comp("I") + param("epsilon") * comp("C"));
//! # let _ = (infection, carrier);
//! ```
//!
//! Names are resolved against a [`Model`](crate::Model) when it is built, so
//! evaluation never performs a name lookup.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use crate::model::{Malformed, Reference};

/// An algebraic expression over compartments, parameters and the total `N`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Const(f64),
    /// A named parameter, bound per run from a [`ParameterSet`](crate::ParameterSet).
    Param(String),
    /// The current value of a named compartment.
    Compartment(String),
    /// The total population `N`, the sum of every compartment.
    Total,
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    /// A quotient; a denominator of exactly zero evaluates to zero.
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

/// Creates a constant expression.
#[must_use]
pub fn constant(value: f64) -> Expr {
    Expr::Const(value)
}

/// Creates a parameter reference.
#[must_use]
pub fn param(name: impl Into<String>) -> Expr {
    Expr::Param(name.into())
}

/// Creates a compartment reference.
#[must_use]
pub fn comp(name: impl Into<String>) -> Expr {
    Expr::Compartment(name.into())
}

/// Creates a reference to the total population `N`.
#[must_use]
pub fn total() -> Expr {
    Expr::Total
}

impl Expr {
    /// Returns the names of all compartments referenced by this expression.
    #[must_use]
    pub fn compartments(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.visit(&mut |expr| {
            if let Expr::Compartment(name) = expr {
                names.insert(name.as_str());
            }
        });
        names
    }

    /// Returns the names of all parameters referenced by this expression.
    #[must_use]
    pub fn parameters(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.visit(&mut |expr| {
            if let Expr::Param(name) = expr {
                names.insert(name.as_str());
            }
        });
        names
    }

    /// Returns true if the expression refers to the total population.
    #[must_use]
    pub fn uses_total(&self) -> bool {
        let mut found = false;
        self.visit(&mut |expr| found |= matches!(expr, Expr::Total));
        found
    }

    /// Visits every node in depth-first, pre-order.
    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Param(_) | Expr::Compartment(_) | Expr::Total => {}
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Neg(a) => a.visit(f),
        }
    }

    /// Resolves names to indices.
    pub(crate) fn compile(
        &self,
        compartments: &HashMap<String, usize>,
        parameters: &HashMap<String, usize>,
    ) -> Result<Compiled, Malformed> {
        let binary = |a: &Expr, b: &Expr| -> Result<(Box<Compiled>, Box<Compiled>), Malformed> {
            Ok((
                Box::new(a.compile(compartments, parameters)?),
                Box::new(b.compile(compartments, parameters)?),
            ))
        };

        Ok(match self {
            Expr::Const(value) => {
                if !value.is_finite() {
                    return Err(Malformed::NonFiniteConstant(*value));
                }
                Compiled::Const(*value)
            }
            Expr::Param(name) => match parameters.get(name) {
                Some(&index) => Compiled::Param(index),
                None => {
                    return Err(Malformed::UnknownReference(Reference::Parameter(
                        name.clone(),
                    )));
                }
            },
            Expr::Compartment(name) => match compartments.get(name) {
                Some(&index) => Compiled::Compartment(index),
                None => {
                    return Err(Malformed::UnknownReference(Reference::Compartment(
                        name.clone(),
                    )));
                }
            },
            Expr::Total => Compiled::Total,
            Expr::Add(a, b) => {
                let (a, b) = binary(a, b)?;
                Compiled::Add(a, b)
            }
            Expr::Sub(a, b) => {
                let (a, b) = binary(a, b)?;
                Compiled::Sub(a, b)
            }
            Expr::Mul(a, b) => {
                let (a, b) = binary(a, b)?;
                Compiled::Mul(a, b)
            }
            Expr::Div(a, b) => {
                let (a, b) = binary(a, b)?;
                Compiled::Div(a, b)
            }
            Expr::Neg(a) => Compiled::Neg(Box::new(a.compile(compartments, parameters)?)),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Param(name) | Expr::Compartment(name) => write!(f, "{name}"),
            Expr::Total => write!(f, "N"),
            Expr::Add(a, b) => binary(f, a, " + ", b, SUM, SUM),
            Expr::Sub(a, b) => binary(f, a, " - ", b, SUM, PRODUCT),
            Expr::Mul(a, b) => binary(f, a, "*", b, PRODUCT, PRODUCT),
            Expr::Div(a, b) => binary(f, a, "/", b, PRODUCT, UNARY),
            Expr::Neg(a) => {
                f.write_str("-")?;
                operand(f, a, UNARY)
            }
        }
    }
}

const SUM: u8 = 1;
pub(crate) const PRODUCT: u8 = 2;
const UNARY: u8 = 3;
const ATOM: u8 = 4;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(..) | Expr::Sub(..) => SUM,
        Expr::Mul(..) | Expr::Div(..) => PRODUCT,
        Expr::Neg(_) => UNARY,
        Expr::Const(value) if value.is_sign_negative() => SUM,
        _ => ATOM,
    }
}

/// Writes `expr`, parenthesised if it binds looser than `min`.
pub(crate) fn operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn binary(
    f: &mut fmt::Formatter<'_>,
    lhs: &Expr,
    op: &str,
    rhs: &Expr,
    lhs_min: u8,
    rhs_min: u8,
) -> fmt::Result {
    operand(f, lhs, lhs_min)?;
    f.write_str(op)?;
    operand(f, rhs, rhs_min)
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl $trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs))
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                Expr::$variant(Box::new(self), Box::new(Expr::Const(rhs)))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(Expr::Const(self)), Box::new(rhs))
            }
        }
    };
}

binary_op!(Add, add, Add);
binary_op!(Sub, sub, Sub);
binary_op!(Mul, mul, Mul);
binary_op!(Div, div, Div);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

/// An expression with names resolved to compartment and parameter indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Compiled {
    Const(f64),
    Param(usize),
    Compartment(usize),
    Total,
    Add(Box<Compiled>, Box<Compiled>),
    Sub(Box<Compiled>, Box<Compiled>),
    Mul(Box<Compiled>, Box<Compiled>),
    Div(Box<Compiled>, Box<Compiled>),
    Neg(Box<Compiled>),
}

impl Compiled {
    /// Evaluates the expression for a state `y`, bound parameters and total `N`.
    pub(crate) fn eval(&self, y: &[f64], params: &[f64], total: f64) -> f64 {
        match self {
            Compiled::Const(value) => *value,
            Compiled::Param(index) => params[*index],
            Compiled::Compartment(index) => y[*index],
            Compiled::Total => total,
            Compiled::Add(a, b) => a.eval(y, params, total) + b.eval(y, params, total),
            Compiled::Sub(a, b) => a.eval(y, params, total) - b.eval(y, params, total),
            Compiled::Mul(a, b) => a.eval(y, params, total) * b.eval(y, params, total),
            Compiled::Div(a, b) => {
                let denominator = b.eval(y, params, total);
                if denominator == 0.0 {
                    0.0
                } else {
                    a.eval(y, params, total) / denominator
                }
            }
            Compiled::Neg(a) => -a.eval(y, params, total),
        }
    }
}
