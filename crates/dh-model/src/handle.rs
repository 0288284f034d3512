//! Handles to variable and parameter blocks registered in a context.

use crate::expr::{Expr, ParamRef, VarRef};
use dh_core::{ParamId, VarId};
use serde::{Deserialize, Serialize};

/// Row-major block shape. Time-indexed vectors are `1 x n_steps`,
/// per-volume states are `n_volumes x n_steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub fn vector(len: usize) -> Self {
        Self { rows: 1, cols: len }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn scalar() -> Self {
        Self { rows: 1, cols: 1 }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols, "index out of shape");
        row * self.cols + col
    }
}

/// Uniform bounds applied to every element of a variable block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn free() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    pub fn non_negative() -> Self {
        Self {
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }

    pub fn at_least(lower: f64) -> Self {
        Self {
            lower,
            upper: f64::INFINITY,
        }
    }

    pub fn between(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lower <= v && v <= self.upper
    }
}

/// Handle to a block of decision variables owned by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarHandle {
    pub id: VarId,
    pub shape: Shape,
}

impl VarHandle {
    /// Element `col` of a vector block.
    pub fn at(&self, col: usize) -> Expr {
        self.at2(0, col)
    }

    /// Element `(row, col)` of a matrix block.
    pub fn at2(&self, row: usize, col: usize) -> Expr {
        Expr::Var(VarRef {
            var: self.id,
            offset: self.shape.offset(row, col),
        })
    }

    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }
}

/// Handle to a block of parameter symbols owned by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamHandle {
    pub id: ParamId,
    pub shape: Shape,
}

impl ParamHandle {
    pub fn at(&self, col: usize) -> Expr {
        self.at2(0, col)
    }

    pub fn at2(&self, row: usize, col: usize) -> Expr {
        Expr::Param(ParamRef {
            param: self.id,
            offset: self.shape.offset(row, col),
        })
    }

    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_core::Id;

    #[test]
    fn matrix_offsets_are_row_major() {
        let h = VarHandle {
            id: Id::from_index(3),
            shape: Shape::matrix(2, 5),
        };
        match h.at2(1, 2) {
            Expr::Var(r) => assert_eq!(r.offset, 7),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.len(), 10);
    }

    #[test]
    fn bounds_contain() {
        assert!(Bounds::non_negative().contains(0.0));
        assert!(!Bounds::between(1.0, 2.0).contains(2.5));
        assert!(Bounds::free().contains(-1e300));
    }
}
