//! This module defines the Operator Callback abstraction.
//!
//! The reverse-communication driver never looks at matrix entries. Each time the
//! iterative kernel suspends, the driver hands the caller an input vector and an
//! output buffer, both sub-ranges of the kernel's scratch space, and expects the
//! image of the input under the linear operator to be written into the output.
//!
//! [`Operator`] formalizes that contract. `&mut self` plays the role of the
//! caller-owned context: an operator may keep counters or scratch memory of its
//! own, but it must not touch anything other than `output` and itself.
//!
//! Implementations are provided for dense `faer` matrices, for closures through
//! [`FnOperator`], and for any matrix-free [`faer::matrix_free::LinOp`] (sparse
//! matrices in particular) through [`LinOpOperator`].

use crate::scalar::Scalar;
use faer::{
    Accum, Mat, MatMut, MatRef, Par,
    dyn_stack::{MemBuffer, MemStack},
    linalg::matmul::matmul,
    matrix_free::LinOp,
};

/// A square linear operator applied to one vector at a time.
///
/// # Example
///
/// ```
/// use arnoldi_eigs::operator::{FnOperator, Operator};
///
/// // y = 2 x
/// let mut op = FnOperator::new(3, |x: &[f64], y: &mut [f64]| {
///     for (yi, xi) in y.iter_mut().zip(x) {
///         *yi = 2.0 * xi;
///     }
/// });
/// let mut y = [0.0; 3];
/// op.apply(&[1.0, 2.0, 3.0], &mut y);
/// assert_eq!(y, [2.0, 4.0, 6.0]);
/// ```
pub trait Operator<T: Scalar> {
    /// Dimension `n` of the operator.
    fn dim(&self) -> usize;

    /// Writes `A * input` into `output`. Both slices have length [`Operator::dim`].
    fn apply(&mut self, input: &[T], output: &mut [T]);
}

impl<T: Scalar, O: Operator<T> + ?Sized> Operator<T> for &mut O {
    #[inline]
    fn dim(&self) -> usize {
        (**self).dim()
    }

    #[inline]
    fn apply(&mut self, input: &[T], output: &mut [T]) {
        (**self).apply(input, output)
    }
}

/// Dense matrix-vector product, `y = A x`.
impl<T: Scalar> Operator<T> for MatRef<'_, T> {
    #[inline]
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn apply(&mut self, input: &[T], output: &mut [T]) {
        assert_eq!(
            self.ncols(),
            input.len(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            input.len(),
        );
        let n = input.len();
        matmul(
            MatMut::from_column_major_slice_mut(output, self.nrows(), 1),
            Accum::Replace,
            *self,
            MatRef::from_column_major_slice(input, n, 1),
            T::from_real(1.0),
            Par::Seq,
        );
    }
}

/// Delegates to the [`MatRef`] implementation.
impl<T: Scalar> Operator<T> for Mat<T> {
    #[inline]
    fn dim(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn apply(&mut self, input: &[T], output: &mut [T]) {
        Operator::apply(&mut self.as_ref(), input, output)
    }
}

/// Wraps a closure `f(input, output)` of known dimension as an [`Operator`].
pub struct FnOperator<F> {
    n: usize,
    f: F,
}

impl<F> FnOperator<F> {
    pub fn new(n: usize, f: F) -> Self {
        Self { n, f }
    }
}

impl<T: Scalar, F: FnMut(&[T], &mut [T])> Operator<T> for FnOperator<F> {
    #[inline]
    fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    fn apply(&mut self, input: &[T], output: &mut [T]) {
        (self.f)(input, output)
    }
}

/// Adapts a `faer` matrix-free operator, such as a `SparseColMatRef`.
///
/// The adapter owns the scratch memory `LinOp::apply` asks for, sized once for
/// a single right-hand side and reused on every application.
pub struct LinOpOperator<'a, O: ?Sized> {
    op: &'a O,
    mem: MemBuffer,
}

impl<'a, O: ?Sized> LinOpOperator<'a, O> {
    pub fn new<T: Scalar>(op: &'a O) -> Self
    where
        O: LinOp<T>,
    {
        let mem = MemBuffer::new(op.apply_scratch(1, Par::Seq));
        Self { op, mem }
    }
}

impl<T: Scalar, O: LinOp<T> + ?Sized> Operator<T> for LinOpOperator<'_, O> {
    #[inline]
    fn dim(&self) -> usize {
        self.op.nrows()
    }

    fn apply(&mut self, input: &[T], output: &mut [T]) {
        let n = input.len();
        let rhs = MatRef::from_column_major_slice(input, n, 1);
        let out = MatMut::from_column_major_slice_mut(output, n, 1);
        let stack = MemStack::new(&mut self.mem);
        LinOp::apply(self.op, out, rhs, Par::Seq, stack);
    }
}

/// Builds the dense matrix of an operator by applying it to the unit vectors.
pub(crate) fn materialize<T: Scalar>(op: &mut dyn Operator<T>) -> Mat<T> {
    let n = op.dim();
    let mut dense = Mat::from_fn(n, n, |_, _| T::zero());
    let mut unit = vec![T::zero(); n];
    let mut column = vec![T::zero(); n];
    for j in 0..n {
        unit[j] = T::from_real(1.0);
        op.apply(&unit, &mut column);
        unit[j] = T::zero();
        for (i, &value) in column.iter().enumerate() {
            dense[(i, j)] = value;
        }
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{
        c64, mat,
        sparse::{SparseColMat, Triplet},
    };

    #[test]
    fn test_operator_for_mat() {
        let matrix: Mat<f64> = mat![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0],];
        let mut y = [0.0; 3];

        let mut op = matrix.as_ref();
        Operator::apply(&mut op, &[1.0, 2.0, 3.0], &mut y);

        assert_eq!(y, [0.0, 0.0, 4.0]);
        assert_eq!(Operator::<f64>::dim(&op), 3);
    }

    #[test]
    fn test_operator_for_complex_mat() {
        let i = c64::new(0.0, 1.0);
        let one = c64::new(1.0, 0.0);
        let zero = c64::new(0.0, 0.0);
        let mut matrix: Mat<c64> = Mat::from_fn(2, 2, |r, c| if r == c { i } else { zero });
        let mut y = [zero; 2];
        Operator::apply(&mut matrix, &[one, i], &mut y);
        assert_eq!(y, [i, c64::new(-1.0, 0.0)]);
    }

    #[test]
    #[should_panic(
        expected = "Dimension mismatch: operator columns (2) do not match vector rows (3)."
    )]
    fn test_dimension_mismatch_panic() {
        let matrix: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let mut y = [0.0; 2];
        Operator::apply(&mut matrix.as_ref(), &[1.0, 2.0, 3.0], &mut y);
    }

    #[test]
    fn test_sparse_operator_matches_dense() {
        let triplets = [(0, 0, 4.0), (1, 0, 1.0), (1, 1, 3.0), (2, 2, -2.0)]
            .map(|(row, col, val)| Triplet { row, col, val });
        let a = SparseColMat::<usize, f64>::try_new_from_triplets(3, 3, &triplets).unwrap();
        let a_ref = a.as_ref();
        let mut op = LinOpOperator::new::<f64>(&a_ref);
        let mut y = [0.0; 3];
        Operator::apply(&mut op, &[1.0, 1.0, 1.0], &mut y);
        assert_eq!(y, [4.0, 4.0, -2.0]);
    }

    #[test]
    fn test_materialize_closure_operator() {
        let mut op = FnOperator::new(3, |x: &[f64], y: &mut [f64]| {
            y[0] = x[1];
            y[1] = x[2];
            y[2] = x[0];
        });
        let dense = materialize::<f64>(&mut op);
        assert_eq!(dense, mat![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    }
}
