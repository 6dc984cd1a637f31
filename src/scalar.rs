//! Scalar types supported by the solvers.
//!
//! All paths work in double precision: real operators use `f64` and complex
//! operators use [`faer::c64`]. The [`Scalar`] trait collects the handful of
//! operations the Krylov kernels and the reconstructor need on top of plain
//! arithmetic, and routes the small dense eigenproblems to the matching
//! concrete `faer` decomposition.

use faer::{MatRef, Side, c64, linalg::evd::EvdError, prelude::*, traits::ComplexField};
use rand::{Rng, rngs::StdRng};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for faer::c64 {}
}

/// A double precision real or complex scalar.
///
/// Whether a scalar is real is read from faer's `ComplexField::IS_REAL`.
pub trait Scalar:
    sealed::Sealed
    + ComplexField<Real = f64>
    + Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
{
    /// Human-readable name used in diagnostics.
    const NAME: &'static str;

    fn zero() -> Self;
    fn from_real(x: f64) -> Self;
    /// Converts from `c64`. The real scalar keeps only the real part.
    fn from_c64(z: c64) -> Self;
    fn to_c64(self) -> c64;
    fn real_value(self) -> f64;
    /// Uniform sample from `[-1, 1)` (per component for complex scalars).
    fn sample(rng: &mut StdRng) -> Self;

    /// Full eigendecomposition of a general square matrix.
    ///
    /// Eigenvalues are returned in the order `faer` produces them, eigenvectors
    /// as the columns of the second element.
    fn general_eigen(a: MatRef<'_, Self>) -> Result<(Vec<c64>, Mat<c64>), EvdError>;

    /// Full eigendecomposition of a self-adjoint matrix, read from its lower triangle.
    fn hermitian_eigen(a: MatRef<'_, Self>) -> Result<(Vec<f64>, Mat<Self>), EvdError>;
}

impl Scalar for f64 {
    const NAME: &'static str = "real";

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn from_real(x: f64) -> Self {
        x
    }

    #[inline]
    fn from_c64(z: c64) -> Self {
        z.re
    }

    #[inline]
    fn to_c64(self) -> c64 {
        c64::new(self, 0.0)
    }

    #[inline]
    fn real_value(self) -> f64 {
        self
    }

    fn sample(rng: &mut StdRng) -> Self {
        rng.random_range(-1.0..1.0)
    }

    fn general_eigen(a: MatRef<'_, Self>) -> Result<(Vec<c64>, Mat<c64>), EvdError> {
        let evd = a.eigen()?;
        let s = evd.S();
        let values = (0..a.nrows()).map(|i| s[i]).collect();
        Ok((values, evd.U().to_owned()))
    }

    fn hermitian_eigen(a: MatRef<'_, Self>) -> Result<(Vec<f64>, Mat<Self>), EvdError> {
        let evd = a.self_adjoint_eigen(Side::Lower)?;
        let s = evd.S();
        let values = (0..a.nrows()).map(|i| s[i].real_value()).collect();
        Ok((values, evd.U().to_owned()))
    }
}

impl Scalar for c64 {
    const NAME: &'static str = "complex";

    #[inline]
    fn zero() -> Self {
        c64::new(0.0, 0.0)
    }

    #[inline]
    fn from_real(x: f64) -> Self {
        c64::new(x, 0.0)
    }

    #[inline]
    fn from_c64(z: c64) -> Self {
        z
    }

    #[inline]
    fn to_c64(self) -> c64 {
        self
    }

    #[inline]
    fn real_value(self) -> f64 {
        self.re
    }

    fn sample(rng: &mut StdRng) -> Self {
        c64::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
    }

    fn general_eigen(a: MatRef<'_, Self>) -> Result<(Vec<c64>, Mat<c64>), EvdError> {
        let evd = a.eigen()?;
        let s = evd.S();
        let values = (0..a.nrows()).map(|i| s[i]).collect();
        Ok((values, evd.U().to_owned()))
    }

    fn hermitian_eigen(a: MatRef<'_, Self>) -> Result<(Vec<f64>, Mat<Self>), EvdError> {
        let evd = a.self_adjoint_eigen(Side::Lower)?;
        let s = evd.S();
        let values = (0..a.nrows()).map(|i| s[i].real_value()).collect();
        Ok((values, evd.U().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_realness_follows_the_scalar() {
        assert!(<f64 as ComplexField>::IS_REAL);
        assert!(!<c64 as ComplexField>::IS_REAL);
        assert_eq!(f64::NAME, "real");
        assert_eq!(c64::NAME, "complex");
    }

    #[test]
    fn test_real_from_c64_drops_imaginary_part() {
        assert_eq!(f64::from_c64(c64::new(2.5, -1.0)), 2.5);
        assert_eq!(2.5_f64.to_c64(), c64::new(2.5, 0.0));
    }

    #[test]
    fn test_sampling_is_reproducible_and_bounded() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let x = c64::sample(&mut a);
            assert_eq!(x, c64::sample(&mut b));
            assert!(x.re >= -1.0 && x.re < 1.0 && x.im >= -1.0 && x.im < 1.0);
        }
    }

    #[test]
    fn test_general_eigen_of_rotation_is_conjugate_pair() {
        let a = faer::mat![[0.0, -1.0], [1.0, 0.0_f64]];
        let (values, vectors) = f64::general_eigen(a.as_ref()).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(vectors.ncols(), 2);
        for v in &values {
            assert!((v.re).abs() < 1e-12);
            assert!((v.im.abs() - 1.0).abs() < 1e-12);
        }
        assert!((values[0].im + values[1].im).abs() < 1e-12);
    }
}
