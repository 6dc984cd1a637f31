//! The caller-visible result of a solve.
//!
//! An [`EigenResult`] is built in one piece at the end of a successful solve and
//! handed to the caller, who owns it. Memory is released when the value is
//! dropped; [`EigenResult::release`] makes that explicit at call sites that want
//! to mark the end of its lifetime.

use crate::error::{EigsError, EigsErrorKind};
use faer::{Mat, c64};
use serde::Serialize;

/// Counters reported by the iterative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SolveStats {
    /// Number of restart cycles the kernel performed.
    pub iterations: usize,
    /// Number of Operator Callback invocations.
    pub operator_applications: usize,
    /// Number of Ritz values that met the tolerance.
    pub converged: usize,
    /// Krylov subspace dimension `ncv`.
    pub subspace_dimension: usize,
}

/// `k` eigenvalues of an `n`-dimensional operator and, optionally, their eigenvectors.
///
/// Eigenvalues are kept in the order the kernel produced them. Eigenvectors
/// are an `n x k` matrix stored row-major: element `(i, j)` is coordinate `i`
/// of the eigenvector belonging to eigenvalue `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenResult {
    n: usize,
    k: usize,
    eigenvalues: Vec<c64>,
    eigenvectors: Option<Vec<c64>>,
    stats: Option<SolveStats>,
}

impl EigenResult {
    /// Assembles a result, checking the buffer lengths against `n` and `k`.
    pub(crate) fn new(
        n: usize,
        k: usize,
        eigenvalues: Vec<c64>,
        eigenvectors: Option<Vec<c64>>,
        stats: Option<SolveStats>,
    ) -> Result<Self, EigsError> {
        if eigenvalues.len() != k {
            return Err(EigsErrorKind::MalformedKernelOutput(format!(
                "expected {k} eigenvalues, got {}",
                eigenvalues.len()
            ))
            .into());
        }
        if let Some(vectors) = &eigenvectors {
            if vectors.len() != n * k {
                return Err(EigsErrorKind::MalformedKernelOutput(format!(
                    "expected {} eigenvector entries, got {}",
                    n * k,
                    vectors.len()
                ))
                .into());
            }
        }
        Ok(Self {
            n,
            k,
            eigenvalues,
            eigenvectors,
            stats,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn eigenvalues(&self) -> &[c64] {
        &self.eigenvalues
    }

    /// Row-major `n x k` eigenvector buffer, `None` if eigenvectors were not requested.
    pub fn eigenvectors(&self) -> Option<&[c64]> {
        self.eigenvectors.as_deref()
    }

    /// Entry `(row, col)` of the eigenvector matrix.
    pub fn eigenvector_entry(&self, row: usize, col: usize) -> Option<c64> {
        if row >= self.n || col >= self.k {
            return None;
        }
        self.eigenvectors
            .as_ref()
            .map(|vectors| vectors[row * self.k + col])
    }

    /// The eigenvector belonging to eigenvalue `col`.
    pub fn eigenvector(&self, col: usize) -> Option<Vec<c64>> {
        (0..self.n)
            .map(|row| self.eigenvector_entry(row, col))
            .collect()
    }

    /// Copies the eigenvectors into a `faer` matrix, one eigenvector per column.
    pub fn eigenvectors_mat(&self) -> Option<Mat<c64>> {
        let vectors = self.eigenvectors.as_ref()?;
        Some(Mat::from_fn(self.n, self.k, |i, j| vectors[i * self.k + j]))
    }

    /// Statistics of the iterative path, `None` for dense solves.
    pub fn stats(&self) -> Option<&SolveStats> {
        self.stats.as_ref()
    }

    /// Ends the lifetime of the result and frees its buffers.
    pub fn release(self) {
        drop(self);
    }
}
