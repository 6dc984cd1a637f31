//! This module provides the top-level solve entry points, the Solver Dispatcher.
//!
//! A solve is described by a solver-kind tag, an [`Input`] and a
//! [`ProblemDescriptor`]. The dispatcher validates the descriptor, then routes
//! the problem:
//!
//! - `k == n` goes to the dense path ([`crate::dense`]); an operator input is
//!   first materialized column by column.
//! - `k < n` goes to the reverse-communication driver ([`crate::rci`]) with the
//!   kernel of the selected [`Backend`]; a dense input is wrapped as an operator.
//!
//! The `which` selector is parsed only on the iterative path. The dense path
//! returns the whole spectrum, so it ignores the selector.
//!
//! Either way the kernel output is normalized by [`reconstruct`] into an
//! [`EigenResult`] that the caller owns.

#[cfg(feature = "arpack")]
use crate::algorithms::arpack::{ArpackComplex, ArpackReal};
use crate::{
    algorithms::{
        Structure,
        krylov_schur::{KrylovSchur, KrylovSchurParams},
    },
    dense,
    error::{EigsError, EigsErrorKind},
    operator::{Operator, materialize},
    problem::{Backend, ProblemDescriptor, SolverKind, Which},
    rci::{self, ReverseCommKernel, subspace_dimension},
    reconstruct::{RawEigenOutput, reconstruct},
    result::{EigenResult, SolveStats},
    scalar::Scalar,
};
use faer::{MatRef, c64};

/// Where the operator of a solve comes from.
pub enum Source<'a, T: Scalar> {
    /// A dense `n x n` matrix.
    Dense(MatRef<'a, T>),
    /// A matrix-free operator of dimension `n`.
    Operator(&'a mut dyn Operator<T>),
}

/// The operator of a solve, tagged with its scalar type.
pub enum Input<'a> {
    Real(Source<'a, f64>),
    Complex(Source<'a, c64>),
}

impl<'a> From<MatRef<'a, f64>> for Input<'a> {
    fn from(a: MatRef<'a, f64>) -> Self {
        Input::Real(Source::Dense(a))
    }
}

impl<'a> From<MatRef<'a, c64>> for Input<'a> {
    fn from(a: MatRef<'a, c64>) -> Self {
        Input::Complex(Source::Dense(a))
    }
}

/// Computes `problem.k` eigenvalues, and optionally eigenvectors, of `input`.
///
/// `solver` is one of the tags `dg` (real general), `zg` (complex general),
/// `zh` (complex Hermitian) or `ds` (real symmetric).
///
/// # Example
///
/// ```
/// use arnoldi_eigs::{ProblemDescriptor, eigs};
/// use faer::mat;
///
/// let a = mat![[2.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 5.0_f64]];
/// let result = eigs("ds", a.as_ref().into(), &ProblemDescriptor::new(3, 3))?;
/// assert_eq!(result.eigenvalues().len(), 3);
/// assert!(result.eigenvalues().iter().all(|v| v.im == 0.0));
/// # Ok::<(), arnoldi_eigs::EigsError>(())
/// ```
pub fn eigs(
    solver: &str,
    input: Input<'_>,
    problem: &ProblemDescriptor,
) -> Result<EigenResult, EigsError> {
    let kind: SolverKind = solver.parse()?;
    eigs_with_kind(kind, input, problem)
}

/// [`eigs`] with an already parsed solver kind.
pub fn eigs_with_kind(
    kind: SolverKind,
    input: Input<'_>,
    problem: &ProblemDescriptor,
) -> Result<EigenResult, EigsError> {
    problem.validate_dimensions()?;
    log_defaults(problem);

    match (input, kind.is_real()) {
        (Input::Real(source), true) => {
            solve_typed(kind, source, problem, |ncv| real_kernel(kind, ncv, problem))
        }
        (Input::Complex(source), false) => {
            solve_typed(kind, source, problem, |ncv| complex_kernel(kind, ncv, problem))
        }
        (_, real) => Err(EigsErrorKind::ScalarMismatch {
            solver: kind.tag(),
            expected: if real { f64::NAME } else { c64::NAME },
        }
        .into()),
    }
}

/// Releases a result. Equivalent to dropping it.
pub fn release(result: EigenResult) {
    result.release();
}

fn log_defaults(problem: &ProblemDescriptor) {
    if problem.effective_tolerance() != problem.tolerance {
        log::debug!(
            "tolerance {} replaced by machine precision",
            problem.tolerance
        );
    }
    if problem.max_iterations == 0 {
        log::debug!(
            "iteration cap defaulted to {}",
            problem.effective_max_iterations()
        );
    }
}

type BoxedKernel<T> = Box<dyn ReverseCommKernel<T>>;

fn native_kernel<T: Scalar>(
    kind: SolverKind,
    which: Which,
    ncv: usize,
    problem: &ProblemDescriptor,
) -> KrylovSchur<T> {
    let structure = if kind.is_self_adjoint() {
        Structure::SelfAdjoint
    } else {
        Structure::General
    };
    let params = KrylovSchurParams {
        nev: problem.k,
        ncv,
        which,
        tolerance: problem.effective_tolerance(),
        max_iterations: problem.effective_max_iterations(),
        structure,
        seed: problem.seed,
    };
    KrylovSchur::new(problem.n, params)
}

fn real_kernel(
    kind: SolverKind,
    ncv: usize,
    problem: &ProblemDescriptor,
) -> Result<BoxedKernel<f64>, EigsError> {
    let which = Which::parse_for(&problem.which, kind)?;
    match problem.backend {
        Backend::Native => Ok(Box::new(native_kernel::<f64>(kind, which, ncv, problem))),
        #[cfg(feature = "arpack")]
        Backend::Arpack => {
            if kind == SolverKind::SymmetricReal {
                return Err(EigsErrorKind::NotImplemented("symmetric real iterative").into());
            }
            Ok(Box::new(ArpackReal::new(
                problem.n,
                problem.k,
                ncv,
                which,
                problem.effective_tolerance(),
                problem.effective_max_iterations(),
            )?))
        }
    }
}

fn complex_kernel(
    kind: SolverKind,
    ncv: usize,
    problem: &ProblemDescriptor,
) -> Result<BoxedKernel<c64>, EigsError> {
    let which = Which::parse_for(&problem.which, kind)?;
    match problem.backend {
        Backend::Native => Ok(Box::new(native_kernel::<c64>(kind, which, ncv, problem))),
        #[cfg(feature = "arpack")]
        Backend::Arpack => Ok(Box::new(ArpackComplex::new(
            problem.n,
            problem.k,
            ncv,
            which,
            problem.effective_tolerance(),
            problem.effective_max_iterations(),
        )?)),
    }
}

fn check_source<T: Scalar>(source: &Source<'_, T>, n: usize) -> Result<(), EigsError> {
    let (rows, cols) = match source {
        Source::Dense(a) => (a.nrows(), a.ncols()),
        Source::Operator(op) => (op.dim(), op.dim()),
    };
    if rows != n || cols != n {
        return Err(EigsErrorKind::InvalidInput(format!(
            "the operator is {rows} x {cols}, the problem has n = {n}"
        ))
        .into());
    }
    Ok(())
}

fn solve_typed<T, F>(
    kind: SolverKind,
    source: Source<'_, T>,
    problem: &ProblemDescriptor,
    make_kernel: F,
) -> Result<EigenResult, EigsError>
where
    T: Scalar,
    F: FnOnce(usize) -> Result<BoxedKernel<T>, EigsError>,
{
    let (n, k) = (problem.n, problem.k);
    check_source(&source, n)?;

    let (raw, stats): (RawEigenOutput, Option<SolveStats>) = if problem.is_dense() {
        log::debug!("solver {kind}: k = n = {n}, dense path");
        let raw = match source {
            Source::Dense(a) => dense::solve(kind, a, problem.eigenvectors)?,
            Source::Operator(op) => {
                log::debug!("materializing an operator of dimension {n}");
                let a = materialize(op);
                dense::solve(kind, a.as_ref(), problem.eigenvectors)?
            }
        };
        (raw, None)
    } else {
        let ncv = subspace_dimension(n, k);
        log::debug!("solver {kind}: n = {n}, k = {k}, iterative path with ncv = {ncv}");
        let mut kernel = make_kernel(ncv)?;
        let (raw, stats) = match source {
            Source::Dense(a) => {
                let mut op = a;
                rci::solve(kernel.as_mut(), &mut op, k, problem.eigenvectors)?
            }
            Source::Operator(op) => rci::solve(kernel.as_mut(), op, k, problem.eigenvectors)?,
        };
        (raw, Some(stats))
    };

    let (values, vectors) = reconstruct(raw, n, k, problem.eigenvectors)?;
    EigenResult::new(n, k, values, vectors, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FnOperator;
    use faer::{Mat, mat};

    #[test]
    fn test_dense_input_on_iterative_path() {
        let n = 30;
        let a = Mat::from_fn(n, n, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
        let problem = ProblemDescriptor::new(n, 2).with_tolerance(1e-12);
        let result = eigs("dg", a.as_ref().into(), &problem).unwrap();
        assert!((result.eigenvalues()[0].re - 30.0).abs() < 1e-8);
        assert!((result.eigenvalues()[1].re - 29.0).abs() < 1e-8);
        assert!(result.stats().is_some());
    }

    #[test]
    fn test_operator_input_on_dense_path() {
        let mut op = FnOperator::new(3, |x: &[f64], y: &mut [f64]| {
            y[0] = 3.0 * x[0];
            y[1] = -x[1];
            y[2] = 0.5 * x[2];
        });
        let problem = ProblemDescriptor::new(3, 3).with_eigenvectors(false);
        let result = eigs("ds", Input::Real(Source::Operator(&mut op)), &problem).unwrap();
        let mut re: Vec<f64> = result.eigenvalues().iter().map(|v| v.re).collect();
        re.sort_by(|a, b| a.total_cmp(b));
        assert!((re[0] + 1.0).abs() < 1e-12);
        assert!((re[2] - 3.0).abs() < 1e-12);
        assert!(result.eigenvectors().is_none());
        assert!(result.stats().is_none());
    }

    #[test]
    fn test_scalar_mismatch() {
        let a = mat![[1.0, 0.0], [0.0, 1.0_f64]];
        let err = eigs("zg", a.as_ref().into(), &ProblemDescriptor::new(2, 2)).unwrap_err();
        assert_eq!(
            err.kind(),
            &EigsErrorKind::ScalarMismatch {
                solver: "zg",
                expected: "complex"
            }
        );
    }

    #[test]
    fn test_operator_dimension_is_checked() {
        let mut op = FnOperator::new(4, |x: &[f64], y: &mut [f64]| y.copy_from_slice(x));
        let problem = ProblemDescriptor::new(10, 2);
        let err = eigs("dg", Input::Real(Source::Operator(&mut op)), &problem).unwrap_err();
        assert!(matches!(err.kind(), EigsErrorKind::InvalidInput(_)));
    }

    #[test]
    fn test_validation_precedes_solving() {
        let a = mat![[1.0, 0.0], [0.0, 1.0_f64]];
        let err = eigs("dg", a.as_ref().into(), &ProblemDescriptor::new(2, 1)).unwrap_err();
        assert!(matches!(err.kind(), EigsErrorKind::InvalidDimensions { .. }));

        let eye = Mat::<f64>::identity(5, 5);
        let problem = ProblemDescriptor::new(5, 2).with_which("XX");
        let err = eigs("dg", eye.as_ref().into(), &problem).unwrap_err();
        assert!(matches!(err.kind(), EigsErrorKind::InvalidSelector { .. }));

        let err = eigs("qq", a.as_ref().into(), &ProblemDescriptor::new(2, 2)).unwrap_err();
        assert_eq!(err.kind(), &EigsErrorKind::UnknownSolver("qq".into()));
    }

    #[test]
    fn test_dense_path_ignores_selector() {
        let eye = Mat::<f64>::identity(3, 3);
        for which in ["LR", "XX"] {
            let problem = ProblemDescriptor::new(3, 3).with_which(which);
            let result = eigs("ds", eye.as_ref().into(), &problem).unwrap();
            assert_eq!(result.eigenvalues().len(), 3);
            assert!(
                result
                    .eigenvalues()
                    .iter()
                    .all(|v| (v.re - 1.0).abs() < 1e-12 && v.im == 0.0)
            );
        }
    }
}
