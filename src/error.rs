//! This module defines the error types for the library.
//!
//! Every failure a solve can run into is collected in a single enum,
//! [`EigsErrorKind`], and surfaced to callers through the [`EigsError`] wrapper.
//! No failure aborts the process and no partially populated result is ever
//! returned: a solve either yields a complete [`crate::EigenResult`] or one of
//! these errors.
//!
//! Note that [`faer::linalg::evd::EvdError`] does not implement the standard
//! [`std::error::Error`] trait, so it is carried by value and formatted with `Debug`.
use thiserror::Error;

/// Represents all possible errors that can occur during an eigenvalue solve.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct EigsError(#[from] EigsErrorKind);

impl EigsError {
    /// Returns the kind of failure, for callers that want to branch on it.
    pub fn kind(&self) -> &EigsErrorKind {
        &self.0
    }
}

/// The distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub enum EigsErrorKind {
    /// The solver-kind tag is not one of `dg`, `zg`, `zh`, `ds`.
    #[error("Solver `{0}` is not implemented.")]
    UnknownSolver(String),

    /// The solver kind is known but the selected backend has no variant for it.
    #[error("The {0} path is not implemented by the selected backend.")]
    NotImplemented(&'static str),

    /// The eigenvalue selector is not valid for the requested solver kind.
    #[error("Selector `{which}` is not valid for solver `{solver}`.")]
    InvalidSelector { which: String, solver: &'static str },

    /// `n`/`k` violate the requirements of the chosen path.
    #[error("Invalid dimensions n = {n}, k = {k}: {reason}")]
    InvalidDimensions {
        n: usize,
        k: usize,
        reason: &'static str,
    },

    /// The supplied matrix or operator does not match the problem descriptor.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A real input was given to a complex solver kind, or the reverse.
    #[error("Solver `{solver}` expects {expected} input.")]
    ScalarMismatch {
        solver: &'static str,
        expected: &'static str,
    },

    /// The dense eigendecomposition did not converge.
    #[error("The dense eigendecomposition did not converge: {0:?}")]
    DenseConvergenceFailure(faer::linalg::evd::EvdError),

    /// The iterative kernel reported a status outside the expected set.
    #[error("Error during Arnoldi iteration: ido = {ido}, info = {info}")]
    IterationDivergence { ido: i32, info: i32 },

    /// The iteration cap was reached before the requested pairs converged.
    #[error(
        "Maximal allowed iterations reached ({iterations}); {converged} of {requested} eigenpairs converged."
    )]
    MaxIterationsExceeded {
        iterations: usize,
        converged: usize,
        requested: usize,
    },

    /// The extraction step reported a nonzero info code.
    #[error("Could not extract results: info = {0}")]
    ExtractionFailure(i32),

    /// The kernel output broke a layout contract (pointer ranges, pairing order).
    #[error("Malformed kernel output: {0}")]
    MalformedKernelOutput(String),
}

impl PartialEq for EigsError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_solver_message() {
        let error = EigsError(EigsErrorKind::UnknownSolver("qq".to_string()));
        assert_eq!(error.to_string(), "Solver `qq` is not implemented.");
    }

    #[test]
    fn test_iteration_divergence_message() {
        let error = EigsError::from(EigsErrorKind::IterationDivergence { ido: 3, info: 0 });
        assert_eq!(
            error.to_string(),
            "Error during Arnoldi iteration: ido = 3, info = 0"
        );
    }

    #[test]
    fn test_max_iterations_message() {
        let error = EigsError::from(EigsErrorKind::MaxIterationsExceeded {
            iterations: 40,
            converged: 2,
            requested: 5,
        });
        assert_eq!(
            error.to_string(),
            "Maximal allowed iterations reached (40); 2 of 5 eigenpairs converged."
        );
    }

    #[test]
    fn test_dense_failure_message() {
        let error = EigsError::from(EigsErrorKind::DenseConvergenceFailure(
            faer::linalg::evd::EvdError::NoConvergence,
        ));
        assert_eq!(
            error.to_string(),
            "The dense eigendecomposition did not converge: NoConvergence"
        );
    }

    #[test]
    fn test_kind_accessor_and_eq() {
        let a = EigsError::from(EigsErrorKind::ExtractionFailure(-14));
        let b = EigsError::from(EigsErrorKind::ExtractionFailure(-14));
        assert_eq!(a, b);
        assert_eq!(a.kind(), &EigsErrorKind::ExtractionFailure(-14));
    }
}
