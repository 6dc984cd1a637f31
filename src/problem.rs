//! Problem description: solver kinds, eigenvalue selectors and solve options.

use crate::error::{EigsError, EigsErrorKind};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Seed of the start-vector generator when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// Which family of operators a solve targets.
///
/// Parsed from the short tags `dg`, `zg`, `zh` and `ds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverKind {
    /// Real, non-symmetric (`dg`).
    GeneralReal,
    /// Complex, non-Hermitian (`zg`).
    GeneralComplex,
    /// Complex Hermitian (`zh`).
    HermitianComplex,
    /// Real symmetric (`ds`).
    SymmetricReal,
}

impl SolverKind {
    pub fn tag(self) -> &'static str {
        match self {
            SolverKind::GeneralReal => "dg",
            SolverKind::GeneralComplex => "zg",
            SolverKind::HermitianComplex => "zh",
            SolverKind::SymmetricReal => "ds",
        }
    }

    pub fn is_real(self) -> bool {
        matches!(self, SolverKind::GeneralReal | SolverKind::SymmetricReal)
    }

    pub fn is_self_adjoint(self) -> bool {
        matches!(
            self,
            SolverKind::HermitianComplex | SolverKind::SymmetricReal
        )
    }

    /// Selectors accepted by the iterative path of this kind.
    pub fn selectors(self) -> &'static [Which] {
        use Which::*;
        match self {
            SolverKind::SymmetricReal => &[
                LargestMagnitude,
                SmallestMagnitude,
                LargestAlgebraic,
                SmallestAlgebraic,
                BothEnds,
            ],
            _ => &[
                LargestMagnitude,
                SmallestMagnitude,
                LargestReal,
                SmallestReal,
                LargestImaginary,
                SmallestImaginary,
            ],
        }
    }
}

impl FromStr for SolverKind {
    type Err = EigsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dg" => Ok(SolverKind::GeneralReal),
            "zg" => Ok(SolverKind::GeneralComplex),
            "zh" => Ok(SolverKind::HermitianComplex),
            "ds" => Ok(SolverKind::SymmetricReal),
            other => Err(EigsErrorKind::UnknownSolver(other.to_string()).into()),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Part of the spectrum the iterative path converges to.
///
/// The string forms are the two-letter codes used by ARPACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Which {
    /// `LM`
    LargestMagnitude,
    /// `SM`
    SmallestMagnitude,
    /// `LR`
    LargestReal,
    /// `SR`
    SmallestReal,
    /// `LI`
    LargestImaginary,
    /// `SI`
    SmallestImaginary,
    /// `LA`, self-adjoint only.
    LargestAlgebraic,
    /// `SA`, self-adjoint only.
    SmallestAlgebraic,
    /// `BE`: alternately from the high and the low end, self-adjoint only.
    BothEnds,
}

impl Which {
    pub fn as_str(self) -> &'static str {
        match self {
            Which::LargestMagnitude => "LM",
            Which::SmallestMagnitude => "SM",
            Which::LargestReal => "LR",
            Which::SmallestReal => "SR",
            Which::LargestImaginary => "LI",
            Which::SmallestImaginary => "SI",
            Which::LargestAlgebraic => "LA",
            Which::SmallestAlgebraic => "SA",
            Which::BothEnds => "BE",
        }
    }

    /// Parses `selector` and checks it against the selectors `kind` accepts.
    pub fn parse_for(selector: &str, kind: SolverKind) -> Result<Self, EigsError> {
        kind.selectors()
            .iter()
            .copied()
            .find(|w| w.as_str().eq_ignore_ascii_case(selector.trim()))
            .ok_or_else(|| {
                EigsErrorKind::InvalidSelector {
                    which: selector.to_string(),
                    solver: kind.tag(),
                }
                .into()
            })
    }
}

impl fmt::Display for Which {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterative kernel used for `k < n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// The built-in Krylov-Schur kernel.
    #[default]
    Native,
    /// arpack-ng through its ICB C interface.
    #[cfg(feature = "arpack")]
    Arpack,
}

/// Everything a solve needs to know besides the operator itself.
///
/// `tolerance` and `max_iterations` accept out-of-range values: a negative (or
/// NaN) tolerance means machine precision and a zero iteration cap means `10 * n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDescriptor {
    /// Dimension of the operator.
    pub n: usize,
    /// Number of requested eigenpairs, `0 < k <= n`.
    pub k: usize,
    /// Selector string, e.g. `"LM"`.
    pub which: String,
    /// Relative convergence tolerance, `0` for machine precision.
    pub tolerance: f64,
    /// Iteration cap of the iterative path, `0` for `10 * n`.
    pub max_iterations: usize,
    /// Whether eigenvectors are computed and returned.
    pub eigenvectors: bool,
    /// Seed of the start vector of the iterative path.
    pub seed: u64,
    pub backend: Backend,
}

impl ProblemDescriptor {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            k,
            which: Which::LargestMagnitude.as_str().to_string(),
            tolerance: 0.0,
            max_iterations: 0,
            eigenvectors: true,
            seed: DEFAULT_SEED,
            backend: Backend::Native,
        }
    }

    pub fn with_which(mut self, which: impl Into<String>) -> Self {
        self.which = which.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_eigenvectors(mut self, eigenvectors: bool) -> Self {
        self.eigenvectors = eigenvectors;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Whether this problem goes to the dense path.
    pub fn is_dense(&self) -> bool {
        self.k == self.n
    }

    /// Tolerance with the machine-precision default substituted.
    pub fn effective_tolerance(&self) -> f64 {
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            0.0
        } else {
            self.tolerance
        }
    }

    /// Iteration cap with the `10 * n` default substituted.
    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            10 * self.n
        } else {
            self.max_iterations
        }
    }

    /// Checks `n` and `k` against the path the descriptor selects.
    pub(crate) fn validate_dimensions(&self) -> Result<(), EigsError> {
        let invalid = |reason| EigsErrorKind::InvalidDimensions {
            n: self.n,
            k: self.k,
            reason,
        };
        if self.n == 0 {
            return Err(invalid("the operator dimension must be positive").into());
        }
        if self.k == 0 || self.k > self.n {
            return Err(invalid("k must satisfy 0 < k <= n").into());
        }
        if !self.is_dense() && self.k + 2 > self.n {
            return Err(invalid("the iterative path requires k <= n - 2").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_round_trips_through_tag() {
        for tag in ["dg", "zg", "zh", "ds"] {
            let kind: SolverKind = tag.parse().unwrap();
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn test_unknown_solver_tag() {
        let err = "xx".parse::<SolverKind>().unwrap_err();
        assert_eq!(err.kind(), &EigsErrorKind::UnknownSolver("xx".to_string()));
    }

    #[test]
    fn test_selectors_depend_on_kind() {
        assert_eq!(
            Which::parse_for("lm", SolverKind::GeneralReal).unwrap(),
            Which::LargestMagnitude
        );
        assert_eq!(
            Which::parse_for("BE", SolverKind::SymmetricReal).unwrap(),
            Which::BothEnds
        );
        let err = Which::parse_for("BE", SolverKind::GeneralComplex).unwrap_err();
        assert!(matches!(err.kind(), EigsErrorKind::InvalidSelector { .. }));
        assert!(Which::parse_for("LI", SolverKind::SymmetricReal).is_err());
    }

    #[test]
    fn test_defaults_are_substituted() {
        let p = ProblemDescriptor::new(50, 4).with_tolerance(-1.0);
        assert_eq!(p.effective_tolerance(), 0.0);
        assert_eq!(p.effective_max_iterations(), 500);

        let p = p.with_tolerance(f64::NAN).with_max_iterations(7);
        assert_eq!(p.effective_tolerance(), 0.0);
        assert_eq!(p.effective_max_iterations(), 7);
    }

    #[test]
    fn test_dimension_validation() {
        assert!(ProblemDescriptor::new(5, 5).validate_dimensions().is_ok());
        assert!(ProblemDescriptor::new(5, 3).validate_dimensions().is_ok());
        assert!(ProblemDescriptor::new(5, 4).validate_dimensions().is_err());
        assert!(ProblemDescriptor::new(5, 0).validate_dimensions().is_err());
        assert!(ProblemDescriptor::new(0, 0).validate_dimensions().is_err());
        assert!(ProblemDescriptor::new(3, 4).validate_dimensions().is_err());
    }
}
