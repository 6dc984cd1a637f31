//! Eigenvalues and eigenvectors of real and complex square operators.
//!
//! This crate computes `k` eigenpairs of an `n`-dimensional linear operator. Two
//! paths are available and chosen automatically by the dispatcher in [`solvers`]:
//!
//! - **Dense** (`k == n`): the full matrix is decomposed with [`faer`] and every
//!   eigenpair is returned.
//! - **Iterative** (`k <= n - 2`): a restarted Arnoldi kernel is driven through
//!   the reverse-communication protocol of [`rci`]. The kernel never sees the
//!   matrix; every time it needs a product it suspends and the driver applies
//!   the caller's [`Operator`] to a slice of the kernel's scratch space.
//!
//! Four solver kinds are supported, identified by short tags:
//!
//! | tag  | operator              | scalar  |
//! |------|-----------------------|---------|
//! | `dg` | general               | `f64`   |
//! | `zg` | general               | [`c64`] |
//! | `zh` | Hermitian             | [`c64`] |
//! | `ds` | symmetric             | `f64`   |
//!
//! Eigenvalues are always returned as [`c64`]. Real general operators produce
//! complex-conjugate pairs, which are kept adjacent and exactly conjugated.
//! Eigenvectors are returned as a row-major `n x k` matrix, see [`EigenResult`].
//!
//! ## Example Usage
//!
//! A sparse 1D Laplacian handed to the iterative path as a matrix-free operator:
//!
//! ```rust
//! use arnoldi_eigs::{Input, LinOpOperator, ProblemDescriptor, Source, eigs};
//! use faer::sparse::{SparseColMat, Triplet};
//!
//! let n = 50;
//! let mut triplets = Vec::new();
//! for i in 0..n {
//!     triplets.push(Triplet { row: i, col: i, val: 2.0 });
//!     if i + 1 < n {
//!         triplets.push(Triplet { row: i, col: i + 1, val: -1.0 });
//!         triplets.push(Triplet { row: i + 1, col: i, val: -1.0 });
//!     }
//! }
//! let a = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets).unwrap();
//! let a = a.as_ref();
//!
//! let mut op = LinOpOperator::new::<f64>(&a);
//! let problem = ProblemDescriptor::new(n, 3)
//!     .with_which("LA")
//!     .with_tolerance(1e-10);
//! let result = eigs("ds", Input::Real(Source::Operator(&mut op)), &problem).unwrap();
//!
//! // the largest eigenvalue of the Laplacian is 2 - 2 cos(n pi / (n + 1))
//! let expected = 2.0 - 2.0 * (n as f64 * std::f64::consts::PI / (n as f64 + 1.0)).cos();
//! assert!((result.eigenvalues()[0].re - expected).abs() < 1e-8);
//! assert_eq!(result.eigenvectors().unwrap().len(), n * 3);
//! ```

pub mod algorithms;
pub mod dense;
pub mod error;
pub mod operator;
pub mod problem;
pub mod rci;
pub mod reconstruct;
pub mod result;
pub mod scalar;
pub mod solvers;
pub mod utils;

pub use error::{EigsError, EigsErrorKind};
pub use faer::c64;
pub use operator::{FnOperator, LinOpOperator, Operator};
pub use problem::{Backend, ProblemDescriptor, SolverKind, Which};
pub use result::{EigenResult, SolveStats};
pub use solvers::{Input, Source, eigs, eigs_with_kind, release};
