//! Iterative kernels behind the reverse-communication driver.
//!
//! [`krylov_schur`] is the built-in kernel and is always available. With the
//! `arpack` feature the [`arpack`] module binds arpack-ng's `?naupd`/`?neupd`
//! pair behind the same [`crate::rci::ReverseCommKernel`] trait.

#[cfg(feature = "arpack")]
pub mod arpack;
pub mod krylov_schur;
pub(crate) mod ritz;

/// Whether the kernel may assume the operator is self-adjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    /// No structure; real operators produce complex-conjugate Ritz pairs.
    General,
    /// Symmetric or Hermitian; Ritz values are real.
    SelfAdjoint,
}
