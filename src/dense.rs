//! Dense "compute-all" path.
//!
//! When every eigenpair is requested the operator is decomposed directly with
//! `faer`. The output is shaped into the same [`RawEigenOutput`] layouts the
//! iterative kernels produce, so both paths share one reconstruction step.

use crate::{
    algorithms::ritz::{self, Cluster},
    error::{EigsError, EigsErrorKind},
    problem::SolverKind,
    reconstruct::RawEigenOutput,
    scalar::Scalar,
};
use faer::{Mat, MatRef, c64};

fn column_major<T: Copy>(m: &Mat<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(m.nrows() * m.ncols());
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            out.push(m[(i, j)]);
        }
    }
    out
}

fn convergence_failure(err: faer::linalg::evd::EvdError) -> EigsError {
    log::warn!("dense eigendecomposition failed: {err:?}");
    EigsErrorKind::DenseConvergenceFailure(err).into()
}

/// All eigenpairs of the square matrix `a`, treated as an operator of `kind`.
///
/// Self-adjoint kinds read only the lower triangle. Eigenvectors are computed
/// either way and dropped when `vectors` is unset.
pub fn solve<T: Scalar>(
    kind: SolverKind,
    a: MatRef<'_, T>,
    vectors: bool,
) -> Result<RawEigenOutput, EigsError> {
    if a.nrows() != a.ncols() {
        return Err(EigsErrorKind::InvalidInput(format!(
            "the dense matrix is {} x {}, expected a square matrix",
            a.nrows(),
            a.ncols()
        ))
        .into());
    }
    log::debug!("dense {} eigendecomposition of order {}", kind, a.nrows());

    if kind.is_self_adjoint() {
        let (values, u) = T::hermitian_eigen(a).map_err(convergence_failure)?;
        let z = vectors.then(|| column_major(&u));
        if T::IS_REAL {
            Ok(RawEigenOutput::RealPacked {
                im: vec![0.0; values.len()],
                re: values,
                vectors: z.map(|z| z.into_iter().map(|x| x.real_value()).collect()),
            })
        } else {
            Ok(RawEigenOutput::Complex {
                values: values.into_iter().map(|x| c64::new(x, 0.0)).collect(),
                vectors: z.map(|z| z.into_iter().map(|x| x.to_c64()).collect()),
            })
        }
    } else {
        let (values, u) = T::general_eigen(a).map_err(convergence_failure)?;
        if T::IS_REAL {
            pack_real(&values, &u, vectors)
        } else {
            Ok(RawEigenOutput::Complex {
                values,
                vectors: vectors.then(|| column_major(&u)),
            })
        }
    }
}

/// Lays out the eigenpairs of a real matrix in the packed real convention.
///
/// Conjugate pairs become two consecutive entries, positive imaginary part
/// first, with exactly conjugate values, and their eigenvector is stored as a
/// real and an imaginary column. A complex value without a conjugate partner
/// cannot be packed and is reported as malformed output.
fn pack_real(values: &[c64], u: &Mat<c64>, vectors: bool) -> Result<RawEigenOutput, EigsError> {
    let n = u.nrows();
    let clusters = ritz::clusters(values, true);
    if let Some(i) = ritz::unpaired(values, &clusters) {
        return Err(EigsErrorKind::MalformedKernelOutput(format!(
            "eigenvalue {i} ({:?}) of a real matrix has no conjugate partner",
            values[i]
        ))
        .into());
    }
    let mut re = Vec::with_capacity(values.len());
    let mut im = Vec::with_capacity(values.len());
    let mut z = Vec::with_capacity(if vectors { n * values.len() } else { 0 });

    for cluster in clusters {
        match cluster {
            Cluster::Single(i) => {
                re.push(values[i].re);
                im.push(0.0);
                if vectors {
                    z.extend((0..n).map(|r| u[(r, i)].re));
                }
            }
            Cluster::Pair(i, _) => {
                let lambda = values[i];
                re.extend([lambda.re, lambda.re]);
                im.extend([lambda.im, -lambda.im]);
                if vectors {
                    z.extend((0..n).map(|r| u[(r, i)].re));
                    z.extend((0..n).map(|r| u[(r, i)].im));
                }
            }
        }
    }

    Ok(RawEigenOutput::RealPacked {
        re,
        im,
        vectors: vectors.then_some(z),
    })
}
