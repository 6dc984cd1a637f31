//! Eigenpair reconstruction.
//!
//! Kernels hand back their results in one of two raw layouts, both with
//! eigenvectors stored column-major with leading dimension `n`:
//!
//! - **Complex**: eigenvalues and eigenvectors are already complex.
//! - **Real packed** (LAPACK `?geev` / ARPACK `?neupd` convention): eigenvalues
//!   come as separate real and imaginary parts, and a complex-conjugate pair
//!   `(λ, conj(λ))` occupies two consecutive indices `i, i + 1` with the
//!   positive imaginary part first. Its eigenvector is stored in two adjacent
//!   real columns, `v_i = z_i + i·z_{i+1}` and `v_{i+1} = conj(v_i)`.
//!
//! [`reconstruct`] turns either layout into `k` complex eigenvalues and a
//! row-major `n x k` complex eigenvector matrix.

use crate::error::{EigsError, EigsErrorKind};
use faer::c64;

/// Solver output before normalization. Eigenvector buffers are column-major, `n` rows.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEigenOutput {
    RealPacked {
        re: Vec<f64>,
        im: Vec<f64>,
        vectors: Option<Vec<f64>>,
    },
    Complex {
        values: Vec<c64>,
        vectors: Option<Vec<c64>>,
    },
}

impl RawEigenOutput {
    /// Number of eigenvalues the kernel produced.
    pub fn len(&self) -> usize {
        match self {
            RawEigenOutput::RealPacked { re, .. } => re.len(),
            RawEigenOutput::Complex { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reorders a column-major `nrows x ncols` buffer into row-major order.
///
/// Element `(i, j)` of the output is `data[nrows * j + i]`.
pub fn column_major_to_row_major<T: Copy>(data: &[T], nrows: usize, ncols: usize) -> Vec<T> {
    assert_eq!(data.len(), nrows * ncols);
    let mut out = Vec::with_capacity(data.len());
    for i in 0..nrows {
        for j in 0..ncols {
            out.push(data[nrows * j + i]);
        }
    }
    out
}

/// Inverse of [`column_major_to_row_major`].
pub fn row_major_to_column_major<T: Copy>(data: &[T], nrows: usize, ncols: usize) -> Vec<T> {
    assert_eq!(data.len(), nrows * ncols);
    let mut out = Vec::with_capacity(data.len());
    for j in 0..ncols {
        for i in 0..nrows {
            out.push(data[ncols * i + j]);
        }
    }
    out
}

fn malformed(msg: String) -> EigsError {
    EigsErrorKind::MalformedKernelOutput(msg).into()
}

/// Converts raw kernel output into the first `k` eigenvalues and, when
/// `with_vectors` is set, the row-major `n x k` eigenvector matrix.
pub fn reconstruct(
    raw: RawEigenOutput,
    n: usize,
    k: usize,
    with_vectors: bool,
) -> Result<(Vec<c64>, Option<Vec<c64>>), EigsError> {
    if raw.len() < k {
        return Err(malformed(format!(
            "kernel returned {} eigenvalues, {k} requested",
            raw.len()
        )));
    }

    let (values, column_major) = match raw {
        RawEigenOutput::Complex { values, vectors } => {
            let vectors = if with_vectors {
                let vectors = vectors.ok_or_else(|| malformed("missing eigenvectors".into()))?;
                check_vector_len(vectors.len(), n, k)?;
                Some(vectors[..n * k].to_vec())
            } else {
                None
            };
            (values[..k].to_vec(), vectors)
        }
        RawEigenOutput::RealPacked { re, im, vectors } => {
            if im.len() != re.len() {
                return Err(malformed(format!(
                    "{} real parts but {} imaginary parts",
                    re.len(),
                    im.len()
                )));
            }
            let vectors = match (with_vectors, vectors) {
                (true, Some(z)) => Some(z),
                (true, None) => return Err(malformed("missing eigenvectors".into())),
                (false, _) => None,
            };
            unpack_real(&re, &im, vectors.as_deref(), n, k)?
        }
    };

    let row_major = column_major.map(|cm| column_major_to_row_major(&cm, n, k));
    Ok((values, row_major))
}

fn check_vector_len(len: usize, n: usize, columns: usize) -> Result<(), EigsError> {
    if len < n * columns {
        return Err(malformed(format!(
            "eigenvector buffer holds {len} entries, {} needed",
            n * columns
        )));
    }
    Ok(())
}

/// Decodes the real packed layout, consuming conjugate pairs two indices at a time.
///
/// A pair whose first member is the last requested index is still decoded in
/// full from the kernel's extra column; only its first member is kept.
fn unpack_real(
    re: &[f64],
    im: &[f64],
    z: Option<&[f64]>,
    n: usize,
    k: usize,
) -> Result<(Vec<c64>, Option<Vec<c64>>), EigsError> {
    let available = re.len();
    let mut values = Vec::with_capacity(k);
    let mut vectors = z.map(|_| Vec::with_capacity(n * k));

    let mut i = 0;
    while i < k {
        if im[i] == 0.0 {
            values.push(c64::new(re[i], 0.0));
            if let (Some(z), Some(out)) = (z, vectors.as_mut()) {
                check_vector_len(z.len(), n, i + 1)?;
                out.extend(z[n * i..n * (i + 1)].iter().map(|&x| c64::new(x, 0.0)));
            }
            i += 1;
            continue;
        }

        if im[i] < 0.0 || i + 1 >= available || re[i + 1] != re[i] || im[i + 1] != -im[i] {
            return Err(malformed(format!(
                "eigenvalue {i} ({} {:+}i) is not the leading member of a conjugate pair",
                re[i], im[i]
            )));
        }

        let lambda = c64::new(re[i], im[i]);
        values.push(lambda);
        let keep_second = i + 1 < k;
        if keep_second {
            values.push(lambda.conj());
        }
        if let (Some(z), Some(out)) = (z, vectors.as_mut()) {
            check_vector_len(z.len(), n, i + 2)?;
            let (real, imag) = (&z[n * i..n * (i + 1)], &z[n * (i + 1)..n * (i + 2)]);
            out.extend(real.iter().zip(imag).map(|(&a, &b)| c64::new(a, b)));
            if keep_second {
                out.extend(real.iter().zip(imag).map(|(&a, &b)| c64::new(a, -b)));
            }
        }
        i += 2;
    }

    Ok((values, vectors))
}
