//! Thick-restart Arnoldi (Krylov-Schur) kernel.
//!
//! The kernel maintains an Arnoldi-like factorization
//!
//! ```text
//! A V_m = V_m H_m + v_m b^T
//! ```
//!
//! where `V_m` has `m = ncv` orthonormal columns, `H_m` is the `m x m`
//! Rayleigh quotient and `v_m` is the normalized residual. Right after an
//! expansion `b` is `beta e_m`; after a restart it is a full row. Both live in
//! an `(m + 1) x m` matrix whose last row is `b`.
//!
//! When the basis is full the Ritz pairs of `H_m` are ranked by the selector.
//! If every wanted Ritz value satisfies
//! `|b^T y| <= tol * max(eps^(2/3), |theta|)` the kernel terminates; otherwise
//! it keeps an invariant subspace of `H_m` spanned by the most wanted Ritz
//! vectors (real and imaginary parts for conjugate pairs of real operators),
//! rotates the basis onto it and expands again.
//!
//! The kernel never touches the operator. It parks the vector to multiply in
//! `workd[0..n]`, asks for the product in `workd[n..2n]` and returns.

use super::{
    Structure,
    ritz::{self, Cluster},
};
use crate::{
    problem::Which,
    rci::{
        ExtractRequest, IDO_APPLY, IDO_APPLY_INITIAL, INFO_MAX_ITERATIONS, RciState,
        ReverseCommKernel, Selection,
    },
    reconstruct::RawEigenOutput,
    scalar::Scalar,
};
use faer::{Accum, Mat, MatMut, MatRef, Par, c64, linalg::matmul::matmul};
use rand::{SeedableRng, rngs::StdRng};

/// `n` is zero or does not match the communication state.
pub const INFO_BAD_DIMENSION: i32 = -1;
/// `nev` is zero.
pub const INFO_BAD_NEV: i32 = -2;
/// `ncv` is not in `nev + 2 ..= n`.
pub const INFO_BAD_NCV: i32 = -3;
/// The iteration cap is zero.
pub const INFO_BAD_MAX_ITERATIONS: i32 = -4;
/// The selector does not apply to the operator structure.
pub const INFO_BAD_WHICH: i32 = -5;
/// The projected eigenproblem could not be solved.
pub const INFO_PROJECTED_EIGEN_FAILED: i32 = -8;
/// No usable start or continuation vector could be generated.
pub const INFO_NO_START_VECTOR: i32 = -9;
/// Extraction was requested without a converged run.
pub const INFO_NOT_CONVERGED: i32 = -14;
/// A complex Ritz value of a real operator has no conjugate partner.
pub const INFO_UNPAIRED_RITZ_VALUE: i32 = -15;
/// The restarted factorization collapsed.
pub const INFO_RESTART_FAILED: i32 = -9999;

/// Second Gram-Schmidt pass threshold of Daniel, Gragg, Kaufman and Stewart.
const DGKS_RATIO: f64 = 0.717;
const MAX_ORTHOGONALIZATION_PASSES: usize = 3;
const MAX_RANDOM_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KrylovSchurParams {
    /// Number of wanted eigenvalues.
    pub nev: usize,
    /// Krylov subspace dimension.
    pub ncv: usize,
    pub which: Which,
    /// Relative tolerance, non-positive for machine precision.
    pub tolerance: f64,
    /// Cap on restart cycles.
    pub max_iterations: usize,
    pub structure: Structure,
    /// Seed of the start vector.
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    /// Waiting for `A v_j`.
    Expanding(usize),
    Done,
}

/// Ritz data of the last full basis.
#[derive(Debug, Clone)]
struct RitzPairs {
    values: Vec<c64>,
    /// Eigenvectors of `H_m`, one per column, unit norm.
    vectors: Mat<c64>,
    ranked: Vec<Cluster>,
    /// Clusters in `ranked` that make up the wanted set.
    wanted: usize,
    /// Number of values in the wanted clusters.
    wanted_values: usize,
    converged: Vec<bool>,
}

impl RitzPairs {
    fn cluster_converged(&self, cluster: Cluster) -> bool {
        cluster.indices().all(|i| self.converged[i])
    }

    fn coefficients(&self, i: usize) -> Vec<c64> {
        (0..self.vectors.nrows())
            .map(|r| self.vectors[(r, i)])
            .collect()
    }
}

/// The native reverse-communication kernel.
pub struct KrylovSchur<T: Scalar> {
    n: usize,
    params: KrylovSchurParams,
    rng: StdRng,
    /// `n x (ncv + 1)`; the last column is the residual direction.
    basis: Mat<T>,
    /// `(ncv + 1) x ncv`.
    h: Mat<T>,
    phase: Phase,
    iterations: usize,
    converged: usize,
    ritz: Option<RitzPairs>,
}

impl<T: Scalar> KrylovSchur<T> {
    pub fn new(n: usize, params: KrylovSchurParams) -> Self {
        let ncv = params.ncv;
        Self {
            n,
            params,
            rng: StdRng::seed_from_u64(params.seed),
            basis: Mat::zeros(n, ncv + 1),
            h: Mat::zeros(ncv + 1, ncv),
            phase: Phase::Start,
            iterations: 0,
            converged: 0,
            ritz: None,
        }
    }

    pub fn params(&self) -> &KrylovSchurParams {
        &self.params
    }

    fn pair_conjugates(&self) -> bool {
        T::IS_REAL && self.params.structure == Structure::General
    }

    fn check_parameters(&self, state_n: usize) -> Result<(), i32> {
        let p = &self.params;
        if self.n == 0 || state_n != self.n {
            return Err(INFO_BAD_DIMENSION);
        }
        if p.nev == 0 {
            return Err(INFO_BAD_NEV);
        }
        if p.ncv < p.nev + 2 || p.ncv > self.n {
            return Err(INFO_BAD_NCV);
        }
        if p.max_iterations == 0 {
            return Err(INFO_BAD_MAX_ITERATIONS);
        }
        let self_adjoint_only = matches!(
            p.which,
            Which::LargestAlgebraic | Which::SmallestAlgebraic | Which::BothEnds
        );
        if self_adjoint_only && p.structure == Structure::General {
            return Err(INFO_BAD_WHICH);
        }
        Ok(())
    }

    fn fail(&mut self, state: &mut RciState<T>, info: i32) {
        self.phase = Phase::Done;
        state.finish(info);
    }

    /// Parks `v_j` in `workd[0..n]` and asks for `A v_j` in `workd[n..2n]`.
    fn request_apply(&mut self, state: &mut RciState<T>, j: usize, ido: i32) {
        let n = self.n;
        MatMut::from_column_major_slice_mut(&mut state.workd[..n], n, 1)
            .copy_from(self.basis.as_ref().get(.., j..j + 1));
        state.request(ido, 0, n);
        self.phase = Phase::Expanding(j);
    }

    fn start(&mut self, state: &mut RciState<T>) {
        if let Err(info) = self.check_parameters(state.n()) {
            log::debug!("rejected kernel parameters: info = {info}");
            self.fail(state, info);
            return;
        }
        match self.random_orthogonal(0) {
            Some(v0) => self.basis.col_mut(0).copy_from(v0.col(0)),
            None => {
                self.fail(state, INFO_NO_START_VECTOR);
                return;
            }
        }
        self.request_apply(state, 0, IDO_APPLY_INITIAL);
    }

    /// Classical Gram-Schmidt of the column `w` against the first `cols` basis
    /// vectors, repeated while a pass shrinks `w` by more than [`DGKS_RATIO`].
    ///
    /// Returns the accumulated coefficients, the final norm and whether the
    /// norm stabilized. An unstable result means `w` lies in the span.
    fn orthogonalize(&self, w: &mut Mat<T>, cols: usize) -> (Mat<T>, f64, bool) {
        let v = self.basis.as_ref().get(.., 0..cols);
        let mut coeffs = Mat::<T>::zeros(cols, 1);
        let mut previous = w.norm_l2();
        if previous == 0.0 {
            return (coeffs, 0.0, false);
        }

        let mut beta = previous;
        for _ in 0..MAX_ORTHOGONALIZATION_PASSES {
            // w <- w - V (V^H w)
            let projection = v.adjoint() * w.as_ref();
            matmul(
                w.as_mut(),
                Accum::Add,
                v,
                projection.as_ref(),
                -T::from_real(1.0),
                Par::Seq,
            );
            coeffs = &coeffs + &projection;
            beta = w.norm_l2();
            if beta > DGKS_RATIO * previous {
                return (coeffs, beta, true);
            }
            previous = beta;
        }
        (coeffs, beta, false)
    }

    /// A random unit column orthogonal to the first `cols` basis vectors.
    fn random_orthogonal(&mut self, cols: usize) -> Option<Mat<T>> {
        let n = self.n;
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let rng = &mut self.rng;
            let mut v = Mat::from_fn(n, 1, |_, _| T::sample(rng));
            let (_, beta, stable) = self.orthogonalize(&mut v, cols);
            if stable && beta > 0.0 {
                v *= 1.0 / beta;
                return Some(v);
            }
        }
        None
    }

    /// Folds `A v_j` from `workd[n..2n]` into the factorization.
    fn absorb(&mut self, state: &mut RciState<T>, j: usize) {
        let n = self.n;
        let m = self.params.ncv;
        let mut w = MatRef::from_column_major_slice(&state.workd[n..2 * n], n, 1).to_owned();
        let (coeffs, beta, stable) = self.orthogonalize(&mut w, j + 1);
        self.h
            .as_mut()
            .get_mut(0..j + 1, j..j + 1)
            .copy_from(coeffs.as_ref());

        let next = j + 1;
        // Once the basis spans the whole space the residual is rounding noise.
        let spans_space = next == n;
        if stable && beta > 0.0 && !spans_space {
            self.h[(next, j)] = T::from_real(beta);
            w *= 1.0 / beta;
            self.basis.col_mut(next).copy_from(w.col(0));
        } else {
            self.h[(next, j)] = T::zero();
            if next < m {
                log::debug!("invariant subspace of dimension {next} found, continuing");
                match self.random_orthogonal(next) {
                    Some(v) => self.basis.col_mut(next).copy_from(v.col(0)),
                    None => {
                        self.fail(state, INFO_NO_START_VECTOR);
                        return;
                    }
                }
            } else {
                self.basis.col_mut(next).fill(T::zero());
            }
        }

        if next < m {
            self.request_apply(state, next, IDO_APPLY);
        } else {
            self.check_convergence(state);
        }
    }

    fn check_convergence(&mut self, state: &mut RciState<T>) {
        self.iterations += 1;
        let ritz = match self.ritz_pairs() {
            Ok(ritz) => ritz,
            Err(info) => {
                self.fail(state, info);
                return;
            }
        };

        let converged_values: usize = ritz.ranked[..ritz.wanted]
            .iter()
            .filter(|&&c| ritz.cluster_converged(c))
            .map(|c| c.len())
            .sum();
        self.converged = converged_values.min(self.params.nev);
        let done = converged_values == ritz.wanted_values;
        log::debug!(
            "cycle {}: {} of {} wanted Ritz values converged",
            self.iterations,
            converged_values,
            ritz.wanted_values
        );

        if done {
            self.ritz = Some(ritz);
            self.phase = Phase::Done;
            state.finish(0);
            return;
        }
        if self.iterations >= self.params.max_iterations {
            self.ritz = Some(ritz);
            self.fail(state, INFO_MAX_ITERATIONS);
            return;
        }
        match self.restart(&ritz) {
            Ok(p) => self.request_apply(state, p, IDO_APPLY),
            Err(info) => self.fail(state, info),
        }
    }

    /// Solves the projected eigenproblem and measures the residual of every Ritz pair.
    fn ritz_pairs(&self) -> Result<RitzPairs, i32> {
        let m = self.params.ncv;
        let hm = self.h.as_ref().get(0..m, ..);

        let (values, vectors) = match self.params.structure {
            Structure::General => {
                T::general_eigen(hm).map_err(|_| INFO_PROJECTED_EIGEN_FAILED)?
            }
            Structure::SelfAdjoint => {
                let sym = (hm + hm.adjoint()) * 0.5;
                let (values, y) =
                    T::hermitian_eigen(sym.as_ref()).map_err(|_| INFO_PROJECTED_EIGEN_FAILED)?;
                (
                    values.into_iter().map(|x| c64::new(x, 0.0)).collect(),
                    Mat::from_fn(m, m, |i, j| y[(i, j)].to_c64()),
                )
            }
        };
        if values.len() != m {
            return Err(INFO_PROJECTED_EIGEN_FAILED);
        }

        let lengths: Vec<f64> = (0..m).map(|j| vectors.col(j).norm_l2()).collect();
        let vectors = Mat::from_fn(m, m, |i, j| match lengths[j] {
            len if len > 0.0 => vectors[(i, j)] / len,
            _ => vectors[(i, j)],
        });

        let ranked = ritz::rank(&values, self.params.which, self.pair_conjugates());
        let (wanted, wanted_values) = ritz::wanted_prefix(&ranked, self.params.nev);

        let eps = f64::EPSILON;
        let tol = if self.params.tolerance > 0.0 {
            self.params.tolerance
        } else {
            eps
        };
        let eps23 = eps.powf(2.0 / 3.0);
        // Residual norms |b^T y_i| for every Ritz vector at once.
        let b = Mat::from_fn(1, m, |_, j| self.h[(m, j)].to_c64());
        let residuals = &b * &vectors;
        let converged = (0..m)
            .map(|i| residuals[(0, i)].norm() <= tol * eps23.max(values[i].norm()))
            .collect();

        Ok(RitzPairs {
            values,
            vectors,
            ranked,
            wanted,
            wanted_values,
            converged,
        })
    }

    /// Compresses the factorization onto the most wanted Ritz vectors.
    ///
    /// Returns the new basis size `p`; column `p` holds the residual vector.
    fn restart(&mut self, ritz: &RitzPairs) -> Result<usize, i32> {
        let n = self.n;
        let m = self.params.ncv;
        let target = ritz.wanted_values + (m - ritz.wanted_values) / 2;

        let mut columns: Vec<Mat<T>> = Vec::with_capacity(target);
        for (c, &cluster) in ritz.ranked.iter().enumerate() {
            if c >= ritz.wanted && columns.len() + cluster.len() > target {
                break;
            }
            match cluster {
                Cluster::Pair(i, _) => {
                    let y = ritz.coefficients(i);
                    columns.push(Mat::from_fn(m, 1, |r, _| T::from_real(y[r].re)));
                    columns.push(Mat::from_fn(m, 1, |r, _| T::from_real(y[r].im)));
                }
                Cluster::Single(i) => {
                    let mut y = ritz.coefficients(i);
                    if T::IS_REAL {
                        real_phase(&mut y);
                    }
                    columns.push(Mat::from_fn(m, 1, |r, _| T::from_c64(y[r])));
                }
            }
        }

        // Orthonormalize the kept coefficient vectors, two Gram-Schmidt sweeps each.
        let mut q_full = Mat::<T>::zeros(m, m);
        let mut p = 0;
        for mut col in columns {
            if p == m {
                break;
            }
            let before = col.norm_l2();
            for _ in 0..2 {
                let kept = q_full.as_ref().get(.., 0..p);
                let projection = kept.adjoint() * col.as_ref();
                matmul(
                    col.as_mut(),
                    Accum::Add,
                    kept,
                    projection.as_ref(),
                    -T::from_real(1.0),
                    Par::Seq,
                );
            }
            let after = col.norm_l2();
            if after == 0.0 || after <= 1e-10 * before {
                log::debug!("dropping a dependent Ritz vector during restart");
                continue;
            }
            col *= 1.0 / after;
            q_full.col_mut(p).copy_from(col.col(0));
            p += 1;
        }
        if p == 0 || p >= m {
            return Err(INFO_RESTART_FAILED);
        }
        let q = q_full.as_ref().get(.., 0..p);

        // S = Q^H H_m Q and the new residual row b^T Q.
        let hm = self.h.as_ref().get(0..m, ..);
        let hq = hm * q;
        let s = q.adjoint() * hq.as_ref();
        let b = self.h.as_ref().get(m..m + 1, ..) * q;

        let mut h = Mat::<T>::zeros(m + 1, m);
        h.as_mut().get_mut(0..p, 0..p).copy_from(s.as_ref());
        h.as_mut().get_mut(p..p + 1, 0..p).copy_from(b.as_ref());

        // V_p = V_m Q, followed by the unchanged residual direction.
        let mut basis = Mat::<T>::zeros(n, m + 1);
        matmul(
            basis.as_mut().get_mut(.., 0..p),
            Accum::Replace,
            self.basis.as_ref().get(.., 0..m),
            q,
            T::from_real(1.0),
            Par::Seq,
        );
        basis.col_mut(p).copy_from(self.basis.col(m));

        self.basis = basis;
        self.h = h;
        log::trace!("restarted with {p} kept Ritz vectors");
        Ok(p)
    }

    /// The first `ncv` basis vectors, promoted to complex.
    fn complex_basis(&self) -> Mat<c64> {
        Mat::from_fn(self.n, self.params.ncv, |i, j| self.basis[(i, j)].to_c64())
    }
}

/// `V y`, normalized, as an `n x 1` column.
fn ritz_vector(basis: MatRef<'_, c64>, y: &[c64]) -> Mat<c64> {
    let x = basis * MatRef::from_column_major_slice(y, y.len(), 1);
    let len = x.norm_l2();
    if len > 0.0 { x * (1.0 / len) } else { x }
}

/// Rotates `y` so that its largest entry is real and positive.
fn real_phase(y: &mut [c64]) {
    let pivot = y
        .iter()
        .copied()
        .max_by(|a, b| a.norm().total_cmp(&b.norm()));
    if let Some(pivot) = pivot {
        let len = pivot.norm();
        if len > 0.0 {
            let rotation = pivot.conj() / len;
            y.iter_mut().for_each(|z| *z *= rotation);
        }
    }
}

impl<T: Scalar> ReverseCommKernel<T> for KrylovSchur<T> {
    fn subspace_dimension(&self) -> usize {
        self.params.ncv
    }

    fn step(&mut self, state: &mut RciState<T>) {
        match self.phase {
            Phase::Start => self.start(state),
            Phase::Expanding(j) => self.absorb(state, j),
            Phase::Done => {}
        }
    }

    fn extract(
        &mut self,
        state: &mut RciState<T>,
        request: ExtractRequest<T>,
    ) -> Result<RawEigenOutput, i32> {
        if self.phase != Phase::Done || state.info != 0 {
            return Err(INFO_NOT_CONVERGED);
        }
        let ritz = self.ritz.as_ref().ok_or(INFO_NOT_CONVERGED)?;
        let clusters: Vec<Cluster> = match request.selection {
            Selection::Wanted => ritz.ranked[..ritz.wanted].to_vec(),
            Selection::AllConverged => ritz
                .ranked
                .iter()
                .copied()
                .filter(|&c| ritz.cluster_converged(c))
                .collect(),
        };
        let basis = if request.vectors {
            self.complex_basis()
        } else {
            Mat::zeros(0, 0)
        };

        let unpaired = if self.pair_conjugates() {
            ritz::unpaired(&ritz.values, &clusters)
        } else {
            None
        };
        if let Some(i) = unpaired {
            log::warn!("Ritz value {:?} has no conjugate partner", ritz.values[i]);
            return Err(INFO_UNPAIRED_RITZ_VALUE);
        }

        if T::IS_REAL {
            let mut re = Vec::new();
            let mut im = Vec::new();
            let mut z = Vec::new();
            for cluster in clusters {
                match cluster {
                    Cluster::Single(i) => {
                        re.push(ritz.values[i].re);
                        im.push(0.0);
                        if request.vectors {
                            let mut y = ritz.coefficients(i);
                            real_phase(&mut y);
                            let y: Vec<c64> = y.iter().map(|v| c64::new(v.re, 0.0)).collect();
                            let x = ritz_vector(basis.as_ref(), &y);
                            z.extend((0..self.n).map(|r| x[(r, 0)].re));
                        }
                    }
                    Cluster::Pair(i, _) => {
                        let theta = ritz.values[i];
                        re.extend([theta.re, theta.re]);
                        im.extend([theta.im, -theta.im]);
                        if request.vectors {
                            let x = ritz_vector(basis.as_ref(), &ritz.coefficients(i));
                            z.extend((0..self.n).map(|r| x[(r, 0)].re));
                            z.extend((0..self.n).map(|r| x[(r, 0)].im));
                        }
                    }
                }
            }
            Ok(RawEigenOutput::RealPacked {
                re,
                im,
                vectors: request.vectors.then_some(z),
            })
        } else {
            let mut values = Vec::new();
            let mut z = Vec::new();
            for i in clusters.into_iter().flat_map(|c| c.indices()) {
                values.push(ritz.values[i]);
                if request.vectors {
                    let x = ritz_vector(basis.as_ref(), &ritz.coefficients(i));
                    z.extend((0..self.n).map(|r| x[(r, 0)]));
                }
            }
            Ok(RawEigenOutput::Complex {
                values,
                vectors: request.vectors.then_some(z),
            })
        }
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn converged(&self) -> usize {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::EigsErrorKind,
        operator::{FnOperator, Operator},
        rci::{self, subspace_dimension},
        reconstruct::reconstruct,
    };

    fn params(n: usize, nev: usize, which: Which, structure: Structure) -> KrylovSchurParams {
        KrylovSchurParams {
            nev,
            ncv: subspace_dimension(n, nev),
            which,
            tolerance: 1e-12,
            max_iterations: 10 * n,
            structure,
            seed: 42,
        }
    }

    fn diagonal(values: Vec<f64>) -> FnOperator<impl FnMut(&[f64], &mut [f64])> {
        FnOperator::new(values.len(), move |x: &[f64], y: &mut [f64]| {
            for ((yi, xi), d) in y.iter_mut().zip(x).zip(&values) {
                *yi = d * xi;
            }
        })
    }

    fn residual(op: &mut dyn Operator<f64>, lambda: c64, x: &[c64]) -> f64 {
        let re: Vec<f64> = x.iter().map(|v| v.re).collect();
        let im: Vec<f64> = x.iter().map(|v| v.im).collect();
        let mut are = vec![0.0; x.len()];
        let mut aim = vec![0.0; x.len()];
        op.apply(&re, &mut are);
        op.apply(&im, &mut aim);
        x.iter()
            .enumerate()
            .map(|(i, xi)| (c64::new(are[i], aim[i]) - lambda * xi).norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_largest_magnitude_of_diagonal_with_restarts() {
        let n = 100;
        let mut op = diagonal((1..=n).map(|i| i as f64).collect());
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 4, Which::LargestMagnitude, Structure::General),
        );
        let (raw, stats) = rci::solve(&mut kernel, &mut op, 4, true).unwrap();
        assert!(stats.iterations > 1);
        let (values, vectors) = reconstruct(raw, n, 4, true).unwrap();
        let vectors = vectors.unwrap();

        for (j, expected) in [100.0, 99.0, 98.0, 97.0].into_iter().enumerate() {
            assert!((values[j].re - expected).abs() < 1e-8, "{:?}", values[j]);
            assert_eq!(values[j].im, 0.0);
            let x: Vec<c64> = (0..n).map(|i| vectors[i * 4 + j]).collect();
            assert!(residual(&mut op, values[j], &x) < 1e-6);
        }
    }

    #[test]
    fn test_smallest_algebraic_self_adjoint() {
        let n = 60;
        let mut op = diagonal((0..n).map(|i| (i as f64) - 10.0).collect());
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 3, Which::SmallestAlgebraic, Structure::SelfAdjoint),
        );
        let (raw, _) = rci::solve(&mut kernel, &mut op, 3, false).unwrap();
        let (values, _) = reconstruct(raw, n, 3, false).unwrap();
        let re: Vec<f64> = values.iter().map(|v| v.re).collect();
        for (got, expected) in re.iter().zip([-10.0, -9.0, -8.0]) {
            assert!((got - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn test_real_operator_yields_exact_conjugate_pair() {
        // A rotation-scaling block with eigenvalues 40 +- 10i on top of a small diagonal.
        let n = 30;
        let mut op = FnOperator::new(n, |x: &[f64], y: &mut [f64]| {
            y[0] = 40.0 * x[0] - 10.0 * x[1];
            y[1] = 10.0 * x[0] + 40.0 * x[1];
            for i in 2..x.len() {
                y[i] = (i as f64) * x[i];
            }
        });
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 1, Which::LargestMagnitude, Structure::General),
        );
        let (raw, _) = rci::solve(&mut kernel, &mut op, 1, true).unwrap();
        assert_eq!(raw.len(), 2);
        let (values, vectors) = reconstruct(raw, n, 2, true).unwrap();
        assert_eq!(values[0], values[1].conj());
        assert!((values[0] - c64::new(40.0, 10.0)).norm() < 1e-8);

        let vectors = vectors.unwrap();
        let x: Vec<c64> = (0..n).map(|i| vectors[i * 2]).collect();
        let x_bar: Vec<c64> = (0..n).map(|i| vectors[i * 2 + 1]).collect();
        assert!(x.iter().zip(&x_bar).all(|(a, b)| *a == b.conj()));
        assert!(residual(&mut op, values[0], &x) < 1e-6);
    }

    #[test]
    fn test_complex_hermitian_kernel() {
        let n = 40;
        let mut op = FnOperator::new(n, |x: &[c64], y: &mut [c64]| {
            // Hermitian tridiagonal with i on the super-diagonal, spectrum in (-2, 2).
            for k in 0..x.len() {
                let mut acc = c64::new(0.0, 0.0);
                if k > 0 {
                    acc += c64::new(0.0, -1.0) * x[k - 1];
                }
                if k + 1 < x.len() {
                    acc += c64::new(0.0, 1.0) * x[k + 1];
                }
                y[k] = acc;
            }
        });
        let mut kernel = KrylovSchur::<c64>::new(
            n,
            params(n, 2, Which::LargestReal, Structure::SelfAdjoint),
        );
        let (raw, _) = rci::solve(&mut kernel, &mut op, 2, false).unwrap();
        let (values, _) = reconstruct(raw, n, 2, false).unwrap();
        let expected = 2.0 * (std::f64::consts::PI / (n as f64 + 1.0)).cos();
        assert!((values[0].re - expected).abs() < 1e-8);
        assert_eq!(values[0].im, 0.0);
        assert!(values[1].re < values[0].re);
    }

    #[test]
    fn test_identity_breaks_down_and_still_converges() {
        let n = 30;
        let mut op = FnOperator::new(n, |x: &[f64], y: &mut [f64]| y.copy_from_slice(x));
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 2, Which::LargestMagnitude, Structure::General),
        );
        let (raw, stats) = rci::solve(&mut kernel, &mut op, 2, true).unwrap();
        assert_eq!(stats.iterations, 1);
        let (values, _) = reconstruct(raw, n, 2, true).unwrap();
        for v in values {
            assert!((v - c64::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let n = 200;
        let mut op = diagonal((1..=n).map(|i| i as f64).collect());
        let mut p = params(n, 3, Which::LargestMagnitude, Structure::General);
        p.max_iterations = 1;
        p.tolerance = 1e-14;
        let mut kernel = KrylovSchur::<f64>::new(n, p);
        let err = rci::solve(&mut kernel, &mut op, 3, false).unwrap_err();
        assert!(matches!(
            err.kind(),
            EigsErrorKind::MaxIterationsExceeded { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_bad_parameters_terminate_immediately() {
        let n = 10;
        let mut op = diagonal(vec![1.0; n]);
        let mut p = params(n, 3, Which::LargestMagnitude, Structure::General);
        p.ncv = n + 1;
        let mut kernel = KrylovSchur::<f64>::new(n, p);
        let err = rci::solve(&mut kernel, &mut op, 3, false).unwrap_err();
        assert_eq!(
            err.kind(),
            &EigsErrorKind::IterationDivergence {
                ido: 99,
                info: INFO_BAD_NCV
            }
        );

        let p = params(n, 3, Which::BothEnds, Structure::General);
        let mut kernel = KrylovSchur::<f64>::new(n, p);
        let err = rci::solve(&mut kernel, &mut op, 3, false).unwrap_err();
        assert_eq!(
            err.kind(),
            &EigsErrorKind::IterationDivergence {
                ido: 99,
                info: INFO_BAD_WHICH
            }
        );
    }

    #[test]
    fn test_extract_before_convergence_fails() {
        let n = 10;
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 2, Which::LargestMagnitude, Structure::General),
        );
        let mut state = RciState::new(n);
        let request = ExtractRequest {
            vectors: false,
            selection: Selection::Wanted,
            shift: 0.0,
        };
        assert_eq!(
            kernel.extract(&mut state, request),
            Err(INFO_NOT_CONVERGED)
        );
    }

    #[test]
    fn test_unpaired_ritz_value_is_not_extracted() {
        let n = 10;
        let mut kernel = KrylovSchur::<f64>::new(
            n,
            params(n, 1, Which::LargestMagnitude, Structure::General),
        );
        let m = kernel.params().ncv;
        kernel.phase = Phase::Done;
        kernel.ritz = Some(RitzPairs {
            values: vec![c64::new(3.0, 1.0)],
            vectors: Mat::zeros(m, 1),
            ranked: vec![Cluster::Single(0)],
            wanted: 1,
            wanted_values: 1,
            converged: vec![true],
        });
        let mut state = RciState::new(n);
        let request = ExtractRequest {
            vectors: false,
            selection: Selection::Wanted,
            shift: 0.0,
        };
        assert_eq!(
            kernel.extract(&mut state, request),
            Err(INFO_UNPAIRED_RITZ_VALUE)
        );
    }

    #[test]
    fn test_same_seed_same_result() {
        let n = 80;
        let run = || {
            let mut op = diagonal((0..n).map(|i| ((i * 37) % n) as f64).collect());
            let mut kernel = KrylovSchur::<f64>::new(
                n,
                params(n, 3, Which::LargestMagnitude, Structure::General),
            );
            rci::solve(&mut kernel, &mut op, 3, true).unwrap()
        };
        assert_eq!(run(), run());
    }
}
