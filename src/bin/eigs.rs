//! Command-line front end for the eigensolvers.
//!
//! Loads a square sparse matrix from a Matrix Market file, or generates one of
//! a few synthetic test operators, computes `k` eigenpairs with the chosen
//! solver kind and writes one CSV record per eigenvalue. When eigenvectors are
//! requested, the relative residual `||A x - lambda x|| / ||x||` of each pair
//! is reported alongside.

use anyhow::{Context, Result, anyhow, ensure};
use arnoldi_eigs::{
    EigenResult, Input, LinOpOperator, ProblemDescriptor, SolverKind, Source, c64, eigs_with_kind,
    utils::data_loader::{LoadedMatrix, load_matrix_market},
};
use clap::{Parser, ValueEnum};
use faer::{
    Mat, MatRef, Scale,
    sparse::{SparseColMat, Triplet},
};
use serde::Serialize;
use std::{io, path::PathBuf};

/// Synthetic operators that can be generated instead of loading a file.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Problem {
    /// The 1D Laplacian `tridiag(-1, 2, -1)`; symmetric.
    Laplacian,
    /// `diag(1, 2, ..., n)`.
    Diagonal,
    /// Block diagonal with 2x2 blocks `[[d, 0.5], [-0.5, d]]`; eigenvalues
    /// come in conjugate pairs `d +/- 0.5i`.
    Rotation,
}

#[derive(Parser, Debug)]
#[clap(
    name = "eigs",
    about = "Computes k eigenpairs of a sparse operator with a dense or Arnoldi solver."
)]
struct EigsArgs {
    /// Solver kind: dg (real general), zg (complex general), zh (complex Hermitian),
    /// ds (real symmetric).
    #[clap(long, default_value = "dg")]
    solver: String,
    /// Path to a Matrix Market coordinate file.
    #[clap(long, conflicts_with = "problem")]
    matrix: Option<PathBuf>,
    /// Synthetic operator to generate when no file is given.
    #[clap(long, value_enum, default_value_t = Problem::Laplacian)]
    problem: Problem,
    /// Dimension of the generated operator.
    #[clap(long, default_value_t = 200)]
    n: usize,
    /// Number of eigenpairs to compute.
    #[clap(long, default_value_t = 6)]
    k: usize,
    /// Selector of the wanted part of the spectrum (LM, SM, LR, SR, LI, SI, LA, SA, BE).
    #[clap(long, default_value = "LM")]
    which: String,
    /// Convergence tolerance; zero or negative selects machine precision.
    #[clap(long, default_value_t = 0.0)]
    tol: f64,
    /// Maximum number of restart cycles; zero selects the default.
    #[clap(long, default_value_t = 0)]
    maxiter: usize,
    /// Also compute eigenvectors and report residuals.
    #[clap(long)]
    vectors: bool,
    /// Seed of the start vector.
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// CSV output file; standard output when omitted.
    #[clap(long)]
    output: Option<PathBuf>,
}

/// One record per computed eigenvalue.
#[derive(Debug, Serialize)]
struct EigenRecord {
    index: usize,
    re: f64,
    im: f64,
    residual: Option<f64>,
}

fn generate_problem(problem: Problem, n: usize) -> Result<SparseColMat<usize, f64>> {
    let mut triplets = Vec::with_capacity(3 * n);
    match problem {
        Problem::Laplacian => {
            for i in 0..n {
                triplets.push(Triplet {
                    row: i,
                    col: i,
                    val: 2.0,
                });
                if i + 1 < n {
                    triplets.push(Triplet {
                        row: i,
                        col: i + 1,
                        val: -1.0,
                    });
                    triplets.push(Triplet {
                        row: i + 1,
                        col: i,
                        val: -1.0,
                    });
                }
            }
        }
        Problem::Diagonal => {
            for i in 0..n {
                triplets.push(Triplet {
                    row: i,
                    col: i,
                    val: (i + 1) as f64,
                });
            }
        }
        Problem::Rotation => {
            ensure!(n % 2 == 0, "the rotation problem needs an even dimension, got {n}");
            for b in 0..n / 2 {
                let (i, d) = (2 * b, (b + 1) as f64);
                triplets.push(Triplet {
                    row: i,
                    col: i,
                    val: d,
                });
                triplets.push(Triplet {
                    row: i + 1,
                    col: i + 1,
                    val: d,
                });
                triplets.push(Triplet {
                    row: i,
                    col: i + 1,
                    val: 0.5,
                });
                triplets.push(Triplet {
                    row: i + 1,
                    col: i,
                    val: -0.5,
                });
            }
        }
    }
    SparseColMat::try_new_from_triplets(n, n, &triplets)
        .map_err(|e| anyhow!("failed to assemble the {problem:?} matrix: {e:?}"))
}

fn promote(a: &SparseColMat<usize, f64>) -> Result<SparseColMat<usize, c64>> {
    let triplets: Vec<_> = a
        .triplet_iter()
        .map(|t| Triplet {
            row: t.row,
            col: t.col,
            val: c64::new(*t.val, 0.0),
        })
        .collect();
    SparseColMat::try_new_from_triplets(a.nrows(), a.ncols(), &triplets)
        .map_err(|e| anyhow!("failed to promote the matrix to complex: {e:?}"))
}

/// `A x` for complex `x`, whatever the scalar type of `A`.
fn apply_complex(a: &LoadedMatrix, x: MatRef<'_, c64>) -> Mat<c64> {
    match a {
        LoadedMatrix::Real(a) => {
            // Real and imaginary parts go through the real product as two columns.
            let parts = Mat::from_fn(x.nrows(), 2, |i, j| {
                if j == 0 { x[(i, 0)].re } else { x[(i, 0)].im }
            });
            let y = a.as_ref() * parts.as_ref();
            Mat::from_fn(x.nrows(), 1, |i, _| c64::new(y[(i, 0)], y[(i, 1)]))
        }
        LoadedMatrix::Complex(a) => a.as_ref() * x,
    }
}

fn residuals(a: &LoadedMatrix, result: &EigenResult) -> Vec<Option<f64>> {
    (0..result.k())
        .map(|j| {
            let x = result.eigenvector(j)?;
            let x = MatRef::from_column_major_slice(&x, x.len(), 1);
            let lambda = result.eigenvalues()[j];
            let ax = apply_complex(a, x);
            let shifted = x * Scale(lambda);
            let norm = x.norm_l2().max(f64::MIN_POSITIVE);
            Some((&ax - &shifted).norm_l2() / norm)
        })
        .collect()
}

fn solve(kind: SolverKind, a: &LoadedMatrix, problem: &ProblemDescriptor) -> Result<EigenResult> {
    let result = match a {
        LoadedMatrix::Real(a) => {
            let a = a.as_ref();
            let mut op = LinOpOperator::new::<f64>(&a);
            eigs_with_kind(kind, Input::Real(Source::Operator(&mut op)), problem)
        }
        LoadedMatrix::Complex(a) => {
            let a = a.as_ref();
            let mut op = LinOpOperator::new::<c64>(&a);
            eigs_with_kind(kind, Input::Complex(Source::Operator(&mut op)), problem)
        }
    };
    result.with_context(|| format!("solver {kind} failed"))
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()?;
    let args = EigsArgs::parse();
    let kind: SolverKind = args.solver.parse()?;

    let matrix = match &args.matrix {
        Some(path) => {
            log::info!("Loading {path:?}...");
            load_matrix_market(path).with_context(|| format!("failed to load {path:?}"))?
        }
        None => {
            log::info!("Generating the {:?} problem with n = {}", args.problem, args.n);
            LoadedMatrix::Real(generate_problem(args.problem, args.n)?)
        }
    };

    // Real matrices are promoted for the complex kinds; the converse is refused.
    let matrix = match (matrix, kind.is_real()) {
        (LoadedMatrix::Real(a), false) => LoadedMatrix::Complex(promote(&a)?),
        (LoadedMatrix::Complex(_), true) => {
            return Err(anyhow!(
                "solver {kind} needs a real matrix, the input is complex"
            ));
        }
        (a, _) => a,
    };
    let n = matrix.nrows();

    let problem = ProblemDescriptor::new(n, args.k)
        .with_which(args.which.as_str())
        .with_tolerance(args.tol)
        .with_max_iterations(args.maxiter)
        .with_eigenvectors(args.vectors)
        .with_seed(args.seed);

    log::info!(
        "Solving for {} eigenvalues ({}) with solver {kind}, n = {n}",
        args.k,
        args.which
    );
    let result = solve(kind, &matrix, &problem)?;
    if let Some(stats) = result.stats() {
        log::info!(
            "Converged {} values in {} restarts and {} operator applications (ncv = {})",
            stats.converged,
            stats.iterations,
            stats.operator_applications,
            stats.subspace_dimension
        );
    }

    let residuals = residuals(&matrix, &result);
    let records = result
        .eigenvalues()
        .iter()
        .zip(residuals)
        .enumerate()
        .map(|(index, (value, residual))| EigenRecord {
            index,
            re: value.re,
            im: value.im,
            residual,
        });

    match &args.output {
        Some(path) => {
            log::info!("Writing results to {path:?}...");
            let mut writer = csv::Writer::from_path(path)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        None => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
    }

    result.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_complex_agrees_for_real_and_promoted() {
        let a = generate_problem(Problem::Rotation, 4).unwrap();
        let x = Mat::from_fn(4, 1, |i, _| c64::new(i as f64 + 1.0, 0.5 - i as f64));
        let real = apply_complex(&LoadedMatrix::Real(a.clone()), x.as_ref());
        let complex = apply_complex(&LoadedMatrix::Complex(promote(&a).unwrap()), x.as_ref());
        assert!((&real - &complex).norm_l2() < 1e-14);
        // First block [[1, 0.5], [-0.5, 1]] applied to (x0, x1).
        let y0 = x[(0, 0)] + x[(1, 0)] * 0.5;
        assert!((real[(0, 0)] - y0).norm() < 1e-14);
    }

    #[test]
    fn test_residuals_of_exact_pairs_vanish() {
        let matrix = LoadedMatrix::Real(generate_problem(Problem::Laplacian, 12).unwrap());
        let problem = ProblemDescriptor::new(12, 3).with_tolerance(1e-12);
        let result = solve(SolverKind::SymmetricReal, &matrix, &problem).unwrap();
        let residuals = residuals(&matrix, &result);
        assert_eq!(residuals.len(), 3);
        assert!(residuals.iter().all(|r| r.is_some_and(|r| r < 1e-8)));
    }
}
