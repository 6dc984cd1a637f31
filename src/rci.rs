//! The reverse-communication driver.
//!
//! An iterative kernel never calls the operator itself. It suspends, leaving
//! in the shared [`RciState`] a status code `ido` and two 1-based offsets in
//! `ipntr` that locate an input and an output vector inside the `3n` scratch
//! buffer `workd`. The driver applies the operator to that input, writes the
//! image into that output and resumes the kernel, until the kernel signals
//! termination. This is the protocol of ARPACK's `?naupd` routines.
//!
//! Raw `ido`/`info` codes are decoded into [`RciStatus`] immediately after each
//! kernel call so the loop in [`solve`] is written against enumerated states.
//!
//! ```text
//!   START ──step──▶ APPLYING_OP ──step──▶ APPLYING_OP ─ ... ─▶ CONVERGED ──extract──▶ output
//!                        │
//!                        ├──────▶ MAX_ITER_FAIL
//!                        └──────▶ KERNEL_ERROR
//! ```

use crate::{
    error::{EigsError, EigsErrorKind},
    operator::Operator,
    reconstruct::RawEigenOutput,
    result::SolveStats,
    scalar::Scalar,
};
use std::ops::Range;

/// `ido` before the first kernel call.
pub const IDO_START: i32 = 0;
/// Apply the operator during initialization.
pub const IDO_APPLY_INITIAL: i32 = -1;
/// Apply the operator.
pub const IDO_APPLY: i32 = 1;
/// Apply the mass matrix `B`, the identity for standard eigenproblems.
pub const IDO_APPLY_MASS: i32 = 2;
/// The kernel has terminated; `info` tells how.
pub const IDO_DONE: i32 = 99;
/// `info` value reporting an exhausted iteration cap.
pub const INFO_MAX_ITERATIONS: i32 = 1;

/// Size of the pointer array, as in ARPACK.
pub const IPNTR_LEN: usize = 14;

/// Krylov subspace dimension for `k` wanted eigenpairs of an `n`-dimensional operator.
///
/// `2k + 1`, raised to at least 20 and capped at `n`.
pub fn subspace_dimension(n: usize, k: usize) -> usize {
    (2 * k + 1).max(20).min(n)
}

/// State shared between the driver and a kernel for the duration of one solve.
#[derive(Debug, Clone)]
pub struct RciState<T> {
    n: usize,
    /// Reverse-communication flag, written by the kernel.
    pub ido: i32,
    /// Kernel status, `0` while healthy.
    pub info: i32,
    /// 1-based offsets into `workd`: `ipntr[0]` input, `ipntr[1]` output.
    pub ipntr: [i32; IPNTR_LEN],
    /// Scratch of length `3n` holding the vectors exchanged with the operator.
    pub workd: Vec<T>,
}

impl<T: Scalar> RciState<T> {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ido: IDO_START,
            info: 0,
            ipntr: [0; IPNTR_LEN],
            workd: vec![T::zero(); 3 * n],
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Points the kernel's next request at `input` and `output` (0-based starts).
    pub fn request(&mut self, ido: i32, input: usize, output: usize) {
        self.ido = ido;
        self.ipntr[0] = (input + 1) as i32;
        self.ipntr[1] = (output + 1) as i32;
    }

    /// Marks termination with the given `info`.
    pub fn finish(&mut self, info: i32) {
        self.ido = IDO_DONE;
        self.info = info;
    }

    fn vector_range(&self, pointer: i32) -> Result<Range<usize>, EigsError> {
        let start = usize::try_from(pointer - 1).ok();
        match start {
            Some(start) if start + self.n <= self.workd.len() => Ok(start..start + self.n),
            _ => Err(EigsErrorKind::MalformedKernelOutput(format!(
                "workspace pointer {pointer} is outside the scratch buffer of length {}",
                self.workd.len()
            ))
            .into()),
        }
    }

    /// Decodes the raw codes left by the last kernel call.
    pub fn status(&self) -> Result<RciStatus, EigsError> {
        if self.info == INFO_MAX_ITERATIONS {
            return Ok(RciStatus::MaxIterExceeded);
        }
        if self.info != 0 {
            return Ok(RciStatus::KernelError {
                ido: self.ido,
                info: self.info,
            });
        }
        match self.ido {
            IDO_APPLY | IDO_APPLY_INITIAL | IDO_APPLY_MASS => {
                let input = self.vector_range(self.ipntr[0])?;
                let output = self.vector_range(self.ipntr[1])?;
                if input.start < output.end && output.start < input.end {
                    return Err(EigsErrorKind::MalformedKernelOutput(format!(
                        "input {input:?} and output {output:?} overlap"
                    ))
                    .into());
                }
                if self.ido == IDO_APPLY_MASS {
                    Ok(RciStatus::ApplyMass { input, output })
                } else {
                    Ok(RciStatus::Continue { input, output })
                }
            }
            IDO_DONE => Ok(RciStatus::Converged),
            ido => Ok(RciStatus::KernelError { ido, info: 0 }),
        }
    }

    /// Splits `workd` into the input and output views of a request.
    fn split(&mut self, input: Range<usize>, output: Range<usize>) -> (&[T], &mut [T]) {
        if input.start < output.start {
            let (head, tail) = self.workd.split_at_mut(output.start);
            (&head[input], &mut tail[..output.len()])
        } else {
            let (head, tail) = self.workd.split_at_mut(input.start);
            (&tail[..input.len()], &mut head[output])
        }
    }
}

/// Decoded state of the reverse-communication loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RciStatus {
    /// Apply the operator to `workd[input]`, write into `workd[output]`.
    Continue {
        input: Range<usize>,
        output: Range<usize>,
    },
    /// Apply the (identity) mass matrix.
    ApplyMass {
        input: Range<usize>,
        output: Range<usize>,
    },
    Converged,
    MaxIterExceeded,
    KernelError { ido: i32, info: i32 },
}

/// Which Ritz pairs the extraction step returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every converged Ritz pair, wanted ones first.
    AllConverged,
    /// Only the wanted Ritz pairs.
    Wanted,
}

/// Arguments of the extraction step.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<T> {
    pub vectors: bool,
    pub selection: Selection,
    /// Spectral shift; standard mode ignores it and the driver always passes zero.
    pub shift: T,
}

/// An iterative eigensolver driven through reverse communication.
pub trait ReverseCommKernel<T: Scalar> {
    /// Krylov subspace dimension the kernel works with.
    fn subspace_dimension(&self) -> usize;

    /// Advances the iteration until the operator is needed or the kernel terminates.
    fn step(&mut self, state: &mut RciState<T>);

    /// Produces the Ritz pairs after convergence. `Err` carries the kernel's info code.
    fn extract(
        &mut self,
        state: &mut RciState<T>,
        request: ExtractRequest<T>,
    ) -> Result<RawEigenOutput, i32>;

    /// Restart cycles performed so far.
    fn iterations(&self) -> usize;

    /// Wanted Ritz values that currently satisfy the tolerance.
    fn converged(&self) -> usize;
}

/// Runs `kernel` against `op` to convergence and extracts `nev` eigenpairs.
pub fn solve<T, K>(
    kernel: &mut K,
    op: &mut dyn Operator<T>,
    nev: usize,
    vectors: bool,
) -> Result<(RawEigenOutput, SolveStats), EigsError>
where
    T: Scalar,
    K: ReverseCommKernel<T> + ?Sized,
{
    let n = op.dim();
    let mut state = RciState::<T>::new(n);
    let mut applications = 0;

    loop {
        kernel.step(&mut state);
        match state.status()? {
            RciStatus::Continue { input, output } => {
                log::trace!(
                    "ido = {}: applying operator, x at {}, y at {}",
                    state.ido,
                    input.start,
                    output.start
                );
                let (x, y) = state.split(input, output);
                op.apply(x, y);
                applications += 1;
            }
            RciStatus::ApplyMass { input, output } => {
                let (x, y) = state.split(input, output);
                y.copy_from_slice(x);
            }
            RciStatus::Converged => break,
            RciStatus::MaxIterExceeded => {
                log::warn!(
                    "Arnoldi process stopped after {} iterations",
                    kernel.iterations()
                );
                return Err(EigsErrorKind::MaxIterationsExceeded {
                    iterations: kernel.iterations(),
                    converged: kernel.converged(),
                    requested: nev,
                }
                .into());
            }
            RciStatus::KernelError { ido, info } => {
                log::warn!("Arnoldi process failed: ido = {ido}, info = {info}");
                return Err(EigsErrorKind::IterationDivergence { ido, info }.into());
            }
        }
    }

    let stats = SolveStats {
        iterations: kernel.iterations(),
        operator_applications: applications,
        converged: kernel.converged(),
        subspace_dimension: kernel.subspace_dimension(),
    };
    log::debug!(
        "Arnoldi process converged: {} iterations, {} operator applications",
        stats.iterations,
        stats.operator_applications
    );

    let selection = if vectors {
        Selection::Wanted
    } else {
        Selection::AllConverged
    };
    let request = ExtractRequest {
        vectors,
        selection,
        shift: T::zero(),
    };
    let raw = kernel.extract(&mut state, request).map_err(|info| {
        log::warn!("extraction failed: info = {info}");
        EigsError::from(EigsErrorKind::ExtractionFailure(info))
    })?;
    Ok((raw, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FnOperator;

    #[test]
    fn test_subspace_dimension() {
        assert_eq!(subspace_dimension(100, 3), 20);
        assert_eq!(subspace_dimension(100, 15), 31);
        assert_eq!(subspace_dimension(12, 3), 12);
        assert_eq!(subspace_dimension(25, 12), 25);
    }

    #[test]
    fn test_status_decoding() {
        let mut state = RciState::<f64>::new(4);
        state.request(IDO_APPLY, 8, 0);
        assert_eq!(
            state.status().unwrap(),
            RciStatus::Continue {
                input: 8..12,
                output: 0..4
            }
        );

        state.finish(0);
        assert_eq!(state.status().unwrap(), RciStatus::Converged);

        state.finish(INFO_MAX_ITERATIONS);
        assert_eq!(state.status().unwrap(), RciStatus::MaxIterExceeded);

        state.finish(-3);
        assert_eq!(
            state.status().unwrap(),
            RciStatus::KernelError { ido: 99, info: -3 }
        );

        state.info = 0;
        state.ido = 7;
        assert_eq!(
            state.status().unwrap(),
            RciStatus::KernelError { ido: 7, info: 0 }
        );
    }

    #[test]
    fn test_bad_pointers_are_rejected() {
        let mut state = RciState::<f64>::new(4);
        state.request(IDO_APPLY, 10, 0);
        assert!(state.status().is_err());
        state.request(IDO_APPLY, 2, 4);
        assert!(state.status().is_err());
    }

    /// Applies the operator twice, then reports a bogus status.
    struct ScriptedKernel {
        calls: usize,
        final_info: i32,
    }

    impl ReverseCommKernel<f64> for ScriptedKernel {
        fn subspace_dimension(&self) -> usize {
            2
        }

        fn step(&mut self, state: &mut RciState<f64>) {
            self.calls += 1;
            match self.calls {
                1 => {
                    state.workd[..2].copy_from_slice(&[1.0, 2.0]);
                    state.request(IDO_APPLY_INITIAL, 0, 2);
                }
                2 => {
                    assert_eq!(&state.workd[2..4], &[2.0, 4.0]);
                    state.workd[4..6].copy_from_slice(&[3.0, 5.0]);
                    state.request(IDO_APPLY, 4, 0);
                }
                _ => {
                    assert_eq!(&state.workd[0..2], &[6.0, 10.0]);
                    state.finish(self.final_info);
                }
            }
        }

        fn extract(
            &mut self,
            _state: &mut RciState<f64>,
            request: ExtractRequest<f64>,
        ) -> Result<RawEigenOutput, i32> {
            assert!(!request.vectors);
            assert_eq!(request.selection, Selection::AllConverged);
            Ok(RawEigenOutput::RealPacked {
                re: vec![2.0],
                im: vec![0.0],
                vectors: None,
            })
        }

        fn iterations(&self) -> usize {
            1
        }

        fn converged(&self) -> usize {
            1
        }
    }

    fn doubling() -> FnOperator<impl FnMut(&[f64], &mut [f64])> {
        FnOperator::new(2, |x: &[f64], y: &mut [f64]| {
            y[0] = 2.0 * x[0];
            y[1] = 2.0 * x[1];
        })
    }

    #[test]
    fn test_driver_applies_operator_at_requested_offsets() {
        let mut kernel = ScriptedKernel {
            calls: 0,
            final_info: 0,
        };
        let mut op = doubling();
        let (raw, stats) = solve(&mut kernel, &mut op, 1, false).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(stats.operator_applications, 2);
    }

    #[test]
    fn test_driver_maps_kernel_failures() {
        let mut kernel = ScriptedKernel {
            calls: 0,
            final_info: INFO_MAX_ITERATIONS,
        };
        let err = solve(&mut kernel, &mut doubling(), 1, false).unwrap_err();
        assert!(matches!(
            err.kind(),
            EigsErrorKind::MaxIterationsExceeded { requested: 1, .. }
        ));

        let mut kernel = ScriptedKernel {
            calls: 0,
            final_info: -8,
        };
        let err = solve(&mut kernel, &mut doubling(), 1, false).unwrap_err();
        assert_eq!(
            err.kind(),
            &EigsErrorKind::IterationDivergence { ido: 99, info: -8 }
        );
    }
}
