//! arpack-ng kernels through the ICB (ISO C binding) interface.
//!
//! Only the general drivers are bound: `dnaupd`/`dneupd` for real operators
//! and `znaupd`/`zneupd` for complex ones. Hermitian problems run through the
//! complex general driver; real symmetric problems have no ARPACK kernel here.
//!
//! ARPACK draws its own random start vector, so the seed of the problem
//! descriptor does not apply, and it always returns the converged Ritz pairs
//! in its own order regardless of [`Selection`](crate::rci::Selection).

use crate::{
    error::{EigsError, EigsErrorKind},
    problem::Which,
    rci::{ExtractRequest, RciState, ReverseCommKernel},
    reconstruct::RawEigenOutput,
};
use faer::c64;
use std::ffi::{CStr, c_char, c_int};

#[link(name = "arpack")]
unsafe extern "C" {
    fn dnaupd_c(
        ido: *mut c_int,
        bmat: *const c_char,
        n: c_int,
        which: *const c_char,
        nev: c_int,
        tol: f64,
        resid: *mut f64,
        ncv: c_int,
        v: *mut f64,
        ldv: c_int,
        iparam: *mut c_int,
        ipntr: *mut c_int,
        workd: *mut f64,
        workl: *mut f64,
        lworkl: c_int,
        info: *mut c_int,
    );

    fn dneupd_c(
        rvec: c_int,
        howmny: *const c_char,
        select: *const c_int,
        dr: *mut f64,
        di: *mut f64,
        z: *mut f64,
        ldz: c_int,
        sigmar: f64,
        sigmai: f64,
        workev: *mut f64,
        bmat: *const c_char,
        n: c_int,
        which: *const c_char,
        nev: c_int,
        tol: f64,
        resid: *mut f64,
        ncv: c_int,
        v: *mut f64,
        ldv: c_int,
        iparam: *mut c_int,
        ipntr: *mut c_int,
        workd: *mut f64,
        workl: *mut f64,
        lworkl: c_int,
        info: *mut c_int,
    );

    fn znaupd_c(
        ido: *mut c_int,
        bmat: *const c_char,
        n: c_int,
        which: *const c_char,
        nev: c_int,
        tol: f64,
        resid: *mut c64,
        ncv: c_int,
        v: *mut c64,
        ldv: c_int,
        iparam: *mut c_int,
        ipntr: *mut c_int,
        workd: *mut c64,
        workl: *mut c64,
        lworkl: c_int,
        rwork: *mut f64,
        info: *mut c_int,
    );

    fn zneupd_c(
        rvec: c_int,
        howmny: *const c_char,
        select: *const c_int,
        d: *mut c64,
        z: *mut c64,
        ldz: c_int,
        sigma: c64,
        workev: *mut c64,
        bmat: *const c_char,
        n: c_int,
        which: *const c_char,
        nev: c_int,
        tol: f64,
        resid: *mut c64,
        ncv: c_int,
        v: *mut c64,
        ldv: c_int,
        iparam: *mut c_int,
        ipntr: *mut c_int,
        workd: *mut c64,
        workl: *mut c64,
        lworkl: c_int,
        rwork: *mut f64,
        info: *mut c_int,
    );
}

const STANDARD: &CStr = c"I";
const ALL_RITZ_VECTORS: &CStr = c"A";

fn which_cstr(which: Which) -> &'static CStr {
    match which {
        Which::LargestMagnitude => c"LM",
        Which::SmallestMagnitude => c"SM",
        Which::LargestReal => c"LR",
        Which::SmallestReal => c"SR",
        Which::LargestImaginary => c"LI",
        Which::SmallestImaginary => c"SI",
        Which::LargestAlgebraic => c"LA",
        Which::SmallestAlgebraic => c"SA",
        Which::BothEnds => c"BE",
    }
}

fn to_c_int(value: usize, what: &str) -> Result<c_int, EigsError> {
    c_int::try_from(value).map_err(|_| {
        EigsErrorKind::InvalidInput(format!("{what} = {value} does not fit ARPACK's integer type"))
            .into()
    })
}

/// Sizes and options shared by both drivers.
#[derive(Debug, Clone, Copy)]
struct Dimensions {
    n: c_int,
    nev: c_int,
    ncv: c_int,
    lworkl: c_int,
    which: &'static CStr,
    tol: f64,
}

impl Dimensions {
    fn new(
        n: usize,
        nev: usize,
        ncv: usize,
        which: Which,
        tol: f64,
    ) -> Result<Self, EigsError> {
        Ok(Self {
            n: to_c_int(n, "n")?,
            nev: to_c_int(nev, "nev")?,
            ncv: to_c_int(ncv, "ncv")?,
            lworkl: to_c_int(3 * ncv * (ncv + 2), "lworkl")?,
            which: which_cstr(which),
            tol,
        })
    }
}

fn iparam(max_iterations: usize) -> Result<[c_int; 11], EigsError> {
    let mut iparam = [0; 11];
    // exact shifts, iteration cap, block size 1, mode 1 (standard problem)
    iparam[0] = 1;
    iparam[2] = to_c_int(max_iterations, "max_iterations")?;
    iparam[3] = 1;
    iparam[6] = 1;
    Ok(iparam)
}

/// `dnaupd`/`dneupd` for real non-symmetric operators.
pub struct ArpackReal {
    dims: Dimensions,
    resid: Vec<f64>,
    v: Vec<f64>,
    iparam: [c_int; 11],
    workl: Vec<f64>,
}

impl ArpackReal {
    pub fn new(
        n: usize,
        nev: usize,
        ncv: usize,
        which: Which,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Self, EigsError> {
        let dims = Dimensions::new(n, nev, ncv, which, tolerance)?;
        Ok(Self {
            dims,
            resid: vec![0.0; n],
            v: vec![0.0; n * ncv],
            iparam: iparam(max_iterations)?,
            workl: vec![0.0; 3 * ncv * (ncv + 2)],
        })
    }
}

impl ReverseCommKernel<f64> for ArpackReal {
    fn subspace_dimension(&self) -> usize {
        self.dims.ncv as usize
    }

    fn step(&mut self, state: &mut RciState<f64>) {
        let d = self.dims;
        // SAFETY: every buffer has the length ARPACK documents for these sizes.
        unsafe {
            dnaupd_c(
                &mut state.ido,
                STANDARD.as_ptr(),
                d.n,
                d.which.as_ptr(),
                d.nev,
                d.tol,
                self.resid.as_mut_ptr(),
                d.ncv,
                self.v.as_mut_ptr(),
                d.n,
                self.iparam.as_mut_ptr(),
                state.ipntr.as_mut_ptr(),
                state.workd.as_mut_ptr(),
                self.workl.as_mut_ptr(),
                d.lworkl,
                &mut state.info,
            );
        }
    }

    fn extract(
        &mut self,
        state: &mut RciState<f64>,
        request: ExtractRequest<f64>,
    ) -> Result<RawEigenOutput, i32> {
        let d = self.dims;
        let (n, nev, ncv) = (d.n as usize, d.nev as usize, d.ncv as usize);
        let select = vec![0 as c_int; ncv];
        let mut dr = vec![0.0; nev + 1];
        let mut di = vec![0.0; nev + 1];
        let mut z = vec![0.0; n * (nev + 1)];
        let mut workev = vec![0.0; 3 * ncv];
        let mut info = 0;
        // SAFETY: as in `step`; `dr`, `di` and `z` hold `nev + 1` Ritz pairs.
        unsafe {
            dneupd_c(
                c_int::from(request.vectors),
                // request.selection is not forwarded: howmny 'A' returns every
                // converged Ritz vector and the reconstructor keeps the first k.
                ALL_RITZ_VECTORS.as_ptr(),
                select.as_ptr(),
                dr.as_mut_ptr(),
                di.as_mut_ptr(),
                z.as_mut_ptr(),
                d.n,
                request.shift,
                0.0,
                workev.as_mut_ptr(),
                STANDARD.as_ptr(),
                d.n,
                d.which.as_ptr(),
                d.nev,
                d.tol,
                self.resid.as_mut_ptr(),
                d.ncv,
                self.v.as_mut_ptr(),
                d.n,
                self.iparam.as_mut_ptr(),
                state.ipntr.as_mut_ptr(),
                state.workd.as_mut_ptr(),
                self.workl.as_mut_ptr(),
                d.lworkl,
                &mut info,
            );
        }
        if info != 0 {
            return Err(info);
        }

        let count = (self.iparam[4].max(0) as usize).min(nev + 1);
        dr.truncate(count);
        di.truncate(count);
        z.truncate(n * count);
        Ok(RawEigenOutput::RealPacked {
            re: dr,
            im: di,
            vectors: request.vectors.then_some(z),
        })
    }

    fn iterations(&self) -> usize {
        self.iparam[2].max(0) as usize
    }

    fn converged(&self) -> usize {
        self.iparam[4].max(0) as usize
    }
}

/// `znaupd`/`zneupd` for complex operators.
pub struct ArpackComplex {
    dims: Dimensions,
    resid: Vec<c64>,
    v: Vec<c64>,
    iparam: [c_int; 11],
    workl: Vec<c64>,
    rwork: Vec<f64>,
}

impl ArpackComplex {
    pub fn new(
        n: usize,
        nev: usize,
        ncv: usize,
        which: Which,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Self, EigsError> {
        let dims = Dimensions::new(n, nev, ncv, which, tolerance)?;
        let zero = c64::new(0.0, 0.0);
        Ok(Self {
            dims,
            resid: vec![zero; n],
            v: vec![zero; n * ncv],
            iparam: iparam(max_iterations)?,
            workl: vec![zero; 3 * ncv * (ncv + 2)],
            rwork: vec![0.0; ncv],
        })
    }
}

impl ReverseCommKernel<c64> for ArpackComplex {
    fn subspace_dimension(&self) -> usize {
        self.dims.ncv as usize
    }

    fn step(&mut self, state: &mut RciState<c64>) {
        let d = self.dims;
        // SAFETY: every buffer has the length ARPACK documents for these sizes.
        unsafe {
            znaupd_c(
                &mut state.ido,
                STANDARD.as_ptr(),
                d.n,
                d.which.as_ptr(),
                d.nev,
                d.tol,
                self.resid.as_mut_ptr(),
                d.ncv,
                self.v.as_mut_ptr(),
                d.n,
                self.iparam.as_mut_ptr(),
                state.ipntr.as_mut_ptr(),
                state.workd.as_mut_ptr(),
                self.workl.as_mut_ptr(),
                d.lworkl,
                self.rwork.as_mut_ptr(),
                &mut state.info,
            );
        }
    }

    fn extract(
        &mut self,
        state: &mut RciState<c64>,
        request: ExtractRequest<c64>,
    ) -> Result<RawEigenOutput, i32> {
        let d = self.dims;
        let (n, nev, ncv) = (d.n as usize, d.nev as usize, d.ncv as usize);
        let zero = c64::new(0.0, 0.0);
        let select = vec![0 as c_int; ncv];
        let mut values = vec![zero; nev + 1];
        let mut z = vec![zero; n * (nev + 1)];
        let mut workev = vec![zero; 3 * ncv];
        let mut info = 0;
        // SAFETY: as in `step`.
        unsafe {
            zneupd_c(
                c_int::from(request.vectors),
                // request.selection is not forwarded: howmny 'A' returns every
                // converged Ritz vector and the reconstructor keeps the first k.
                ALL_RITZ_VECTORS.as_ptr(),
                select.as_ptr(),
                values.as_mut_ptr(),
                z.as_mut_ptr(),
                d.n,
                request.shift,
                workev.as_mut_ptr(),
                STANDARD.as_ptr(),
                d.n,
                d.which.as_ptr(),
                d.nev,
                d.tol,
                self.resid.as_mut_ptr(),
                d.ncv,
                self.v.as_mut_ptr(),
                d.n,
                self.iparam.as_mut_ptr(),
                state.ipntr.as_mut_ptr(),
                state.workd.as_mut_ptr(),
                self.workl.as_mut_ptr(),
                d.lworkl,
                self.rwork.as_mut_ptr(),
                &mut info,
            );
        }
        if info != 0 {
            return Err(info);
        }

        let count = (self.iparam[4].max(0) as usize).min(nev);
        values.truncate(count);
        z.truncate(n * count);
        Ok(RawEigenOutput::Complex {
            values,
            vectors: request.vectors.then_some(z),
        })
    }

    fn iterations(&self) -> usize {
        self.iparam[2].max(0) as usize
    }

    fn converged(&self) -> usize {
        self.iparam[4].max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{operator::FnOperator, rci, reconstruct::reconstruct};

    #[test]
    fn test_real_arpack_diagonal() {
        let n = 50;
        let mut op = FnOperator::new(n, |x: &[f64], y: &mut [f64]| {
            for (i, (yi, xi)) in y.iter_mut().zip(x).enumerate() {
                *yi = (i + 1) as f64 * xi;
            }
        });
        let mut kernel =
            ArpackReal::new(n, 2, rci::subspace_dimension(n, 2), Which::LargestMagnitude, 0.0, 500)
                .unwrap();
        let (raw, _) = rci::solve(&mut kernel, &mut op, 2, false).unwrap();
        let (values, _) = reconstruct(raw, n, 2, false).unwrap();
        let mut re: Vec<f64> = values.iter().map(|v| v.re).collect();
        re.sort_by(|a, b| b.total_cmp(a));
        assert!((re[0] - 50.0).abs() < 1e-8);
        assert!((re[1] - 49.0).abs() < 1e-8);
    }
}
