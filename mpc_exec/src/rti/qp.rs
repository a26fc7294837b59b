//! Sparse quadratic program assembly and solution
//!
//! Problems are assembled as
//!
//! ```text
//! min  1/2 z' P z + q' z
//! s.t. A_eq z  = b_eq
//!      A_in z <= b_in
//! ```
//!
//! with a diagonal `P`, then handed to Clarabel. Equalities are placed in a
//! zero cone and inequalities in a nonnegative cone (`A z + s = b, s >= 0`).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use log::trace;
use nalgebra::{DMatrix, DVector};

// Internal
use super::RtiError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A QP under construction.
#[derive(Debug, Clone)]
pub struct Qp {
    hessian_diag: DVector<f64>,
    gradient: DVector<f64>,
    equalities: Vec<Row>,
    inequalities: Vec<Row>,
}

/// The solution of a QP.
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub status: SolverStatus,

    /// Primal solution
    pub z: DVector<f64>,

    /// Complementarity plus first order optimality measure, `|q'z| +
    /// sum |lambda_i s_i|`.
    pub kkt: f64,

    pub objective: f64,

    pub solve_time_s: f64,

    pub iterations: u32,
}

/// A sparse constraint row.
#[derive(Debug, Clone)]
struct Row {
    coeffs: Vec<(usize, f64)>,
    rhs: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Qp {
    /// Create an empty problem in `num_vars` variables.
    pub fn new(num_vars: usize) -> Self {
        Self {
            hessian_diag: DVector::zeros(num_vars),
            gradient: DVector::zeros(num_vars),
            equalities: Vec::new(),
            inequalities: Vec::new(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.gradient.len()
    }

    pub fn num_equalities(&self) -> usize {
        self.equalities.len()
    }

    pub fn num_inequalities(&self) -> usize {
        self.inequalities.len()
    }

    /// Add `value` to the Hessian diagonal at `i`.
    pub fn add_hessian(&mut self, i: usize, value: f64) {
        self.hessian_diag[i] += value;
    }

    /// Add `value` to the linear term at `i`.
    pub fn add_gradient(&mut self, i: usize, value: f64) {
        self.gradient[i] += value;
    }

    /// Add the constraint `sum coeff_j z_j = rhs`.
    pub fn add_equality(&mut self, coeffs: Vec<(usize, f64)>, rhs: f64) {
        self.equalities.push(Row { coeffs, rhs });
    }

    /// Add the constraint `z_i <= upper`. Infinite bounds are skipped.
    pub fn add_upper_bound(&mut self, i: usize, upper: f64) {
        if upper.is_finite() {
            self.inequalities.push(Row {
                coeffs: vec![(i, 1.0)],
                rhs: upper,
            });
        }
    }

    /// Add the constraint `z_i >= lower`. Infinite bounds are skipped.
    pub fn add_lower_bound(&mut self, i: usize, lower: f64) {
        if lower.is_finite() {
            self.inequalities.push(Row {
                coeffs: vec![(i, -1.0)],
                rhs: -lower,
            });
        }
    }

    /// Solve the problem with Clarabel.
    pub fn solve(&self, max_iter: u32) -> Result<QpSolution, RtiError> {
        let n = self.num_vars();
        let num_eq = self.equalities.len();
        let num_in = self.inequalities.len();

        let p = self.hessian_csc();
        let a = self.constraints_csc();

        let b: Vec<f64> = self
            .equalities
            .iter()
            .chain(self.inequalities.iter())
            .map(|r| r.rhs)
            .collect();
        let q: Vec<f64> = self.gradient.iter().copied().collect();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if num_eq > 0 {
            cones.push(ZeroConeT(num_eq));
        }
        if num_in > 0 {
            cones.push(NonnegativeConeT(num_in));
        }

        let settings: DefaultSettings<f64> = DefaultSettingsBuilder::default()
            .max_iter(max_iter)
            .verbose(false)
            .build()
            .map_err(|e| RtiError::QpSetup(e.to_string()))?;

        trace!(
            "Solving QP with {} variables, {} equalities and {} inequalities",
            n,
            num_eq,
            num_in
        );

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
            .map_err(|e| RtiError::QpSetup(format!("{:?}", e)))?;
        solver.solve();

        let sol = &solver.solution;
        let z = DVector::from_column_slice(&sol.x);

        let complementarity: f64 = sol
            .z
            .iter()
            .zip(sol.s.iter())
            .map(|(l, s)| (l * s).abs())
            .sum();

        Ok(QpSolution {
            status: sol.status,
            kkt: self.gradient.dot(&z).abs() + complementarity,
            z,
            objective: sol.obj_val,
            solve_time_s: sol.solve_time,
            iterations: sol.iterations,
        })
    }

    /// Upper triangle of the (diagonal) Hessian in CSC form.
    fn hessian_csc(&self) -> CscMatrix<f64> {
        let n = self.num_vars();
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::with_capacity(n);
        let mut nzval = Vec::with_capacity(n);

        colptr.push(0);
        for (i, &v) in self.hessian_diag.iter().enumerate() {
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
            colptr.push(rowval.len());
        }

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// Stacked equality then inequality rows in CSC form.
    fn constraints_csc(&self) -> CscMatrix<f64> {
        let n = self.num_vars();
        let rows: Vec<&Row> = self
            .equalities
            .iter()
            .chain(self.inequalities.iter())
            .collect();

        let mut dense = DMatrix::<f64>::zeros(rows.len(), n);
        for (r, row) in rows.iter().enumerate() {
            for &(c, v) in row.coeffs.iter() {
                dense[(r, c)] += v;
            }
        }

        dmatrix_to_csc(&dense)
    }
}

impl QpSolution {
    /// True if the solver reached (or nearly reached) optimality.
    pub fn is_solved(&self) -> bool {
        matches!(
            self.status,
            SolverStatus::Solved | SolverStatus::AlmostSolved
        )
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}
