//! # Real-time iteration module
//!
//! Solves the tracking problem with a multiple shooting, Gauss-Newton SQP
//! method. The optimisation variables of each QP are the deltas applied to
//! the current guess of the shooting nodes `s_k` and controls `q_k`:
//!
//! ```text
//! z = [dx_0, ..., dx_N, du_0, ..., du_{N-1}]
//! ```
//!
//! The constraints of the QP are
//!
//! - initial value embedding: `dx_0 = x0 - s_0`,
//! - continuity: `A_k dx_k + B_k du_k - dx_{k+1} = s_{k+1} - F(s_k, q_k)`,
//! - bounds on the states of nodes `1..N` and on every control.
//!
//! With `max_sqp_iterations = 1` a single full step is taken per sample,
//! after which the solution is shifted by one interval to initialise the
//! next sample.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod qp;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use crate::model::{
    BicycleModel, Control, Integrator, ModelError, State, NUM_CONTROLS, NUM_STATES,
};
use crate::ocp::Ocp;
pub use params::{AlgorithmParams, InfeasibleQpHandling};
use qp::Qp;
use util::maths::wrap_to_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Real-time iteration algorithm over a fixed tracking problem.
#[derive(Debug, Clone)]
pub struct RealTimeAlgorithm {
    model: BicycleModel,
    integrator: Integrator,
    ocp: Ocp,
    params: AlgorithmParams,

    /// Shooting node guesses, `N + 1` of them
    states: Vec<State>,

    /// Control guesses, `N` of them
    controls: Vec<Control>,

    initialised: bool,
}

/// Report on a single step of the algorithm.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RtiReport {
    /// Number of SQP iterations performed
    pub iterations: usize,

    /// KKT measure of the last QP, NaN if its step was rejected
    pub kkt: f64,

    /// True if the KKT measure fell below the tolerance
    pub converged: bool,

    /// False if the last QP failed and its step was ignored
    pub accepted: bool,

    /// Status reported by the QP solver for the last QP
    pub qp_status: String,

    /// Total number of interior point iterations
    pub qp_iterations: u32,

    /// Total QP solve time
    pub qp_solve_time_s: f64,

    /// Tracking objective at the new guess
    pub objective: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RtiError {
    #[error("Invalid algorithm parameters: {0}")]
    InvalidParams(&'static str),

    #[error("The model could not be evaluated: {0}")]
    ModelError(ModelError),

    #[error("The algorithm has not been initialised")]
    NotInitialised,

    #[error("Expected {expected} {name}, found {found}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Could not set up the QP solver: {0}")]
    QpSetup(String),

    #[error("The QP could not be solved (status {0})")]
    InfeasibleQp(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RealTimeAlgorithm {
    pub fn new(
        model: BicycleModel,
        ocp: Ocp,
        params: AlgorithmParams,
    ) -> Result<Self, RtiError> {
        if !params.levenberg_marquardt.is_finite() || params.levenberg_marquardt < 0.0 {
            return Err(RtiError::InvalidParams(
                "levenberg_marquardt must be finite and non-negative",
            ));
        }
        if params.max_sqp_iterations == 0 {
            return Err(RtiError::InvalidParams(
                "max_sqp_iterations must be at least 1",
            ));
        }
        if params.qp_max_iter == 0 {
            return Err(RtiError::InvalidParams("qp_max_iter must be at least 1"));
        }

        let integrator = Integrator::new(params.integrator, params.num_integrator_steps)
            .map_err(RtiError::ModelError)?;

        let n = ocp.num_steps();

        Ok(Self {
            model,
            integrator,
            ocp,
            params,
            states: vec![State::zeros(); n + 1],
            controls: vec![Control::zeros(); n],
            initialised: false,
        })
    }

    pub fn ocp(&self) -> &Ocp {
        &self.ocp
    }

    pub fn params(&self) -> &AlgorithmParams {
        &self.params
    }

    /// Set the initial guess of the shooting nodes and controls.
    pub fn initialise(&mut self, states: Vec<State>, controls: Vec<Control>) -> Result<(), RtiError> {
        let n = self.ocp.num_steps();
        check_len("states", n + 1, states.len())?;
        check_len("controls", n, controls.len())?;

        self.states = states.into_iter().map(wrap_heading).collect();
        self.controls = controls;
        self.initialised = true;

        Ok(())
    }

    /// Perform one sample of the algorithm from the measured state `x0`.
    ///
    /// `reference` holds the `N + 1` reference states across the horizon.
    pub fn step(&mut self, x0: &State, reference: &[State]) -> Result<RtiReport, RtiError> {
        if !self.initialised {
            return Err(RtiError::NotInitialised);
        }
        check_len("reference states", self.ocp.num_steps() + 1, reference.len())?;

        let x0 = wrap_heading(*x0);
        let mut report = RtiReport {
            accepted: true,
            ..Default::default()
        };

        for iter in 0..self.params.max_sqp_iterations {
            let qp = self.build_qp(&x0, reference)?;
            let sol = qp.solve(self.params.qp_max_iter)?;

            report.iterations = iter + 1;
            report.qp_status = format!("{:?}", sol.status);
            report.qp_iterations += sol.iterations;
            report.qp_solve_time_s += sol.solve_time_s;

            if !sol.is_solved() {
                match self.params.infeasible_qp_handling {
                    InfeasibleQpHandling::Stop => {
                        return Err(RtiError::InfeasibleQp(report.qp_status))
                    }
                    InfeasibleQpHandling::Ignore => {
                        warn!(
                            "QP not solved ({}), keeping the previous iterate",
                            report.qp_status
                        );
                        report.accepted = false;
                        report.kkt = std::f64::NAN;
                        break;
                    }
                }
            }

            self.apply_step(sol.z.as_slice());
            report.kkt = sol.kkt;

            trace!(
                "SQP iteration {}: KKT {:.3e}, QP objective {:.6e}, {} QP iterations",
                iter,
                sol.kkt,
                sol.objective,
                sol.iterations
            );

            if sol.kkt <= self.params.kkt_tolerance {
                report.converged = true;
                break;
            }
        }

        report.objective = self.ocp.cost(&self.states, &self.controls, reference);

        Ok(report)
    }

    /// Shift the solution one interval forward.
    ///
    /// The new last node is obtained by integrating the old last node with
    /// the last control, which is repeated.
    pub fn shift(&mut self) -> Result<(), RtiError> {
        if !self.initialised {
            return Err(RtiError::NotInitialised);
        }

        let n = self.ocp.num_steps();
        let last_u = self.controls[n - 1];
        let last_x = self.states[n];

        let new_x = self
            .integrator
            .step(&self.model, &last_x, &last_u, self.ocp.sample_period())
            .map_err(RtiError::ModelError)?;

        self.states.rotate_left(1);
        self.states[n] = wrap_heading(new_x);
        self.controls.rotate_left(1);
        self.controls[n - 1] = last_u;

        Ok(())
    }

    /// The first control of the current solution, the one applied to the
    /// vehicle.
    pub fn first_control(&self) -> Control {
        self.controls[0]
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Build the QP linearised about the current guess.
    fn build_qp(&self, x0: &State, reference: &[State]) -> Result<Qp, RtiError> {
        let n = self.ocp.num_steps();
        let mu = self.params.levenberg_marquardt;
        let dt = self.ocp.sample_period();
        let mut qp = Qp::new((n + 1) * NUM_STATES + n * NUM_CONTROLS);

        // ---- OBJECTIVE ----

        for k in 0..=n {
            let w = self.ocp.state_weights(k);
            let r = self.ocp.state_residual(&self.states[k], &reference[k]);

            for i in 0..NUM_STATES {
                let idx = x_idx(k, i);
                qp.add_hessian(idx, w[i] + mu);
                qp.add_gradient(idx, w[i] * r[i]);
            }
        }

        let w_u = self.ocp.control_weights();
        for k in 0..n {
            let r = self.ocp.control_residual(&self.controls[k]);

            for j in 0..NUM_CONTROLS {
                let idx = u_idx(n, k, j);
                qp.add_hessian(idx, w_u[j] + mu);
                qp.add_gradient(idx, w_u[j] * r[j]);
            }
        }

        // ---- INITIAL VALUE EMBEDDING ----

        let d0 = self.ocp.state_residual(x0, &self.states[0]);
        for i in 0..NUM_STATES {
            qp.add_equality(vec![(x_idx(0, i), 1.0)], d0[i]);
        }

        // ---- CONTINUITY ----

        for k in 0..n {
            let (x_end, a, b) = self
                .integrator
                .step_with_sensitivities(&self.model, &self.states[k], &self.controls[k], dt)
                .map_err(RtiError::ModelError)?;

            let defect = self.ocp.state_residual(&self.states[k + 1], &x_end);

            for i in 0..NUM_STATES {
                let mut coeffs = Vec::with_capacity(NUM_STATES + NUM_CONTROLS + 1);

                for j in 0..NUM_STATES {
                    if a[(i, j)] != 0.0 {
                        coeffs.push((x_idx(k, j), a[(i, j)]));
                    }
                }
                for j in 0..NUM_CONTROLS {
                    if b[(i, j)] != 0.0 {
                        coeffs.push((u_idx(n, k, j), b[(i, j)]));
                    }
                }
                coeffs.push((x_idx(k + 1, i), -1.0));

                qp.add_equality(coeffs, defect[i]);
            }
        }

        // ---- BOUNDS ----

        let (x_min, x_max) = self.ocp.state_bounds();
        for k in 1..=n {
            for i in 0..NUM_STATES {
                let idx = x_idx(k, i);
                qp.add_upper_bound(idx, x_max[i] - self.states[k][i]);
                qp.add_lower_bound(idx, x_min[i] - self.states[k][i]);
            }
        }

        let (u_min, u_max) = self.ocp.control_bounds();
        for k in 0..n {
            for j in 0..NUM_CONTROLS {
                let idx = u_idx(n, k, j);
                qp.add_upper_bound(idx, u_max[j] - self.controls[k][j]);
                qp.add_lower_bound(idx, u_min[j] - self.controls[k][j]);
            }
        }

        Ok(qp)
    }

    /// Apply a full step to the guess.
    fn apply_step(&mut self, z: &[f64]) {
        let n = self.ocp.num_steps();

        for (k, x) in self.states.iter_mut().enumerate() {
            for i in 0..NUM_STATES {
                x[i] += z[x_idx(k, i)];
            }
            *x = wrap_heading(*x);
        }

        for (k, u) in self.controls.iter_mut().enumerate() {
            for j in 0..NUM_CONTROLS {
                u[j] += z[u_idx(n, k, j)];
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Index of state `i` of node `k` in the QP variables.
fn x_idx(k: usize, i: usize) -> usize {
    k * NUM_STATES + i
}

/// Index of control `j` of interval `k` in the QP variables, for a horizon
/// of `n` intervals.
fn u_idx(n: usize, k: usize, j: usize) -> usize {
    (n + 1) * NUM_STATES + k * NUM_CONTROLS + j
}

fn wrap_heading(x: State) -> State {
    State::new(x[0], x[1], wrap_to_pi(x[2]))
}

fn check_len(name: &'static str, expected: usize, found: usize) -> Result<(), RtiError> {
    if expected != found {
        return Err(RtiError::LengthMismatch {
            name,
            expected,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ocp::OcpParams;

    const N: usize = 10;
    const DT: f64 = 1.0;
    const SPEED: f64 = 2.0;

    /// Reference driving along +x at constant speed, starting from `t0`.
    fn straight_reference(t0: f64) -> Vec<State> {
        (0..=N)
            .map(|k| State::new(10.0 + SPEED * (t0 + k as f64 * DT), 50.0, 0.0))
            .collect()
    }

    fn algorithm(params: AlgorithmParams, ocp_params: OcpParams) -> RealTimeAlgorithm {
        let ocp = Ocp::new(OcpParams { num_steps: N, ..ocp_params }, DT).unwrap();
        RealTimeAlgorithm::new(BicycleModel::default(), ocp, params).unwrap()
    }

    #[test]
    fn test_invalid_params() {
        let ocp = Ocp::new(OcpParams::default(), 1.0).unwrap();

        let params = AlgorithmParams {
            max_sqp_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            RealTimeAlgorithm::new(BicycleModel::default(), ocp.clone(), params),
            Err(RtiError::InvalidParams(_))
        ));

        let params = AlgorithmParams {
            num_integrator_steps: 0,
            ..Default::default()
        };
        assert!(matches!(
            RealTimeAlgorithm::new(BicycleModel::default(), ocp, params),
            Err(RtiError::ModelError(ModelError::InvalidNumSteps))
        ));
    }

    #[test]
    fn test_requires_initialisation() {
        let mut alg = algorithm(AlgorithmParams::default(), OcpParams::default());
        let reference = straight_reference(0.0);

        assert!(matches!(
            alg.step(&reference[0], &reference),
            Err(RtiError::NotInitialised)
        ));

        assert!(matches!(
            alg.initialise(vec![State::zeros(); N], vec![Control::zeros(); N]),
            Err(RtiError::LengthMismatch { expected: 11, found: 10, .. })
        ));

        alg.initialise(reference.clone(), vec![Control::zeros(); N])
            .unwrap();
        assert!(matches!(
            alg.step(&reference[0], &reference[..N]),
            Err(RtiError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_straight_line_step() {
        let mut alg = algorithm(AlgorithmParams::default(), OcpParams::default());
        let reference = straight_reference(0.0);
        alg.initialise(reference.clone(), vec![Control::zeros(); N])
            .unwrap();

        let report = alg.step(&reference[0], &reference).unwrap();

        assert_eq!(report.iterations, 1);
        assert!(report.accepted);
        assert!(report.qp_solve_time_s >= 0.0);

        // One Gauss-Newton step recovers the reference speed
        let u = alg.first_control();
        assert!((u[0] - SPEED).abs() < 1e-2, "speed {}", u[0]);
        assert!(u[1].abs() < 1e-3, "steer {}", u[1]);

        // Node 0 is embedded to the measured state
        assert!((alg.states()[0] - reference[0]).norm() < 1e-6);
    }

    #[test]
    fn test_sqp_iterations() {
        let reference = straight_reference(0.0);

        // A loose tolerance stops after the first iteration
        let mut alg = algorithm(
            AlgorithmParams {
                max_sqp_iterations: 3,
                kkt_tolerance: 1e6,
                ..Default::default()
            },
            OcpParams::default(),
        );
        alg.initialise(reference.clone(), vec![Control::zeros(); N])
            .unwrap();
        let report = alg.step(&reference[0], &reference).unwrap();
        assert_eq!(report.iterations, 1);
        assert!(report.converged);

        // A zero tolerance runs every iteration
        let mut alg = algorithm(
            AlgorithmParams {
                max_sqp_iterations: 3,
                kkt_tolerance: 0.0,
                ..Default::default()
            },
            OcpParams::default(),
        );
        alg.initialise(reference.clone(), vec![Control::zeros(); N])
            .unwrap();
        let report = alg.step(&reference[0], &reference).unwrap();
        assert_eq!(report.iterations, 3);
        assert!(report.objective < 1e-3);
    }

    #[test]
    fn test_infeasible_qp_handling() {
        // The vehicle may not move but node 1 must be beyond x = 20
        let ocp_params = OcpParams {
            state_min: [20.0, 0.0, -std::f64::consts::PI],
            control_min: [0.0, -1.0],
            control_max: [0.0, 1.0],
            ..Default::default()
        };
        let start = vec![State::new(10.0, 50.0, 0.0); N + 1];

        let mut alg = algorithm(AlgorithmParams::default(), ocp_params.clone());
        alg.initialise(start.clone(), vec![Control::zeros(); N])
            .unwrap();
        assert!(matches!(
            alg.step(&start[0], &start),
            Err(RtiError::InfeasibleQp(_))
        ));

        let mut alg = algorithm(
            AlgorithmParams {
                infeasible_qp_handling: InfeasibleQpHandling::Ignore,
                ..Default::default()
            },
            ocp_params,
        );
        alg.initialise(start.clone(), vec![Control::zeros(); N])
            .unwrap();
        let report = alg.step(&start[0], &start).unwrap();
        assert!(!report.accepted);
        assert!(report.kkt.is_nan());
        assert_eq!(alg.states(), &start[..]);
        assert_eq!(alg.first_control(), Control::zeros());
    }

    #[test]
    fn test_shift() {
        let mut alg = algorithm(AlgorithmParams::default(), OcpParams::default());
        let reference = straight_reference(0.0);
        alg.initialise(reference.clone(), vec![Control::zeros(); N])
            .unwrap();
        alg.step(&reference[0], &reference).unwrap();

        let states = alg.states().to_vec();
        let controls = alg.controls().to_vec();
        alg.shift().unwrap();

        assert_eq!(alg.states()[0], states[1]);
        assert_eq!(alg.states()[N - 1], states[N]);
        assert_eq!(alg.controls()[0], controls[1]);
        assert_eq!(alg.controls()[N - 1], controls[N - 1]);

        // The new last node continues along the line
        let last = alg.states()[N];
        assert!((last[0] - (states[N][0] + controls[N - 1][0] * DT)).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_weights_pull_last_node() {
        // The last reference node is 20 m further on than the speed limit
        // allows the vehicle to follow
        let mut reference = straight_reference(0.0);
        reference[N][0] += 20.0;

        let last_node_error = |terminal_weights: Option<[f64; 3]>| {
            let mut alg = algorithm(
                AlgorithmParams::default(),
                OcpParams {
                    terminal_weights,
                    ..Default::default()
                },
            );
            alg.initialise(straight_reference(0.0), vec![Control::zeros(); N])
                .unwrap();
            alg.step(&reference[0], &reference).unwrap();

            (alg.states()[N][0] - reference[N][0]).abs()
        };

        let plain = last_node_error(None);
        let weighted = last_node_error(Some([100.0, 100.0, 0.0]));

        assert!(plain > 3.0, "plain {}", plain);
        assert!(weighted < 1.0, "weighted {}", weighted);
    }
}
