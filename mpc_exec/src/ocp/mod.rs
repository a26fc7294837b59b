//! # Optimal control problem module
//!
//! Defines the tracking problem solved at every sample:
//!
//! ```text
//! min  1/2 sum_k || h(x_k, u_k) - r_k ||^2_W  +  1/2 || x_N - r_N ||^2_(W_x + P)
//! s.t. x_{k+1} = F(x_k, u_k)
//!      x_min <= x_k <= x_max,   k = 1..N
//!      u_min <= u_k <= u_max,   k = 0..N-1
//! ```
//!
//! with `h = [x, y, theta, speed, steer]` and `r_k = [x_ref, y_ref,
//! theta_ref, 0, 0]`. The heading residual is taken on the circle, so a
//! reference of `pi` and a state of `-pi` have no error.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::model::{Control, State};
pub use params::OcpParams;
use util::maths::ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A validated tracking problem over a fixed sample period.
#[derive(Debug, Clone)]
pub struct Ocp {
    params: OcpParams,

    /// Length of one control interval
    dt_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OcpError {
    #[error("The horizon must contain at least one interval")]
    InvalidNumSteps,

    #[error("The sample period must be finite and positive, found {0}")]
    InvalidSamplePeriod(f64),

    #[error("Weight {index} must be finite and non-negative, found {value}")]
    InvalidWeight { index: usize, value: f64 },

    #[error("Bound {name}[{index}] is empty or invalid ({min} > {max})")]
    InvalidBound {
        name: &'static str,
        index: usize,
        min: f64,
        max: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Ocp {
    pub fn new(params: OcpParams, dt_s: f64) -> Result<Self, OcpError> {
        if params.num_steps == 0 {
            return Err(OcpError::InvalidNumSteps);
        }

        if !dt_s.is_finite() || dt_s <= 0.0 {
            return Err(OcpError::InvalidSamplePeriod(dt_s));
        }

        let terminal = params.terminal_weights.unwrap_or([0.0; 3]);
        for (index, &value) in params.weights.iter().chain(terminal.iter()).enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(OcpError::InvalidWeight { index, value });
            }
        }

        check_bounds("state", &params.state_min, &params.state_max)?;
        check_bounds("control", &params.control_min, &params.control_max)?;

        Ok(Self { params, dt_s })
    }

    pub fn params(&self) -> &OcpParams {
        &self.params
    }

    /// Number of control intervals in the horizon.
    pub fn num_steps(&self) -> usize {
        self.params.num_steps
    }

    pub fn sample_period(&self) -> f64 {
        self.dt_s
    }

    /// Length of the prediction horizon in seconds.
    pub fn horizon_s(&self) -> f64 {
        self.params.num_steps as f64 * self.dt_s
    }

    /// Weights on the state at node `k`.
    ///
    /// The last node carries the stage weights plus any terminal weights.
    pub fn state_weights(&self, k: usize) -> State {
        let w = &self.params.weights;
        let mut q = State::new(w[0], w[1], w[2]);

        if k == self.params.num_steps {
            if let Some(p) = self.params.terminal_weights {
                q += State::from(p);
            }
        }

        q
    }

    pub fn control_weights(&self) -> Control {
        Control::new(self.params.weights[3], self.params.weights[4])
    }

    pub fn state_bounds(&self) -> (State, State) {
        (
            State::from(self.params.state_min),
            State::from(self.params.state_max),
        )
    }

    pub fn control_bounds(&self) -> (Control, Control) {
        (
            Control::from(self.params.control_min),
            Control::from(self.params.control_max),
        )
    }

    /// Residual of a state against its reference, heading wrapped.
    pub fn state_residual(&self, x: &State, x_ref: &State) -> State {
        State::new(x[0] - x_ref[0], x[1] - x_ref[1], ang_dist(x[2], x_ref[2]))
    }

    /// Residual of a control. The control reference is zero.
    pub fn control_residual(&self, u: &Control) -> Control {
        *u
    }

    /// Value of the tracking objective along a trajectory.
    ///
    /// `states` and `reference` hold `N + 1` nodes and `controls` holds `N`.
    pub fn cost(&self, states: &[State], controls: &[Control], reference: &[State]) -> f64 {
        let r_u = self.control_weights();

        let state_cost: f64 = states
            .iter()
            .zip(reference)
            .enumerate()
            .map(|(k, (x, x_ref))| {
                let r = self.state_residual(x, x_ref);
                r.component_mul(&r).dot(&self.state_weights(k))
            })
            .sum();

        let control_cost: f64 = controls
            .iter()
            .map(|u| {
                let r = self.control_residual(u);
                r.component_mul(&r).dot(&r_u)
            })
            .sum();

        0.5 * (state_cost + control_cost)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_bounds(name: &'static str, min: &[f64], max: &[f64]) -> Result<(), OcpError> {
    for (index, (&lo, &hi)) in min.iter().zip(max).enumerate() {
        let empty = lo > hi || lo == std::f64::INFINITY || hi == -std::f64::INFINITY;

        if lo.is_nan() || hi.is_nan() || empty {
            return Err(OcpError::InvalidBound {
                name,
                index,
                min: lo,
                max: hi,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_defaults() {
        let params: OcpParams = util::params::from_str("").unwrap();
        let ocp = Ocp::new(params, 70.0 / 49.0).unwrap();

        assert_eq!(ocp.num_steps(), 25);
        assert!((ocp.horizon_s() - 25.0 * 70.0 / 49.0).abs() < 1e-12);
        assert_eq!(ocp.state_weights(0), State::new(1.0, 1.0, 0.7));
        assert_eq!(ocp.state_weights(25), State::new(1.0, 1.0, 0.7));
        assert_eq!(ocp.control_weights(), Control::new(1e-6, 1e-6));

        let (x_min, x_max) = ocp.state_bounds();
        assert_eq!(x_min, State::new(0.0, 0.0, -PI));
        assert_eq!(x_max, State::new(200.0, 200.0, PI));

        let (u_min, u_max) = ocp.control_bounds();
        assert_eq!(u_min, Control::new(-10.0, -PI / 3.0));
        assert_eq!(u_max, Control::new(10.0, PI / 3.0));
    }

    #[test]
    fn test_params_from_toml() {
        let params: OcpParams = util::params::from_str(
            "num_steps = 10\n\
             terminal_weights = [5.0, 5.0, 1.0]\n\
             state_min = [-inf, -inf, -inf]\n\
             state_max = [inf, inf, inf]\n",
        )
        .unwrap();
        let ocp = Ocp::new(params, 0.5).unwrap();

        assert_eq!(ocp.num_steps(), 10);
        assert_eq!(ocp.state_weights(9), State::new(1.0, 1.0, 0.7));
        assert_eq!(ocp.state_weights(10), State::new(6.0, 6.0, 1.7));
        assert!(ocp.state_bounds().1[0].is_infinite());
    }

    #[test]
    fn test_validation() {
        let mut params = OcpParams::default();
        params.num_steps = 0;
        assert_eq!(Ocp::new(params, 1.0).unwrap_err(), OcpError::InvalidNumSteps);

        assert_eq!(
            Ocp::new(OcpParams::default(), 0.0).unwrap_err(),
            OcpError::InvalidSamplePeriod(0.0)
        );

        let mut params = OcpParams::default();
        params.weights[2] = -0.7;
        assert_eq!(
            Ocp::new(params, 1.0).unwrap_err(),
            OcpError::InvalidWeight {
                index: 2,
                value: -0.7
            }
        );

        let mut params = OcpParams::default();
        params.control_min[1] = 2.0;
        assert!(matches!(
            Ocp::new(params, 1.0),
            Err(OcpError::InvalidBound {
                name: "control",
                index: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_heading_residual_wraps() {
        let ocp = Ocp::new(OcpParams::default(), 1.0).unwrap();

        let r = ocp.state_residual(
            &State::new(1.0, 2.0, PI - 0.1),
            &State::new(0.0, 0.0, -PI + 0.1),
        );
        assert!((r - State::new(1.0, 2.0, -0.2)).norm() < 1e-12);
    }

    #[test]
    fn test_cost() {
        let mut params = OcpParams::default();
        params.num_steps = 1;
        let ocp = Ocp::new(params, 1.0).unwrap();

        let states = vec![State::new(1.0, 0.0, 0.0), State::new(0.0, 2.0, 0.0)];
        let controls = vec![Control::new(1000.0, 0.0)];
        let reference = vec![State::zeros(), State::zeros()];

        // 0.5 * (1 + 4 + 1e-6 * 1e6)
        assert!((ocp.cost(&states, &controls, &reference) - 3.0).abs() < 1e-9);
    }
}
