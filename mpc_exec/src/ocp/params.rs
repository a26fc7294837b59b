//! Optimal control problem parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the tracking problem.
///
/// Bounds use `inf`/`-inf` for an unbounded side.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OcpParams {
    /// Number of control intervals in the prediction horizon
    #[serde(default = "default_num_steps")]
    pub num_steps: usize,

    /// Diagonal least squares weights on `[x, y, theta, speed, steer]`
    #[serde(default = "default_weights")]
    pub weights: [f64; 5],

    /// Additional weights on `[x, y, theta]` at the end of the horizon
    #[serde(default)]
    pub terminal_weights: Option<[f64; 3]>,

    /// Lower bounds on `[x_m, y_m, theta_rad]`
    #[serde(default = "default_state_min")]
    pub state_min: [f64; 3],

    /// Upper bounds on `[x_m, y_m, theta_rad]`
    #[serde(default = "default_state_max")]
    pub state_max: [f64; 3],

    /// Lower bounds on `[speed_ms, steer_rad]`
    #[serde(default = "default_control_min")]
    pub control_min: [f64; 2],

    /// Upper bounds on `[speed_ms, steer_rad]`
    #[serde(default = "default_control_max")]
    pub control_max: [f64; 2],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OcpParams {
    fn default() -> Self {
        Self {
            num_steps: default_num_steps(),
            weights: default_weights(),
            terminal_weights: None,
            state_min: default_state_min(),
            state_max: default_state_max(),
            control_min: default_control_min(),
            control_max: default_control_max(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_num_steps() -> usize {
    25
}

fn default_weights() -> [f64; 5] {
    [1.0, 1.0, 0.7, 1e-6, 1e-6]
}

fn default_state_min() -> [f64; 3] {
    [0.0, 0.0, -PI]
}

fn default_state_max() -> [f64; 3] {
    [200.0, 200.0, PI]
}

fn default_control_min() -> [f64; 2] {
    [-10.0, -PI / 3.0]
}

fn default_control_max() -> [f64; 2] {
    [10.0, PI / 3.0]
}
