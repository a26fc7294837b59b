//! # Vehicle model module
//!
//! The vehicle is modelled as a kinematic bicycle. The state is the position
//! of the rear axle centre in the world frame and the heading of the vehicle:
//!
//! ```text
//! x = [x_m, y_m, theta_rad]
//! ```
//!
//! and the control is the forward speed and front wheel steering angle:
//!
//! ```text
//! u = [speed_ms, steer_rad]
//! ```
//!
//! The continuous dynamics are
//!
//! ```text
//! dx/dt     = v cos(theta)
//! dy/dt     = v sin(theta)
//! dtheta/dt = v tan(delta) / L
//! ```
//!
//! where `L` is the wheelbase of the vehicle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod integrator;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix3, Matrix3x2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// Internal
pub use integrator::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of elements in the state vector
pub const NUM_STATES: usize = 3;

/// Number of elements in the control vector
pub const NUM_CONTROLS: usize = 2;

/// Default wheelbase of the vehicle.
pub const DEFAULT_WHEELBASE_M: f64 = 10.0;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Vehicle state, `[x_m, y_m, theta_rad]`.
pub type State = Vector3<f64>;

/// Vehicle control, `[speed_ms, steer_rad]`.
pub type Control = Vector2<f64>;

/// Jacobian of the dynamics with respect to the state.
pub type StateJacobian = Matrix3<f64>;

/// Jacobian of the dynamics with respect to the control.
pub type ControlJacobian = Matrix3x2<f64>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the vehicle model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelParams {
    /// Distance between the front and rear axles
    #[serde(default = "default_wheelbase_m")]
    pub wheelbase_m: f64,
}

/// Kinematic bicycle model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BicycleModel {
    wheelbase_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ModelError {
    #[error("The wheelbase must be finite and greater than zero, found {0}")]
    InvalidWheelbase(f64),

    #[error("The integrator must take at least one step per interval")]
    InvalidNumSteps,

    #[error("The integration interval must be finite and non-negative, found {0}")]
    InvalidInterval(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            wheelbase_m: DEFAULT_WHEELBASE_M,
        }
    }
}

impl Default for BicycleModel {
    fn default() -> Self {
        Self {
            wheelbase_m: DEFAULT_WHEELBASE_M,
        }
    }
}

impl BicycleModel {
    /// Create a new model with the given wheelbase.
    pub fn new(wheelbase_m: f64) -> Result<Self, ModelError> {
        if !wheelbase_m.is_finite() || wheelbase_m <= 0.0 {
            return Err(ModelError::InvalidWheelbase(wheelbase_m));
        }

        Ok(Self { wheelbase_m })
    }

    /// Create a new model from the parameters.
    pub fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        Self::new(params.wheelbase_m)
    }

    pub fn wheelbase_m(&self) -> f64 {
        self.wheelbase_m
    }

    /// Time derivative of the state.
    pub fn derivative(&self, x: &State, u: &Control) -> State {
        let (sin_t, cos_t) = x[2].sin_cos();

        State::new(
            u[0] * cos_t,
            u[0] * sin_t,
            u[0] * u[1].tan() / self.wheelbase_m,
        )
    }

    /// Continuous time Jacobians of the dynamics, `(df/dx, df/du)`.
    pub fn jacobians(&self, x: &State, u: &Control) -> (StateJacobian, ControlJacobian) {
        let (sin_t, cos_t) = x[2].sin_cos();
        let cos_d = u[1].cos();

        #[rustfmt::skip]
        let a = StateJacobian::new(
            0.0, 0.0, -u[0] * sin_t,
            0.0, 0.0,  u[0] * cos_t,
            0.0, 0.0,  0.0,
        );

        #[rustfmt::skip]
        let b = ControlJacobian::new(
            cos_t,                          0.0,
            sin_t,                          0.0,
            u[1].tan() / self.wheelbase_m,  u[0] / (self.wheelbase_m * cos_d * cos_d),
        );

        (a, b)
    }

    /// Turning radius for a given steering angle, infinite when driving
    /// straight.
    pub fn turn_radius_m(&self, steer_rad: f64) -> f64 {
        let t = steer_rad.tan();

        if t == 0.0 {
            std::f64::INFINITY
        } else {
            self.wheelbase_m / t
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_wheelbase_m() -> f64 {
    DEFAULT_WHEELBASE_M
}
