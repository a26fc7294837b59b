//! # State validity module
//!
//! Provides the state validity predicate used by a sampling based planner
//! when building reference paths over SE(2). A state is valid when it lies
//! inside the workspace and keeps at least the minimum clearance from every
//! obstacle. The heading of the state does not affect validity.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use crate::model::State;
pub use params::{CircleObstacle, ValidityParams};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Most segments a motion is split into, whatever the resolution.
pub const MAX_MOTION_SEGMENTS: usize = 100_000;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A predicate deciding which states a planner may use.
pub trait StateValidityChecker {
    /// True if the state can be occupied by the vehicle.
    fn is_valid(&self, state: &State) -> bool;

    /// Distance from the state to the nearest obstacle boundary, negative
    /// inside an obstacle.
    fn clearance(&self, state: &State) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Validity checker over a rectangular workspace with circular obstacles.
#[derive(Debug, Clone)]
pub struct ValidityChecker {
    bounds_min_m: Vector2<f64>,
    bounds_max_m: Vector2<f64>,
    min_clearance_m: f64,
    obstacles: Vec<CircleObstacle>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidityError {
    #[error("The workspace bounds are empty")]
    EmptyWorkspace,

    #[error("Obstacle {0} has an invalid radius")]
    InvalidObstacle(usize),

    #[error("The minimum clearance must be finite and non-negative, found {0}")]
    InvalidClearance(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ValidityChecker {
    pub fn new(params: ValidityParams) -> Result<Self, ValidityError> {
        let bounds_min_m = Vector2::from(params.bounds_min_m);
        let bounds_max_m = Vector2::from(params.bounds_max_m);

        // Comparisons with NaN are false so NaN bounds are rejected too
        if !(bounds_min_m[0] < bounds_max_m[0] && bounds_min_m[1] < bounds_max_m[1]) {
            return Err(ValidityError::EmptyWorkspace);
        }

        if !params.min_clearance_m.is_finite() || params.min_clearance_m < 0.0 {
            return Err(ValidityError::InvalidClearance(params.min_clearance_m));
        }

        for (i, o) in params.obstacles.iter().enumerate() {
            if !o.radius_m.is_finite() || o.radius_m < 0.0 {
                return Err(ValidityError::InvalidObstacle(i));
            }
        }

        Ok(Self {
            bounds_min_m,
            bounds_max_m,
            min_clearance_m: params.min_clearance_m,
            obstacles: params.obstacles,
        })
    }

    /// True if the position lies inside the workspace, boundary included.
    pub fn in_bounds(&self, state: &State) -> bool {
        (0..2).all(|i| state[i] >= self.bounds_min_m[i] && state[i] <= self.bounds_max_m[i])
    }

    /// Check the straight line motion between two states, sampling it so that
    /// no two samples are more than `resolution_m` apart.
    ///
    /// A non-positive resolution only checks the end points. The motion is
    /// never split into more than [`MAX_MOTION_SEGMENTS`] segments.
    pub fn check_motion(&self, from: &State, to: &State, resolution_m: f64) -> bool {
        let dist = (to.xy() - from.xy()).norm();

        let num_segments = if resolution_m > 0.0 {
            (dist / resolution_m)
                .ceil()
                .max(1.0)
                .min(MAX_MOTION_SEGMENTS as f64) as usize
        } else {
            1
        };

        (0..=num_segments).all(|i| {
            let frac = i as f64 / num_segments as f64;
            self.is_valid(&from.lerp(to, frac))
        })
    }

    /// Indices of the invalid waypoints of a path.
    pub fn check_path(&self, waypoints: &[State]) -> Vec<usize> {
        waypoints
            .iter()
            .enumerate()
            .filter(|(_, w)| !self.is_valid(w))
            .map(|(i, _)| i)
            .collect()
    }
}

impl StateValidityChecker for ValidityChecker {
    fn is_valid(&self, state: &State) -> bool {
        self.in_bounds(state) && self.clearance(state) >= self.min_clearance_m
    }

    fn clearance(&self, state: &State) -> f64 {
        let p = state.xy();

        self.obstacles
            .iter()
            .map(|o| (p - Vector2::from(o.centre_m)).norm() - o.radius_m)
            .fold(std::f64::INFINITY, f64::min)
    }
}
