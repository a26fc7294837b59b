//! Validity checker parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing the free space the vehicle may occupy.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ValidityParams {
    /// Lower corner of the workspace, `[x_m, y_m]`
    #[serde(default = "default_bounds_min_m")]
    pub bounds_min_m: [f64; 2],

    /// Upper corner of the workspace, `[x_m, y_m]`
    #[serde(default = "default_bounds_max_m")]
    pub bounds_max_m: [f64; 2],

    /// Minimum distance the vehicle must keep from every obstacle
    #[serde(default)]
    pub min_clearance_m: f64,

    #[serde(default)]
    pub obstacles: Vec<CircleObstacle>,
}

/// A circular obstacle in the workspace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CircleObstacle {
    pub centre_m: [f64; 2],
    pub radius_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ValidityParams {
    fn default() -> Self {
        Self {
            bounds_min_m: default_bounds_min_m(),
            bounds_max_m: default_bounds_max_m(),
            min_clearance_m: 0.0,
            obstacles: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_bounds_min_m() -> [f64; 2] {
    [0.0, 0.0]
}

fn default_bounds_max_m() -> [f64; 2] {
    [200.0, 200.0]
}
