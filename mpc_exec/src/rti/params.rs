//! Real-time iteration algorithm parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::model::IntegratorType;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the real-time iteration algorithm.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AlgorithmParams {
    /// Integration scheme used to discretise the dynamics between shooting
    /// nodes
    #[serde(default = "default_integrator")]
    pub integrator: IntegratorType,

    /// Number of integrator steps per shooting interval
    #[serde(default = "default_num_integrator_steps")]
    pub num_integrator_steps: usize,

    /// Levenberg-Marquardt regularisation added to the Gauss-Newton Hessian
    #[serde(default = "default_levenberg_marquardt")]
    pub levenberg_marquardt: f64,

    /// Tolerance on the KKT measure under which iterations stop early
    #[serde(default = "default_kkt_tolerance")]
    pub kkt_tolerance: f64,

    /// Maximum number of SQP iterations per sample. One iteration gives the
    /// real-time iteration scheme.
    #[serde(default = "default_max_sqp_iterations")]
    pub max_sqp_iterations: usize,

    /// What to do when the QP cannot be solved
    #[serde(default)]
    pub infeasible_qp_handling: InfeasibleQpHandling,

    /// Maximum number of interior point iterations of the QP solver
    #[serde(default = "default_qp_max_iter")]
    pub qp_max_iter: u32,

    /// Shift the previous solution by one interval to warm start the next
    /// sample
    #[serde(default = "default_hotstart")]
    pub hotstart: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfeasibleQpHandling {
    /// Return an error from the step
    Stop,

    /// Log a warning and keep the previous iterate
    Ignore,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for InfeasibleQpHandling {
    fn default() -> Self {
        InfeasibleQpHandling::Stop
    }
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            integrator: default_integrator(),
            num_integrator_steps: default_num_integrator_steps(),
            levenberg_marquardt: default_levenberg_marquardt(),
            kkt_tolerance: default_kkt_tolerance(),
            max_sqp_iterations: default_max_sqp_iterations(),
            infeasible_qp_handling: InfeasibleQpHandling::default(),
            qp_max_iter: default_qp_max_iter(),
            hotstart: default_hotstart(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_integrator() -> IntegratorType {
    IntegratorType::Rk4
}

fn default_num_integrator_steps() -> usize {
    1
}

fn default_levenberg_marquardt() -> f64 {
    1e-4
}

fn default_kkt_tolerance() -> f64 {
    1e-8
}

fn default_max_sqp_iterations() -> usize {
    1
}

fn default_qp_max_iter() -> u32 {
    200
}

fn default_hotstart() -> bool {
    true
}
