//! Simulation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Internal
use crate::model::IntegratorType;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the closed loop simulation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SimParams {
    /// Time over which the reference path is driven
    #[serde(default = "default_t_total_s")]
    pub t_total_s: f64,

    /// Waypoint file describing the reference path, relative to the software
    /// root if not absolute
    #[serde(default = "default_reference_file")]
    pub reference_file: PathBuf,

    /// Directory the trajectory files are written to, relative to the
    /// software root if not absolute
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Name of the simulated states file within `output_dir`
    #[serde(default = "default_states_file")]
    pub states_file: String,

    /// Name of the applied controls file within `output_dir`
    #[serde(default = "default_controls_file")]
    pub controls_file: String,

    /// Integration scheme used for the simulated vehicle
    #[serde(default = "default_process_integrator")]
    pub process_integrator: IntegratorType,

    /// Number of integrator steps per sample for the simulated vehicle
    #[serde(default = "default_process_integrator_steps")]
    pub process_integrator_steps: usize,

    /// Check every waypoint of the reference with the validity checker
    /// before running
    #[serde(default)]
    pub check_reference_validity: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            t_total_s: default_t_total_s(),
            reference_file: default_reference_file(),
            output_dir: default_output_dir(),
            states_file: default_states_file(),
            controls_file: default_controls_file(),
            process_integrator: default_process_integrator(),
            process_integrator_steps: default_process_integrator_steps(),
            check_reference_validity: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_t_total_s() -> f64 {
    70.0
}

fn default_reference_file() -> PathBuf {
    PathBuf::from("data/simple_car_path_geometric.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_states_file() -> String {
    String::from("output_states.txt")
}

fn default_controls_file() -> String {
    String::from("output_controls.txt")
}

fn default_process_integrator() -> IntegratorType {
    IntegratorType::ExplicitEuler
}

fn default_process_integrator_steps() -> usize {
    1
}
