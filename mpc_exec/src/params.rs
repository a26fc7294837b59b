//! # MPC Executable Parameters
//!
//! This module provides the parameters of the simulation executable, one
//! TOML table per module.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    model::ModelParams, ocp::OcpParams, rti::AlgorithmParams, sim::SimParams,
    validity::ValidityParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MpcSimParams {
    /// Vehicle model parameters
    #[serde(default)]
    pub model: ModelParams,

    /// Tracking problem parameters
    #[serde(default)]
    pub ocp: OcpParams,

    /// Real-time iteration parameters
    #[serde(default)]
    pub algorithm: AlgorithmParams,

    /// Simulation parameters
    #[serde(default)]
    pub sim: SimParams,

    /// Validity checker parameters
    #[serde(default)]
    pub validity: ValidityParams,
}
