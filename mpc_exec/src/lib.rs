//! # MPC library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to
//! access items defined inside the MPC crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Controller - steps the real-time iteration algorithm against the reference trajectory
pub mod controller;

/// Vehicle model - kinematic bicycle dynamics and integrators
pub mod model;

/// Optimal control problem - tracking cost and constraint configuration
pub mod ocp;

/// Trajectory output - writes the simulated states and controls
pub mod output;

/// Executable parameters
pub mod params;

/// Reference - loading of the reference path and its time parameterisation
pub mod reference;

/// Real-time iteration - the Gauss-Newton multiple shooting algorithm
pub mod rti;

/// Simulation - closed loop simulation of the controller and vehicle
pub mod sim;

/// State validity - predicate used when planning reference paths
pub mod validity;
