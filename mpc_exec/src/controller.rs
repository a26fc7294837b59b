//! # Controller
//!
//! Combines the real-time iteration algorithm with a static reference
//! trajectory. At each sample the reference across the prediction horizon is
//! extracted and the algorithm is stepped from the measured state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use crate::model::{Control, State};
use crate::reference::ReferenceTrajectory;
use crate::rti::{RealTimeAlgorithm, RtiError, RtiReport};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Controller {
    algorithm: RealTimeAlgorithm,
    reference: ReferenceTrajectory,

    /// Report of the most recent step
    last_report: Option<RtiReport>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("The controller has not been initialised")]
    NotInitialised,

    #[error("Algorithm error at t = {0:.3} s: {1}")]
    AlgorithmError(f64, RtiError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Controller {
    pub fn new(algorithm: RealTimeAlgorithm, reference: ReferenceTrajectory) -> Self {
        Self {
            algorithm,
            reference,
            last_report: None,
        }
    }

    /// Sample period of the controller, the interval length of the problem.
    pub fn sample_period(&self) -> f64 {
        self.algorithm.ocp().sample_period()
    }

    pub fn reference(&self) -> &ReferenceTrajectory {
        &self.reference
    }

    pub fn algorithm(&self) -> &RealTimeAlgorithm {
        &self.algorithm
    }

    pub fn last_report(&self) -> Option<&RtiReport> {
        self.last_report.as_ref()
    }

    /// Initialise the controller at time `t0_s` from the state `x0`.
    ///
    /// The shooting nodes start on the reference, with the first node on
    /// `x0`, and all controls start at zero.
    pub fn init(&mut self, t0_s: f64, x0: &State) -> Result<(), ControllerError> {
        let n = self.algorithm.ocp().num_steps();

        let mut states = self.reference.horizon(t0_s, self.sample_period(), n);
        states[0] = *x0;

        self.algorithm
            .initialise(states, vec![Control::zeros(); n])
            .map_err(|e| ControllerError::AlgorithmError(t0_s, e))?;
        self.last_report = None;

        debug!("Controller initialised at t = {:.3} s from {:?}", t0_s, x0.as_slice());

        Ok(())
    }

    /// Compute the control to apply at time `t_s` from the measured state.
    pub fn step(&mut self, t_s: f64, x: &State) -> Result<Control, ControllerError> {
        let n = self.algorithm.ocp().num_steps();
        let reference = self.reference.horizon(t_s, self.sample_period(), n);

        let report = self
            .algorithm
            .step(x, &reference)
            .map_err(|e| match e {
                RtiError::NotInitialised => ControllerError::NotInitialised,
                e => ControllerError::AlgorithmError(t_s, e),
            })?;

        let u = self.algorithm.first_control();

        if self.algorithm.params().hotstart {
            self.algorithm
                .shift()
                .map_err(|e| ControllerError::AlgorithmError(t_s, e))?;
        }

        self.last_report = Some(report);

        Ok(u)
    }
}
