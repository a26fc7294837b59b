//! Simulated vehicle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::model::{BicycleModel, Control, Integrator, ModelError, State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The plant driven by the controller in simulation.
#[derive(Debug, Clone)]
pub struct Process {
    model: BicycleModel,
    integrator: Integrator,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Process {
    pub fn new(model: BicycleModel, integrator: Integrator) -> Self {
        Self { model, integrator }
    }

    pub fn model(&self) -> &BicycleModel {
        &self.model
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Advance the vehicle by `dt_s` with the control held.
    pub fn step(&self, x: &State, u: &Control, dt_s: f64) -> Result<State, ModelError> {
        self.integrator.step(&self.model, x, u, dt_s)
    }
}
