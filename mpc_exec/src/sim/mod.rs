//! # Simulation module
//!
//! Closes the loop between the controller and a simulated vehicle. The
//! environment steps from the start time to the end time with the
//! controller's sample period, recording the state of the vehicle at every
//! sample and the control applied over every interval.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod process;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::Serialize;

// Internal
use crate::controller::{Controller, ControllerError};
use crate::model::{Control, ModelError, State};
pub use params::SimParams;
pub use process::Process;
use util::archive::{ArchiveError, Archived, Archiver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct SimulationEnvironment {
    t_start_s: f64,
    t_end_s: f64,

    process: Process,
    controller: Controller,

    /// Initial state, set by `init`
    x0: Option<State>,

    process_states: Vec<State>,
    feedback_controls: Vec<Control>,

    /// Record of the latest sample, written to the archive
    record: Option<SimRecord>,

    arch: Option<Archiver>,
}

/// Data recorded at each sample of the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimRecord {
    pub time_s: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub theta_rad: f64,
    pub speed_ms: f64,
    pub steer_rad: f64,
    pub ref_x_m: f64,
    pub ref_y_m: f64,
    pub ref_theta_rad: f64,
    pub position_error_m: f64,
    pub kkt: f64,
    pub qp_status: String,
    pub qp_iterations: u32,
    pub qp_solve_time_s: f64,
}

/// Summary of a completed simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    /// Number of control intervals simulated
    pub num_steps: usize,

    pub sample_period_s: f64,

    /// Largest distance between the vehicle and the reference at a sample
    pub max_position_error_m: f64,

    pub mean_position_error_m: f64,

    pub final_position_error_m: f64,

    pub max_kkt: f64,

    /// Number of steps where the QP failed and was ignored
    pub num_rejected_qps: usize,

    pub total_qp_solve_time_s: f64,

    pub final_state: [f64; 3],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("The simulation must end after it starts (start {0} s, end {1} s)")]
    InvalidTimes(f64, f64),

    #[error("The simulation has not been initialised")]
    NotInitialised,

    #[error("Controller error: {0}")]
    ControllerError(ControllerError),

    #[error("Could not simulate the vehicle: {0}")]
    ProcessError(ModelError),

    #[error("Could not archive the simulation: {0}")]
    ArchiveError(ArchiveError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimulationEnvironment {
    pub fn new(
        t_start_s: f64,
        t_end_s: f64,
        process: Process,
        controller: Controller,
    ) -> Result<Self, SimError> {
        if !t_start_s.is_finite() || !t_end_s.is_finite() || t_end_s <= t_start_s {
            return Err(SimError::InvalidTimes(t_start_s, t_end_s));
        }

        Ok(Self {
            t_start_s,
            t_end_s,
            process,
            controller,
            x0: None,
            process_states: Vec::new(),
            feedback_controls: Vec::new(),
            record: None,
            arch: None,
        })
    }

    /// Archive every sample of the simulation with the given archiver.
    pub fn with_archive(mut self, arch: Archiver) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Initialise the simulation from the state `x0`.
    pub fn init(&mut self, x0: State) -> Result<(), SimError> {
        self.controller
            .init(self.t_start_s, &x0)
            .map_err(SimError::ControllerError)?;

        self.x0 = Some(x0);
        self.process_states = vec![x0];
        self.feedback_controls.clear();
        self.record = None;

        Ok(())
    }

    /// Number of samples needed to cover the simulation time.
    pub fn num_steps(&self) -> usize {
        let span = (self.t_end_s - self.t_start_s) / self.controller.sample_period();

        // Tolerate rounding in the sample period
        ((span - 1e-9).ceil().max(1.0)) as usize
    }

    /// Run the simulation to the end time.
    ///
    /// Every run starts from the initial state with a freshly initialised
    /// controller, so repeated runs give the same result.
    pub fn run(&mut self) -> Result<SimReport, SimError> {
        let mut x = self.x0.ok_or(SimError::NotInitialised)?;
        let dt = self.controller.sample_period();
        let num_steps = self.num_steps();

        self.controller
            .init(self.t_start_s, &x)
            .map_err(SimError::ControllerError)?;
        self.process_states = vec![x];
        self.feedback_controls.clear();
        self.record = None;

        info!(
            "Simulating {:.2} s to {:.2} s in {} steps of {:.4} s",
            self.t_start_s, self.t_end_s, num_steps, dt
        );

        let mut sum_error = 0.0;
        let mut max_error: f64 = 0.0;
        let mut max_kkt: f64 = 0.0;
        let mut num_rejected_qps = 0;
        let mut total_qp_solve_time_s = 0.0;
        let progress_interval = (num_steps / 10).max(1);

        for k in 0..num_steps {
            let t = self.t_start_s + k as f64 * dt;

            let u = self
                .controller
                .step(t, &x)
                .map_err(SimError::ControllerError)?;

            let x_ref = self.controller.reference().at(t);
            let error = position_error(&x, &x_ref);
            sum_error += error;
            max_error = max_error.max(error);

            if let Some(report) = self.controller.last_report() {
                max_kkt = max_kkt.max(report.kkt);
                total_qp_solve_time_s += report.qp_solve_time_s;
                if !report.accepted {
                    num_rejected_qps += 1;
                }

                self.record = Some(SimRecord {
                    time_s: t,
                    x_m: x[0],
                    y_m: x[1],
                    theta_rad: x[2],
                    speed_ms: u[0],
                    steer_rad: u[1],
                    ref_x_m: x_ref[0],
                    ref_y_m: x_ref[1],
                    ref_theta_rad: x_ref[2],
                    position_error_m: error,
                    kkt: report.kkt,
                    qp_status: report.qp_status.clone(),
                    qp_iterations: report.qp_iterations,
                    qp_solve_time_s: report.qp_solve_time_s,
                });
            }
            self.write().map_err(SimError::ArchiveError)?;

            debug!(
                "t = {:8.3} s: x = {:?}, u = {:?}, error = {:.4} m",
                t,
                x.as_slice(),
                u.as_slice(),
                error
            );
            if (k + 1) % progress_interval == 0 {
                info!("    {:5.1} % complete", 100.0 * (k + 1) as f64 / num_steps as f64);
            }

            x = self
                .process
                .step(&x, &u, dt)
                .map_err(SimError::ProcessError)?;

            self.process_states.push(x);
            self.feedback_controls.push(u);
        }

        let t_final = self.t_start_s + num_steps as f64 * dt;
        let final_error = position_error(&x, &self.controller.reference().at(t_final));
        max_error = max_error.max(final_error);
        sum_error += final_error;

        Ok(SimReport {
            num_steps,
            sample_period_s: dt,
            max_position_error_m: max_error,
            mean_position_error_m: sum_error / (num_steps + 1) as f64,
            final_position_error_m: final_error,
            max_kkt,
            num_rejected_qps,
            total_qp_solve_time_s,
            final_state: [x[0], x[1], x[2]],
        })
    }

    /// States of the vehicle at every sample, including the final one.
    pub fn process_states(&self) -> &[State] {
        &self.process_states
    }

    /// Controls applied over every interval.
    pub fn feedback_controls(&self) -> &[Control] {
        &self.feedback_controls
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

impl Archived for SimulationEnvironment {
    fn write(&mut self) -> Result<(), ArchiveError> {
        match (self.arch.as_mut(), self.record.as_ref()) {
            (Some(arch), Some(record)) => arch.serialise(record),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn position_error(x: &State, x_ref: &State) -> f64 {
    ((x[0] - x_ref[0]).powi(2) + (x[1] - x_ref[1]).powi(2)).sqrt()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{BicycleModel, Integrator, IntegratorType};
    use crate::ocp::{Ocp, OcpParams};
    use crate::reference::{ReferencePath, ReferenceTrajectory};
    use crate::rti::{AlgorithmParams, InfeasibleQpHandling, RealTimeAlgorithm, RtiError};

    const T_TOTAL: f64 = 30.0;

    /// A left hand arc driven at 2 m/s with a fixed steering angle.
    fn arc_path() -> ReferencePath {
        let model = BicycleModel::default();
        let radius = model.turn_radius_m(0.1);

        ReferencePath::from_waypoints(
            (0..=30)
                .map(|k| {
                    let theta = 2.0 * k as f64 / radius;
                    State::new(
                        100.0 + radius * theta.sin(),
                        20.0 + radius * (1.0 - theta.cos()),
                        theta,
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    /// Straight line along +x at 2 m/s from (100, 50).
    fn straight_path() -> ReferencePath {
        ReferencePath::from_waypoints(
            (0..=30)
                .map(|k| State::new(100.0 + 2.0 * k as f64, 50.0, 0.0))
                .collect(),
        )
        .unwrap()
    }

    fn environment() -> SimulationEnvironment {
        environment_with(arc_path(), OcpParams::default(), AlgorithmParams::default())
    }

    fn environment_with(
        path: ReferencePath,
        ocp_params: OcpParams,
        alg_params: AlgorithmParams,
    ) -> SimulationEnvironment {
        let reference = ReferenceTrajectory::new(&path, T_TOTAL).unwrap();
        let ocp = Ocp::new(
            OcpParams {
                num_steps: 10,
                ..ocp_params
            },
            reference.sample_period(),
        )
        .unwrap();
        let alg = RealTimeAlgorithm::new(BicycleModel::default(), ocp, alg_params).unwrap();
        let process = Process::new(
            BicycleModel::default(),
            Integrator::new(IntegratorType::ExplicitEuler, 1).unwrap(),
        );

        SimulationEnvironment::new(0.0, T_TOTAL, process, Controller::new(alg, reference))
            .unwrap()
    }

    #[test]
    fn test_invalid_environment() {
        let env = environment();
        let SimulationEnvironment {
            process,
            controller,
            ..
        } = env;

        assert!(matches!(
            SimulationEnvironment::new(5.0, 5.0, process, controller),
            Err(SimError::InvalidTimes(_, _))
        ));
    }

    #[test]
    fn test_run_before_init() {
        let mut env = environment();
        assert!(matches!(env.run(), Err(SimError::NotInitialised)));
    }

    #[test]
    fn test_tracks_arc() {
        let mut env = environment();
        let x0 = arc_path().first();
        env.init(x0).unwrap();

        let report = env.run().unwrap();

        assert_eq!(report.num_steps, 30);
        assert_eq!(env.process_states().len(), 31);
        assert_eq!(env.feedback_controls().len(), 30);
        assert_eq!(env.process_states()[0], x0);
        assert_eq!(report.num_rejected_qps, 0);

        assert!(
            report.max_position_error_m < 1.0,
            "max error {}",
            report.max_position_error_m
        );

        // Steady state controls match the arc
        let u = env.feedback_controls()[15];
        assert!((u[0] - 2.0).abs() < 0.2, "speed {}", u[0]);
        assert!((u[1] - 0.1).abs() < 0.05, "steer {}", u[1]);
    }

    #[test]
    fn test_archive() {
        let path = std::env::temp_dir()
            .join(format!("car_mpc_sim_{}", std::process::id()))
            .join("sim.csv");

        let mut env = environment().with_archive(Archiver::from_file_path(&path).unwrap());
        env.init(arc_path().first()).unwrap();
        env.run().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 31);
        assert!(lines[0].starts_with("time_s,x_m,y_m,theta_rad,speed_ms,steer_rad"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_repeated_runs_match() {
        let mut env = environment();
        env.init(arc_path().first()).unwrap();

        let first = env.run().unwrap();
        let first_states = env.process_states().to_vec();

        let second = env.run().unwrap();

        assert_eq!(env.process_states().len(), first_states.len());
        for (a, b) in env.process_states().iter().zip(first_states.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
        assert!((first.max_position_error_m - second.max_position_error_m).abs() < 1e-9);
    }

    #[test]
    fn test_controller_failure_aborts_run() {
        // The vehicle can neither stop nor turn much, so it must eventually
        // be driven past x = 120
        let ocp_params = OcpParams {
            state_max: [120.0, 200.0, std::f64::consts::PI],
            control_min: [1.0, -0.01],
            control_max: [10.0, 0.01],
            ..Default::default()
        };
        let alg_params = AlgorithmParams {
            infeasible_qp_handling: InfeasibleQpHandling::Stop,
            ..Default::default()
        };

        let mut env = environment_with(straight_path(), ocp_params, alg_params);
        env.init(straight_path().first()).unwrap();

        assert!(matches!(
            env.run(),
            Err(SimError::ControllerError(ControllerError::AlgorithmError(
                _,
                RtiError::InfeasibleQp(_)
            )))
        ));

        // No control is recorded for the failing step
        let num_applied = env.feedback_controls().len();
        assert!(num_applied >= 1 && num_applied <= 15, "{} steps", num_applied);
        assert_eq!(env.process_states().len(), num_applied + 1);
    }
}
