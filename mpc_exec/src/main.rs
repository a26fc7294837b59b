//! # MPC Tracking Simulation
//!
//! This binary runs the MPC tracking controller in closed loop with a
//! simulated vehicle. The vehicle starts on the first waypoint of the
//! reference path and the controller drives it along the path over the
//! configured total time. The simulated states and applied controls are
//! written out as text files, and the session directory receives the log,
//! a CSV archive of every sample and a JSON report.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{info, warn};
use structopt::StructOpt;

use mpc_lib::{
    controller::Controller,
    model::{BicycleModel, Integrator},
    ocp::Ocp,
    output,
    params::MpcSimParams,
    reference::{ReferencePath, ReferenceTrajectory},
    rti::RealTimeAlgorithm,
    sim::{Process, SimulationEnvironment},
    validity::ValidityChecker,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, parse_level},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default parameter file, relative to the params directory.
const PARAMS_FILE: &str = "mpc_sim.toml";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulate the MPC tracking controller on a reference path.
#[derive(Debug, StructOpt)]
#[structopt(name = "mpc_sim")]
struct Opt {
    /// Parameter file to load instead of `params/mpc_sim.toml`
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Reference path file, overriding the one in the parameters
    #[structopt(short, long, parse(from_os_str))]
    reference: Option<PathBuf>,

    /// Output directory, overriding the one in the parameters
    #[structopt(short, long, parse(from_os_str))]
    output_dir: Option<PathBuf>,

    /// Minimum log level (info, debug or trace)
    #[structopt(short, long, default_value = "info")]
    log_level: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mpc_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = parse_level(&opt.log_level)
        .ok_or_else(|| eyre!("Unknown log level \"{}\"", opt.log_level))?;
    logger_init(log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Tracking Simulation\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: MpcSimParams = match opt.params {
        Some(ref p) => util::params::load_path(p),
        None => util::params::load(PARAMS_FILE),
    }
    .wrap_err("Could not load the simulation parameters")?;
    session.save_or_warn("params.json", &params);

    let sw_root = host::get_sw_root().wrap_err("Could not locate the software root")?;

    let reference_file = resolve(
        &sw_root,
        opt.reference.unwrap_or_else(|| params.sim.reference_file.clone()),
    );
    let output_dir = resolve(
        &sw_root,
        opt.output_dir
            .unwrap_or_else(|| params.sim.output_dir.clone()),
    );

    // ---- LOAD REFERENCE ----

    let path = ReferencePath::load(&reference_file)
        .wrap_err_with(|| format!("Failed to load the reference path {:?}", reference_file))?;
    info!(
        "Loaded {} reference waypoints from {:?}",
        path.len(),
        reference_file
    );

    let checker =
        ValidityChecker::new(params.validity.clone()).wrap_err("Invalid validity parameters")?;
    if params.sim.check_reference_validity {
        let invalid = checker.check_path(path.waypoints());

        if !invalid.is_empty() {
            return Err(eyre!(
                "The reference path contains invalid waypoints at index(s) {:?}",
                invalid
            ));
        }
        info!("All reference waypoints are valid");
    }

    // ---- MODULE INIT ----

    let reference = ReferenceTrajectory::new(&path, params.sim.t_total_s)
        .wrap_err("Failed to build the reference trajectory")?;
    info!(
        "Reference of {} samples every {:.4} s",
        reference.num_samples(),
        reference.sample_period()
    );

    let model = BicycleModel::from_params(&params.model).wrap_err("Invalid model parameters")?;

    let ocp = Ocp::new(params.ocp.clone(), reference.sample_period())
        .wrap_err("Invalid optimal control problem")?;
    info!(
        "Horizon of {} steps of {:.4} s ({:.2} s)",
        ocp.num_steps(),
        ocp.sample_period(),
        ocp.horizon_s()
    );

    let algorithm = RealTimeAlgorithm::new(model, ocp, params.algorithm.clone())
        .wrap_err("Failed to initialise the real-time iteration algorithm")?;
    let controller = Controller::new(algorithm, reference);

    let process = Process::new(
        model,
        Integrator::new(
            params.sim.process_integrator,
            params.sim.process_integrator_steps,
        )
        .wrap_err("Invalid process integrator")?,
    );

    let arch = Archiver::from_path(&session, "sim.csv").wrap_err("Failed to create the archive")?;

    let mut sim = SimulationEnvironment::new(0.0, params.sim.t_total_s, process, controller)
        .wrap_err("Failed to create the simulation environment")?
        .with_archive(arch);

    sim.init(path.first())
        .wrap_err("Failed to initialise the simulation")?;

    // ---- RUN ----

    let report = sim.run().wrap_err("Simulation failed")?;

    info!("Simulation complete");
    info!("    Steps: {}", report.num_steps);
    info!(
        "    Position error: max {:.3} m, mean {:.3} m, final {:.3} m",
        report.max_position_error_m, report.mean_position_error_m, report.final_position_error_m
    );
    info!("    Total QP time: {:.3} s", report.total_qp_solve_time_s);
    if report.num_rejected_qps > 0 {
        warn!("    {} QPs were rejected", report.num_rejected_qps);
    }
    if let Some(last) = sim.controller().last_report() {
        info!(
            "    Last QP: {}, {} iterations, KKT {:.3e}",
            last.qp_status, last.qp_iterations, last.kkt
        );
    }

    let invalid = checker.check_path(sim.process_states());
    if !invalid.is_empty() {
        warn!(
            "The simulated trajectory left the valid space at {} samples",
            invalid.len()
        );
    }

    session.save_or_warn("report.json", &report);

    // ---- OUTPUT ----

    let states_path = output_dir.join(&params.sim.states_file);
    let controls_path = output_dir.join(&params.sim.controls_file);

    output::write_states(&states_path, sim.process_states())
        .wrap_err("Failed to write the simulated states")?;
    output::write_controls(&controls_path, sim.feedback_controls())
        .wrap_err("Failed to write the applied controls")?;

    info!("States written to {:?}", states_path);
    info!("Controls written to {:?}", controls_path);

    session.exit();

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Resolve a path relative to the software root.
fn resolve(sw_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        sw_root.join(path)
    }
}
