//! # Reference module
//!
//! The reference is a geometric path produced by a planner, stored as a text
//! file with one `x y theta` waypoint per line. The controller tracks this
//! path by stretching it evenly over a fixed total time, giving a static
//! time-parameterised reference trajectory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

// Internal
use crate::model::{State, NUM_STATES};
use util::maths::{ang_dist, wrap_to_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A non-empty sequence of waypoints making up the reference path.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ReferencePath {
    waypoints: Vec<State>,
}

/// A reference path spread over time with a fixed sample period.
#[derive(Clone, Debug)]
pub struct ReferenceTrajectory {
    samples: Vec<State>,

    /// Time between two neighbouring samples
    sample_period_s: f64,

    /// Total duration of the trajectory
    duration_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Cannot open the reference file {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Invalid value {token:?} on line {line} of the reference path")]
    Parse { line: usize, token: String },

    #[error("The reference path contains no waypoints")]
    Empty,

    #[error("The reference duration must be finite and positive, found {0}")]
    InvalidDuration(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReferencePath {
    /// Load a path from a waypoint file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReferenceError::Io(path.to_path_buf(), e))?;

        let reference = Self::parse(&contents)?;

        debug!(
            "Loaded {} reference waypoints from {:?}",
            reference.len(),
            path
        );

        Ok(reference)
    }

    /// Parse a path from the contents of a waypoint file.
    ///
    /// Each non-blank line holds up to three whitespace separated numbers,
    /// `x y theta`. Missing values are zero and anything past the third
    /// column is ignored.
    pub fn parse(contents: &str) -> Result<Self, ReferenceError> {
        let mut waypoints = Vec::new();

        for (line_idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let mut waypoint = State::zeros();

            for (i, token) in line.split_whitespace().take(NUM_STATES).enumerate() {
                waypoint[i] = token.parse().map_err(|_| ReferenceError::Parse {
                    line: line_idx + 1,
                    token: token.to_string(),
                })?;
            }

            waypoints.push(waypoint);
        }

        Self::from_waypoints(waypoints)
    }

    pub fn from_waypoints(waypoints: Vec<State>) -> Result<Self, ReferenceError> {
        if waypoints.is_empty() {
            return Err(ReferenceError::Empty);
        }

        Ok(Self { waypoints })
    }

    pub fn waypoints(&self) -> &[State] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// First waypoint of the path, the start state of the vehicle.
    pub fn first(&self) -> State {
        self.waypoints[0]
    }
}

impl ReferenceTrajectory {
    /// Spread the path evenly over `duration_s` seconds.
    ///
    /// With `n` waypoints the sample period is `duration_s / (n - 1)`, so the
    /// first waypoint is at `t = 0` and the last one at `t = duration_s`.
    pub fn new(path: &ReferencePath, duration_s: f64) -> Result<Self, ReferenceError> {
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(ReferenceError::InvalidDuration(duration_s));
        }
        if path.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let sample_period_s = if path.len() > 1 {
            duration_s / (path.len() - 1) as f64
        } else {
            duration_s
        };

        let samples = path
            .waypoints
            .iter()
            .map(|w| State::new(w[0], w[1], wrap_to_pi(w[2])))
            .collect();

        Ok(Self {
            samples,
            sample_period_s,
            duration_s,
        })
    }

    pub fn sample_period(&self) -> f64 {
        self.sample_period_s
    }

    pub fn duration(&self) -> f64 {
        self.duration_s
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Reference state at time `t_s`.
    ///
    /// Positions are interpolated linearly between samples, the heading along
    /// the shortest arc. Times before the start give the first sample and
    /// times past the end hold the last one.
    pub fn at(&self, t_s: f64) -> State {
        let last = self.samples.len() - 1;

        let s = t_s / self.sample_period_s;
        if last == 0 || s.is_nan() || s <= 0.0 {
            return self.samples[0];
        }

        let i = s.floor() as usize;
        if i >= last {
            return self.samples[last];
        }

        let frac = s - i as f64;
        let a = &self.samples[i];
        let b = &self.samples[i + 1];

        State::new(
            a[0] + frac * (b[0] - a[0]),
            a[1] + frac * (b[1] - a[1]),
            wrap_to_pi(a[2] + frac * ang_dist(b[2], a[2])),
        )
    }

    /// The `num_steps + 1` reference states at `t0_s + k dt_s`.
    pub fn horizon(&self, t0_s: f64, dt_s: f64, num_steps: usize) -> Vec<State> {
        (0..=num_steps)
            .map(|k| self.at(t0_s + k as f64 * dt_s))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_parse() {
        let path = ReferencePath::parse("0 0 0\n\n1.5 2.0 0.5\n3 4\n5 6 7 8\n").unwrap();

        assert_eq!(path.len(), 4);
        assert_eq!(path.first(), State::new(0.0, 0.0, 0.0));
        assert_eq!(path.waypoints[1], State::new(1.5, 2.0, 0.5));
        assert_eq!(path.waypoints[2], State::new(3.0, 4.0, 0.0));
        assert_eq!(path.waypoints[3], State::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ReferencePath::parse("\n  \n"),
            Err(ReferenceError::Empty)
        ));

        match ReferencePath::parse("0 0 0\n1 x 0\n") {
            Err(ReferenceError::Parse { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "x");
            }
            r => panic!("Expected a parse error, got {:?}", r),
        }

        assert!(matches!(
            ReferencePath::load("/definitely/not/a/path.txt"),
            Err(ReferenceError::Io(_, _))
        ));
    }

    #[test]
    fn test_trajectory_timing() {
        let path = ReferencePath::from_waypoints(vec![
            State::new(0.0, 0.0, 0.0),
            State::new(10.0, 0.0, 0.0),
            State::new(20.0, 0.0, 0.0),
        ])
        .unwrap();
        let traj = ReferenceTrajectory::new(&path, 70.0).unwrap();

        assert_eq!(traj.sample_period(), 35.0);
        assert_eq!(traj.duration(), 70.0);
        assert_eq!(traj.num_samples(), 3);

        // Interpolated, clamped before the start and held after the end
        assert!((traj.at(17.5) - State::new(5.0, 0.0, 0.0)).norm() < 1e-12);
        assert_eq!(traj.at(-1.0), State::new(0.0, 0.0, 0.0));
        assert_eq!(traj.at(70.0), State::new(20.0, 0.0, 0.0));
        assert_eq!(traj.at(100.0), State::new(20.0, 0.0, 0.0));

        assert!(matches!(
            ReferenceTrajectory::new(&path, 0.0),
            Err(ReferenceError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_single_waypoint() {
        let path = ReferencePath::from_waypoints(vec![State::new(1.0, 2.0, 0.3)]).unwrap();
        let traj = ReferenceTrajectory::new(&path, 10.0).unwrap();

        assert_eq!(traj.sample_period(), 10.0);
        assert_eq!(traj.at(5.0), State::new(1.0, 2.0, 0.3));
    }

    #[test]
    fn test_heading_shortest_arc() {
        let path = ReferencePath::from_waypoints(vec![
            State::new(0.0, 0.0, PI - 0.1),
            State::new(0.0, 0.0, -PI + 0.1),
        ])
        .unwrap();
        let traj = ReferenceTrajectory::new(&path, 1.0).unwrap();

        // Half way should pass through pi rather than zero
        let mid = traj.at(0.5);
        assert!((mid[2].abs() - PI).abs() < 1e-9);

        let quarter = traj.at(0.25);
        assert!((quarter[2] - (PI - 0.05)).abs() < 1e-9);
    }

    #[test]
    fn test_horizon() {
        let path = ReferencePath::from_waypoints(vec![
            State::new(0.0, 0.0, 0.0),
            State::new(4.0, 0.0, 0.0),
        ])
        .unwrap();
        let traj = ReferenceTrajectory::new(&path, 4.0).unwrap();

        let h = traj.horizon(1.0, 1.0, 5);
        assert_eq!(h.len(), 6);
        let xs: Vec<f64> = h.iter().map(|s| s[0]).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
    }
}
