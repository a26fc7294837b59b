//! Fixed step integrators for the vehicle model
//!
//! Both integrators can also propagate the sensitivities of the end state
//! with respect to the start state and the (held) control, which gives the
//! discrete time linearisation used by the optimal control problem.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A fixed step integrator over one control interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    kind: IntegratorType,

    /// Number of sub-steps taken across one interval
    num_steps: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The integration scheme used by an [`Integrator`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// First order explicit Euler
    ExplicitEuler,

    /// Classic fourth order Runge-Kutta
    Rk4,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Integrator {
    pub fn new(kind: IntegratorType, num_steps: usize) -> Result<Self, ModelError> {
        if num_steps == 0 {
            return Err(ModelError::InvalidNumSteps);
        }

        Ok(Self { kind, num_steps })
    }

    pub fn kind(&self) -> IntegratorType {
        self.kind
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Integrate the state across `dt_s` seconds holding the control
    /// constant.
    pub fn step(
        &self,
        model: &BicycleModel,
        x: &State,
        u: &Control,
        dt_s: f64,
    ) -> Result<State, ModelError> {
        let h = self.sub_step(dt_s)?;
        let mut x = *x;

        for _ in 0..self.num_steps {
            x = match self.kind {
                IntegratorType::ExplicitEuler => x + model.derivative(&x, u) * h,
                IntegratorType::Rk4 => {
                    let k1 = model.derivative(&x, u);
                    let k2 = model.derivative(&(x + k1 * (0.5 * h)), u);
                    let k3 = model.derivative(&(x + k2 * (0.5 * h)), u);
                    let k4 = model.derivative(&(x + k3 * h), u);

                    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
                }
            };
        }

        Ok(x)
    }

    /// Integrate the state across `dt_s` seconds and return the end state
    /// along with its sensitivities `(dx_end/dx, dx_end/du)`.
    pub fn step_with_sensitivities(
        &self,
        model: &BicycleModel,
        x: &State,
        u: &Control,
        dt_s: f64,
    ) -> Result<(State, StateJacobian, ControlJacobian), ModelError> {
        let h = self.sub_step(dt_s)?;

        let mut x = *x;
        let mut a = StateJacobian::identity();
        let mut b = ControlJacobian::zeros();

        for _ in 0..self.num_steps {
            let (x_next, a_sub, b_sub) = match self.kind {
                IntegratorType::ExplicitEuler => euler_sub_step(model, &x, u, h),
                IntegratorType::Rk4 => rk4_sub_step(model, &x, u, h),
            };

            // Chain rule across the sub-step
            b = a_sub * b + b_sub;
            a = a_sub * a;
            x = x_next;
        }

        Ok((x, a, b))
    }

    fn sub_step(&self, dt_s: f64) -> Result<f64, ModelError> {
        if !dt_s.is_finite() || dt_s < 0.0 {
            return Err(ModelError::InvalidInterval(dt_s));
        }

        Ok(dt_s / self.num_steps as f64)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn euler_sub_step(
    model: &BicycleModel,
    x: &State,
    u: &Control,
    h: f64,
) -> (State, StateJacobian, ControlJacobian) {
    let (jx, ju) = model.jacobians(x, u);

    (
        x + model.derivative(x, u) * h,
        StateJacobian::identity() + jx * h,
        ju * h,
    )
}

/// One RK4 sub-step, differentiating every stage.
fn rk4_sub_step(
    model: &BicycleModel,
    x: &State,
    u: &Control,
    h: f64,
) -> (State, StateJacobian, ControlJacobian) {
    let eye = StateJacobian::identity();

    // Stage 1
    let k1 = model.derivative(x, u);
    let (jx, ju) = model.jacobians(x, u);
    let k1_x = jx;
    let k1_u = ju;

    // Stage 2
    let x2 = x + k1 * (0.5 * h);
    let (jx, ju) = model.jacobians(&x2, u);
    let k2 = model.derivative(&x2, u);
    let k2_x = jx * (eye + k1_x * (0.5 * h));
    let k2_u = jx * (k1_u * (0.5 * h)) + ju;

    // Stage 3
    let x3 = x + k2 * (0.5 * h);
    let (jx, ju) = model.jacobians(&x3, u);
    let k3 = model.derivative(&x3, u);
    let k3_x = jx * (eye + k2_x * (0.5 * h));
    let k3_u = jx * (k2_u * (0.5 * h)) + ju;

    // Stage 4
    let x4 = x + k3 * h;
    let (jx, ju) = model.jacobians(&x4, u);
    let k4 = model.derivative(&x4, u);
    let k4_x = jx * (eye + k3_x * h);
    let k4_u = jx * (k3_u * h) + ju;

    let w = h / 6.0;

    (
        x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * w,
        eye + (k1_x + k2_x * 2.0 + k3_x * 2.0 + k4_x) * w,
        (k1_u + k2_u * 2.0 + k3_u * 2.0 + k4_u) * w,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_integrator() {
        assert_eq!(
            Integrator::new(IntegratorType::Rk4, 0),
            Err(ModelError::InvalidNumSteps)
        );

        let int = Integrator::new(IntegratorType::Rk4, 1).unwrap();
        let model = BicycleModel::default();
        assert!(int
            .step(&model, &State::zeros(), &Control::zeros(), -1.0)
            .is_err());
    }

    #[test]
    fn test_euler_straight_line() {
        let model = BicycleModel::default();
        let int = Integrator::new(IntegratorType::ExplicitEuler, 1).unwrap();

        let x = int
            .step(&model, &State::new(1.0, 1.0, 0.0), &Control::new(2.0, 0.0), 1.5)
            .unwrap();
        assert!((x - State::new(4.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rk4_follows_circle() {
        let model = BicycleModel::new(2.0).unwrap();
        let int = Integrator::new(IntegratorType::Rk4, 20).unwrap();

        let steer = 0.3f64;
        let speed = 1.5;
        let t = 4.0;
        let x = int
            .step(&model, &State::zeros(), &Control::new(speed, steer), t)
            .unwrap();

        // Closed form arc from the origin heading along +x
        let radius = model.turn_radius_m(steer);
        let theta = speed * t / radius;
        let expected = State::new(radius * theta.sin(), radius * (1.0 - theta.cos()), theta);

        assert!((x - expected).norm() < 1e-7);
    }

    #[test]
    fn test_rk4_more_accurate_than_euler() {
        let model = BicycleModel::new(2.0).unwrap();
        let x0 = State::zeros();
        let u = Control::new(2.0, 0.4);

        let truth = Integrator::new(IntegratorType::Rk4, 200)
            .unwrap()
            .step(&model, &x0, &u, 2.0)
            .unwrap();
        let euler = Integrator::new(IntegratorType::ExplicitEuler, 4)
            .unwrap()
            .step(&model, &x0, &u, 2.0)
            .unwrap();
        let rk4 = Integrator::new(IntegratorType::Rk4, 4)
            .unwrap()
            .step(&model, &x0, &u, 2.0)
            .unwrap();

        assert!((rk4 - truth).norm() < (euler - truth).norm());
    }

    #[test]
    fn test_sensitivities_match_finite_differences() {
        let model = BicycleModel::new(3.0).unwrap();
        let x = State::new(5.0, 2.0, -0.4);
        let u = Control::new(3.0, 0.25);
        let dt = 0.8;
        let eps = 1e-6;

        for &kind in &[IntegratorType::ExplicitEuler, IntegratorType::Rk4] {
            let int = Integrator::new(kind, 3).unwrap();
            let (x_end, a, b) = int.step_with_sensitivities(&model, &x, &u, dt).unwrap();

            // The end state agrees with the plain integration
            let x_plain = int.step(&model, &x, &u, dt).unwrap();
            assert!((x_end - x_plain).norm() < 1e-12);

            for i in 0..NUM_STATES {
                let mut xp = x;
                xp[i] += eps;
                let col = (int.step(&model, &xp, &u, dt).unwrap() - x_plain) / eps;
                assert!((col - a.column(i)).norm() < 1e-4, "{:?} A col {}", kind, i);
            }
            for i in 0..NUM_CONTROLS {
                let mut up = u;
                up[i] += eps;
                let col = (int.step(&model, &x, &up, dt).unwrap() - x_plain) / eps;
                assert!((col - b.column(i)).norm() < 1e-4, "{:?} B col {}", kind, i);
            }
        }
    }

    #[test]
    fn test_integrator_type_names() {
        #[derive(Deserialize)]
        struct P {
            integrator: IntegratorType,
        }

        let p: P = util::params::from_str("integrator = \"explicit_euler\"").unwrap();
        assert_eq!(p.integrator, IntegratorType::ExplicitEuler);
        let p: P = util::params::from_str("integrator = \"rk4\"").unwrap();
        assert_eq!(p.integrator, IntegratorType::Rk4);
    }
}
