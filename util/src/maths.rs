//! Angle arithmetic helpers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_to_pi<T>(angle: T) -> T
where
    T: Float,
{
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau = pi + pi;

    if angle >= -pi && angle < pi {
        return angle;
    }

    rem_euclid(angle + pi, tau) - pi
}

/// Get the shortest signed angular distance from `b` to `a`, i.e. the value
/// `d` in [-pi, pi) such that `b + d` is equivalent to `a`.
pub fn ang_dist<T>(a: T, b: T) -> T
where
    T: Float,
{
    wrap_to_pi(a - b)
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_wrap_to_pi() {
        assert!(close(wrap_to_pi(0.0), 0.0));
        assert!(close(wrap_to_pi(TAU + 1.0), 1.0));
        assert!(close(wrap_to_pi(-TAU - 1.0), -1.0));
        assert!(close(wrap_to_pi(PI + 0.5), -PI + 0.5));
        assert!(close(wrap_to_pi(PI), -PI));
    }

    #[test]
    fn test_ang_dist() {
        assert!(close(ang_dist(2.0, 1.0), 1.0));
        assert!(close(ang_dist(1.0, 2.0), -1.0));
        assert!(close(ang_dist(PI - 0.1, -PI + 0.1), -0.2));
        assert!(close(ang_dist(-PI + 0.1, PI - 0.1), 0.2));
    }
}
