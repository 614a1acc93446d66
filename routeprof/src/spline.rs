//! Cubic spline densification of profiles.

use crate::{math::linspace, Profile, ProfileError};

/// Densification factor used by the profile tool.
pub const DEFAULT_SPLINE_MULTIPLIER: usize = 100;

impl Profile {
    /// Returns a profile resampled at `multiplier × len` evenly spaced
    /// distances along a natural cubic spline through this one.
    ///
    /// The first and last distances are kept exactly.
    pub fn densify(&self, multiplier: usize) -> Result<Profile, ProfileError> {
        let n = self.len();
        if n < 2 {
            return Err(ProfileError::InsufficientSamples(format!(
                "a spline needs at least 2 points, profile has {n}"
            )));
        }
        if multiplier == 0 {
            return Err(ProfileError::InvalidParameter(
                "spline multiplier must be at least 1".into(),
            ));
        }
        let spline = CubicSpline::natural(&self.distances_m, &self.elevations_m)?;
        let distances_m: Vec<f64> =
            linspace(self.distances_m[0], self.distances_m[n - 1], n * multiplier).collect();
        let elevations_m = distances_m.iter().map(|&d| spline.eval(d)).collect();
        Ok(self.with_series(distances_m, elevations_m))
    }
}

/// Piecewise cubic with zero curvature at both ends.
struct CubicSpline<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl<'a> CubicSpline<'a> {
    fn natural(xs: &'a [f64], ys: &'a [f64]) -> Result<Self, ProfileError> {
        let n = xs.len();
        debug_assert!(n >= 2 && n == ys.len());
        if !xs.windows(2).all(|w| w[0] < w[1]) {
            return Err(ProfileError::InvalidParameter(
                "spline distances must be strictly increasing".into(),
            ));
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for the interior knots, solved with
            // the Thomas algorithm.
            let inner = n - 2;
            let mut diag = vec![0.0; inner];
            let mut upper = vec![0.0; inner];
            let mut rhs = vec![0.0; inner];
            for k in 0..inner {
                let i = k + 1;
                let h0 = xs[i] - xs[i - 1];
                let h1 = xs[i + 1] - xs[i];
                diag[k] = 2.0 * (h0 + h1);
                upper[k] = h1;
                rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
            }
            for k in 1..inner {
                let lower = xs[k + 1] - xs[k];
                let w = lower / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            m[inner] = rhs[inner - 1] / diag[inner - 1];
            for k in (0..inner - 1).rev() {
                m[k + 1] = (rhs[k] - upper[k] * m[k + 2]) / diag[k];
            }
        }

        Ok(Self { xs, ys, m })
    }

    fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let i = self
            .xs
            .partition_point(|&xi| xi <= x)
            .saturating_sub(1)
            .min(n - 2);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 - m0 * h * h / 6.0) * a / h
            + (y1 - m1 * h * h / 6.0) * b / h
    }
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_SPLINE_MULTIPLIER;
    use crate::{Profile, ProfileError};
    use approx::assert_relative_eq;

    fn profile(distances_m: Vec<f64>, elevations_m: Vec<f64>) -> Profile {
        Profile {
            name: "test".into(),
            id: "1".into(),
            distances_m,
            elevations_m,
        }
    }

    #[test]
    fn test_length_and_endpoints() {
        let p = profile(
            vec![0.0, 10.0, 20.0, 30.0, 40.0],
            vec![100.0, 104.0, 103.0, 110.0, 108.0],
        );
        let dense = p.densify(DEFAULT_SPLINE_MULTIPLIER).unwrap();
        assert_eq!(dense.len(), 500);
        assert_eq!(dense.distances_m[0], 0.0);
        assert_eq!(dense.distances_m[499], 40.0);
        assert!(dense.distances_m.windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(dense.elevations_m[0], 100.0, epsilon = 1e-9);
        assert_relative_eq!(dense.elevations_m[499], 108.0, epsilon = 1e-9);
        assert_eq!(dense.id, "1");
        // Input is untouched.
        assert_eq!(p.len(), 5);
    }

    #[test]
    fn test_passes_through_knots() {
        let p = profile(vec![0.0, 1.0, 3.0, 4.0], vec![0.0, 2.0, -1.0, 5.0]);
        // 4 × 4 = 16 points over [0, 4] puts a sample every 4/15.
        let dense = p.densify(4).unwrap();
        assert_eq!(dense.len(), 16);
        let spline = super::CubicSpline::natural(&p.distances_m, &p.elevations_m).unwrap();
        for (x, y) in p.points() {
            assert_relative_eq!(spline.eval(x), y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_linear_data_stays_linear() {
        let p = profile(vec![0.0, 2.0, 5.0, 9.0], vec![10.0, 14.0, 20.0, 28.0]);
        let dense = p.densify(10).unwrap();
        for (d, e) in dense.points() {
            assert_relative_eq!(e, 10.0 + 2.0 * d, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_two_points() {
        let p = profile(vec![0.0, 8.0], vec![100.0, 120.0]);
        let dense = p.densify(3).unwrap();
        assert_eq!(dense.len(), 6);
        assert_eq!(dense.distances_m[5], 8.0);
        assert_relative_eq!(dense.elevations_m[5], 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            profile(vec![0.0], vec![1.0]).densify(100),
            Err(ProfileError::InsufficientSamples(_))
        ));
        assert!(matches!(
            profile(vec![0.0, 1.0], vec![1.0, 2.0]).densify(0),
            Err(ProfileError::InvalidParameter(_))
        ));
        assert!(matches!(
            profile(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]).densify(2),
            Err(ProfileError::InvalidParameter(_))
        ));
    }
}
