//! Savitzky-Golay smoothing of profile elevations.

use crate::{Profile, ProfileError};
use nalgebra::DMatrix;

/// Window length used by the profile tool.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 51;

/// Polynomial order used by the profile tool.
pub const DEFAULT_SMOOTHING_ORDER: usize = 3;

impl Profile {
    /// Returns a profile whose elevations are smoothed by a
    /// Savitzky-Golay filter of the given odd `window` and polynomial
    /// `order`.
    ///
    /// Each interior elevation is replaced by the value at the centre
    /// of the least-squares polynomial fitted over the surrounding
    /// window. The first and last `window / 2` elevations are taken
    /// from the polynomial fitted over the first and last full window.
    /// Distances are unchanged.
    pub fn smooth(&self, window: usize, order: usize) -> Result<Profile, ProfileError> {
        let n = self.len();
        if window % 2 == 0 {
            return Err(ProfileError::InsufficientSamples(format!(
                "smoothing window must be odd, got {window}"
            )));
        }
        if order >= window {
            return Err(ProfileError::InsufficientSamples(format!(
                "polynomial order {order} needs a window of at least {}, got {window}",
                order + 1
            )));
        }
        if n < window {
            return Err(ProfileError::InsufficientSamples(format!(
                "smoothing window {window} is longer than the profile ({n})"
            )));
        }

        let filter = SavGol::new(window, order)?;
        let half = window / 2;
        let ys = &self.elevations_m;
        let elevations_m = (0..n)
            .map(|i| {
                let (start, offset) = if i < half {
                    (0, i as isize - half as isize)
                } else if i >= n - half {
                    (n - window, (i + half + 1) as isize - n as isize)
                } else {
                    (i - half, 0)
                };
                filter.apply(offset, &ys[start..start + window])
            })
            .collect();

        Ok(self.with_series(self.distances_m.clone(), elevations_m))
    }
}

/// Convolution weights for every evaluation offset within a window.
struct SavGol {
    half: usize,
    /// Row `k + half` holds the weights of the window samples when
    /// evaluating the fit at offset `k` from the window centre.
    weights: DMatrix<f64>,
}

impl SavGol {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn new(window: usize, order: usize) -> Result<Self, ProfileError> {
        let half = window / 2;
        // Positions are scaled into [-1, 1] to keep the normal
        // equations well conditioned.
        let scale = half.max(1) as f64;
        let vandermonde = DMatrix::from_fn(window, order + 1, |j, q| {
            ((j as f64 - half as f64) / scale).powi(q as i32)
        });

        // Evaluation offsets are the sample positions themselves, so
        // the weights are the rows of the hat matrix A (AᵀA)⁻¹ Aᵀ.
        let normal_inv = (vandermonde.transpose() * &vandermonde)
            .try_inverse()
            .ok_or_else(|| {
                ProfileError::InvalidParameter(format!(
                    "singular smoothing system for window {window}, order {order}"
                ))
            })?;
        let weights = &vandermonde * normal_inv * vandermonde.transpose();

        Ok(Self { half, weights })
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn apply(&self, offset: isize, window: &[f64]) -> f64 {
        let row = (offset + self.half as isize) as usize;
        self.weights
            .row(row)
            .iter()
            .zip(window)
            .map(|(w, y)| w * y)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{SavGol, DEFAULT_SMOOTHING_ORDER, DEFAULT_SMOOTHING_WINDOW};
    use crate::{Profile, ProfileError};
    use approx::assert_relative_eq;

    fn profile(elevations_m: Vec<f64>) -> Profile {
        Profile {
            name: "test".into(),
            id: "7".into(),
            distances_m: (0..elevations_m.len()).map(|i| i as f64 * 10.0).collect(),
            elevations_m,
        }
    }

    #[test]
    fn test_quadratic_weights() {
        let filter = SavGol::new(5, 2).unwrap();
        let centre = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|w| w / 35.0);
        for (j, w) in centre.iter().enumerate() {
            assert_relative_eq!(filter.weights[(2, j)], *w, epsilon = 1e-12);
        }
        for row in filter.weights.row_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_too_short_for_window() {
        let p = profile(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(matches!(
            p.smooth(DEFAULT_SMOOTHING_WINDOW, DEFAULT_SMOOTHING_ORDER),
            Err(ProfileError::InsufficientSamples(_))
        ));
    }

    #[test]
    fn test_bad_parameters() {
        let p = profile(vec![0.0; 20]);
        assert!(matches!(
            p.smooth(4, 2),
            Err(ProfileError::InsufficientSamples(_))
        ));
        assert!(matches!(
            p.smooth(5, 5),
            Err(ProfileError::InsufficientSamples(_))
        ));
    }

    #[test]
    fn test_keeps_distances() {
        let p = profile((0..80).map(|i| (i as f64 * 0.3).sin() * 5.0 + 100.0).collect());
        let smoothed = p
            .smooth(DEFAULT_SMOOTHING_WINDOW, DEFAULT_SMOOTHING_ORDER)
            .unwrap();
        assert_eq!(smoothed.len(), p.len());
        assert_eq!(smoothed.distances_m, p.distances_m);
        assert_eq!(smoothed.id, "7");
    }

    #[test]
    fn test_cubic_passes_through() {
        let f = |x: f64| 0.001 * x.powi(3) - 0.05 * x * x + 2.0 * x + 300.0;
        let p = profile((0..60).map(|i| f(i as f64)).collect());
        let smoothed = p.smooth(11, 3).unwrap();
        for (got, want) in smoothed.elevations_m.iter().zip(&p.elevations_m) {
            assert_relative_eq!(*got, *want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_constant_and_noise() {
        let flat = profile(vec![250.0; 31]);
        for e in flat.smooth(7, 2).unwrap().elevations_m {
            assert_relative_eq!(e, 250.0, epsilon = 1e-9);
        }

        // Alternating noise around a line is flattened by a
        // linear fit over an odd window.
        let noisy = profile(
            (0..41)
                .map(|i| i as f64 + if i % 2 == 0 { 1.0 } else { -1.0 })
                .collect(),
        );
        let smoothed = noisy.smooth(21, 1).unwrap();
        let mid = 20;
        assert!((smoothed.elevations_m[mid] - mid as f64).abs() < 0.1);
    }

    #[test]
    fn test_window_equal_to_length() {
        let p = profile(vec![1.0, 3.0, 2.0, 5.0, 4.0]);
        let smoothed = p.smooth(5, 1).unwrap();
        // Linear fit through the whole profile: 1.4 + 0.8·i.
        for (i, e) in smoothed.elevations_m.iter().enumerate() {
            assert_relative_eq!(*e, 1.4 + 0.8 * i as f64, epsilon = 1e-9);
        }
    }
}
