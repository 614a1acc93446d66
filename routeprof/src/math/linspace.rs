use num_traits::{Float, FromPrimitive};

/// Returns `n` evenly spaced values from `y_start` to `y_end`.
///
/// The last value is exactly `y_end`. `n == 1` yields `y_start`.
pub fn linspace<T>(y_start: T, y_end: T, n: usize) -> impl Iterator<Item = T> + Clone
where
    T: Float + FromPrimitive,
{
    let dy = if n > 1 {
        (y_end - y_start) / T::from_usize(n - 1).unwrap_or_else(T::one)
    } else {
        T::zero()
    };
    (0..n).map(move |x| {
        if x + 1 == n && n > 1 {
            y_end
        } else {
            y_start + T::from_usize(x).unwrap_or_else(T::zero) * dy
        }
    })
}

#[cfg(test)]
mod tests {
    use super::linspace;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace_endpoints() {
        let vals: Vec<f64> = linspace(0.1, 0.7, 7).collect();
        assert_eq!(vals.len(), 7);
        assert_eq!(vals[0], 0.1);
        assert_eq!(vals[6], 0.7);
        assert_relative_eq!(vals[3], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_linspace_degenerate() {
        assert_eq!(linspace(3.0, 5.0, 1).collect::<Vec<f64>>(), vec![3.0]);
        assert!(linspace(3.0, 5.0, 0).next().is_none());
    }
}
