//! Piecewise linear interpolation without extrapolation.

use crate::error::{SlmError, SlmResult};

/// Evaluate the polyline through `(x, y)` at every target.
///
/// `x` must be ascending. Each target uses the segment starting at the
/// greatest knot `x[i] <= target`; a target equal to the last knot returns
/// the last `y`. Any target outside `[min(x), max(x)]`, NaN included, fails
/// with [`SlmError::Range`].
pub fn interpolate(targets: &[f64], x: &[f64], y: &[f64]) -> SlmResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(SlmError::Calibration(format!(
            "interpolation knots mismatch: {} x values, {} y values",
            x.len(),
            y.len()
        )));
    }
    let (Some(&first), Some(&last)) = (x.first(), x.last()) else {
        return Err(SlmError::Calibration("no interpolation knots".into()));
    };
    let min = x.iter().copied().fold(first, f64::min);
    let max = x.iter().copied().fold(last, f64::max);

    if let Some(&value) = targets.iter().find(|t| !(**t >= min && **t <= max)) {
        return Err(SlmError::Range { min, max, value });
    }

    let n = x.len();
    let result = targets
        .iter()
        .map(|&t| {
            let i = x.partition_point(|&xi| xi <= t).saturating_sub(1);
            if i + 1 >= n {
                // past the last knot the polyline is flat
                return y[n - 1];
            }
            let slope = (y[i + 1] - y[i]) / (x[i + 1] - x[i]);
            y[i] + (t - x[i]) * slope
        })
        .collect();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_at_knots() {
        let x = [0.0, 1.5, 4.0, 10.0];
        let y = [3.0, -1.0, 7.25, 2.0];
        let out = interpolate(&x, &x, &y).unwrap();
        assert_eq!(out, y.to_vec());
    }

    #[test]
    fn linear_between_knots() {
        let out = interpolate(&[2.5, 7.5], &[0.0, 5.0, 10.0], &[0.0, 10.0, 0.0]).unwrap();
        assert_eq!(out, vec![5.0, 5.0]);
    }

    #[test]
    fn rejects_targets_outside_domain() {
        let err = interpolate(&[11.0], &[0.0, 10.0], &[0.0, 1.0]).unwrap_err();
        match err {
            SlmError::Range { min, max, value } => {
                assert_eq!((min, max, value), (0.0, 10.0, 11.0));
            }
            other => panic!("expected range error, got {other:?}"),
        }
        assert!(interpolate(&[-0.1], &[0.0, 10.0], &[0.0, 1.0])
            .unwrap_err()
            .is_range());
        assert!(interpolate(&[f64::NAN], &[0.0, 10.0], &[0.0, 1.0])
            .unwrap_err()
            .is_range());
    }

    #[test]
    fn last_knot_has_no_slope_past_it() {
        let out = interpolate(&[10.0], &[0.0, 10.0], &[0.0, 1.0]).unwrap();
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn repeated_knots_use_the_later_segment() {
        // a flat stretch of phase maps to the highest grayscale reaching it
        let out = interpolate(&[1.0], &[0.0, 1.0, 1.0, 2.0], &[0.0, 10.0, 20.0, 30.0]).unwrap();
        assert_eq!(out, vec![20.0]);
    }

    #[test]
    fn empty_targets_are_fine() {
        assert!(interpolate(&[], &[0.0, 1.0], &[0.0, 1.0]).unwrap().is_empty());
        assert!(interpolate(&[0.5], &[], &[]).is_err());
    }
}
