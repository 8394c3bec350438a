//! Grayscale-to-phase curve extraction.
//!
//! The measurement places the SLM between two polarizers at 45° to its
//! operating axis, so the transmitted intensity follows `cos²(Γ/2)` where `Γ`
//! is the retardance commanded by the grayscale. [`extract_curve`] inverts
//! that law on a single period of a measured sweep.
//!
//! # Assumptions
//!
//! The sweep is expected to contain a single global minimum, with intensity
//! moving monotonically from the first sample towards it. Stray-light
//! residue around the minimum makes those samples unreliable, which is why a
//! symmetric window around it is dropped. Sweeps with several local extrema
//! or jitter points are outside what the inversion can untangle.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::interpolate::interpolate;
use super::sweep::MAX_GRAYSCALE;
use crate::error::{SlmError, SlmResult};

/// Measured mapping from grayscale to optical phase for one wavelength.
///
/// Phases are in radians, non-decreasing, start at 0 and stay on a single
/// continuity branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    /// Ascending grayscale knots.
    pub grayscales: Vec<u16>,
    /// Phase (rad) at each knot.
    pub phases: Vec<f64>,
}

impl CalibrationCurve {
    /// Number of knots.
    pub fn len(&self) -> usize {
        self.grayscales.len()
    }

    /// Whether the curve has no knots.
    pub fn is_empty(&self) -> bool {
        self.grayscales.is_empty()
    }

    /// Phase produced by each grayscale, linearly interpolated between knots.
    pub fn phases_at(&self, grayscales: &[f64]) -> SlmResult<Vec<f64>> {
        interpolate(grayscales, &self.grayscale_axis(), &self.phases)
    }

    /// Grayscale to command for each target phase (the inverse direction).
    pub fn grayscales_for(&self, phases: &[f64]) -> SlmResult<Vec<f64>> {
        interpolate(phases, &self.phases, &self.grayscale_axis())
    }

    fn grayscale_axis(&self) -> Vec<f64> {
        self.grayscales.iter().map(|&g| f64::from(g)).collect()
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Extract the calibration curve of one sweep.
///
/// `ignored_samples` samples on each side of the intensity minimum are
/// dropped together with the minimum itself; the window is clipped at the
/// ends of the sweep. A final `(1023, 2π)` point is appended when the kept
/// samples stop short of the last grayscale.
///
/// Fails with [`SlmError::Calibration`] on mismatched or too short input, a
/// sweep without contrast, or a sweep that leaves fewer than two samples
/// once the minimum window is removed.
pub fn extract_curve(
    grayscales: &[u16],
    intensities: &[f64],
    ignored_samples: usize,
) -> SlmResult<CalibrationCurve> {
    if grayscales.len() != intensities.len() {
        return Err(SlmError::Calibration(format!(
            "{} grayscales but {} intensities",
            grayscales.len(),
            intensities.len()
        )));
    }
    if grayscales.len() < 2 {
        return Err(SlmError::Calibration(format!(
            "need at least 2 samples, got {}",
            grayscales.len()
        )));
    }
    if intensities.iter().any(|v| !v.is_finite()) {
        return Err(SlmError::Calibration(
            "sweep contains non-finite intensities".into(),
        ));
    }

    let max = intensities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = intensities.iter().copied().fold(f64::INFINITY, f64::min);
    if max <= min {
        return Err(SlmError::Calibration(format!(
            "sweep has no contrast (all intensities equal {max})"
        )));
    }

    let mut x = grayscales.to_vec();
    let mut y: Vec<f64> = if max > 1.0 {
        intensities.iter().map(|v| v / max).collect()
    } else {
        intensities.to_vec()
    };

    let n = y.len();
    let mut slopes: Vec<i8> = y.windows(2).map(|w| sign(w[1] - w[0])).collect();
    slopes.push(slopes[n - 2]);

    // One period ends where the intensity crosses back past the first sample
    // in the direction the sweep started with. A flat first step has no
    // direction, so the whole sweep is kept.
    let dist: Vec<i8> = y.iter().map(|v| sign(v - y[0])).collect();
    let period_end = (1..n - 1).find(|&i| (dist[i + 1] - dist[i]).signum() == slopes[0]);
    match period_end {
        Some(end) if slopes[0] != 0 => {
            trace!(end, total = n, "truncating sweep to one period");
            x.truncate(end);
            y.truncate(end);
            slopes.truncate(end);
        }
        _ => {}
    }

    let argmin = y
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &v)| if v < best.1 { (i, v) } else { best })
        .0;
    let lo = argmin.saturating_sub(ignored_samples);
    let hi = (argmin + ignored_samples + 1).min(y.len());
    x.drain(lo..hi);
    y.drain(lo..hi);
    slopes.drain(lo..hi);
    debug!(argmin, removed = hi - lo, kept = x.len(), "dropped samples around minimum");

    if x.len() < 2 {
        return Err(SlmError::Calibration(format!(
            "only {} sample(s) left after removing {} around the minimum",
            x.len(),
            hi - lo
        )));
    }

    let mut phases: Vec<f64> = y
        .iter()
        .zip(&slopes)
        .map(|(&v, &slope)| {
            let phase = v.clamp(0.0, 1.0).sqrt().acos();
            if slope > 0 {
                PI - phase
            } else {
                phase
            }
        })
        .collect();

    let zero_idx = phases
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &p)| {
            if p.abs() < best.1 {
                (i, p.abs())
            } else {
                best
            }
        })
        .0;
    for phase in &mut phases[..zero_idx] {
        *phase -= PI;
    }

    let origin = phases[0];
    for phase in &mut phases {
        *phase = (*phase - origin) * 2.0;
    }

    if phases.iter().any(|p| !p.is_finite()) {
        return Err(SlmError::Calibration("extracted phases are not finite".into()));
    }

    if x.last() != Some(&MAX_GRAYSCALE) {
        x.push(MAX_GRAYSCALE);
        phases.push(2.0 * PI);
    }

    Ok(CalibrationCurve {
        grayscales: x,
        phases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::sweep::sample_grayscales;

    fn is_non_decreasing(values: &[f64]) -> bool {
        values.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn ideal_cos2_sweep_matches_analytic_phase() {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let intensities: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 2046.0).cos().powi(2))
            .collect();

        let curve = extract_curve(&grayscales, &intensities, 1).unwrap();

        // the minimum sits on the last sample, so 900 and 1000 are dropped
        assert_eq!(
            curve.grayscales,
            vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 1023]
        );
        assert_eq!(curve.phases[0], 0.0);
        assert!(is_non_decreasing(&curve.phases));
        assert!((curve.phases.last().unwrap() - 2.0 * PI).abs() < 1e-12);

        for (g, phase) in curve.grayscales.iter().zip(&curve.phases).take(9) {
            let expected = PI * f64::from(*g) / 1023.0;
            assert!((phase - expected).abs() < 1e-9, "g={g}: {phase} vs {expected}");
        }
    }

    #[test]
    fn raw_counts_are_normalized() {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let unit: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 2046.0).cos().powi(2))
            .collect();
        let counts: Vec<f64> = unit.iter().map(|v| v * 4000.0).collect();

        let a = extract_curve(&grayscales, &unit, 1).unwrap();
        let b = extract_curve(&grayscales, &counts, 1).unwrap();
        assert_eq!(a.grayscales, b.grayscales);
        for (pa, pb) in a.phases.iter().zip(&b.phases) {
            assert!((pa - pb).abs() < 1e-9);
        }
    }

    #[test]
    fn rising_start_is_stitched_onto_one_branch() {
        let grayscales = sample_grayscales(30);
        let intensities: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 2046.0 - 0.3).cos().powi(2))
            .collect();

        let curve = extract_curve(&grayscales, &intensities, 1).unwrap();

        assert_eq!(curve.phases[0], 0.0);
        assert!(is_non_decreasing(&curve.phases));
        let n = curve.len();
        for (g, phase) in curve.grayscales[..n - 1].iter().zip(&curve.phases) {
            let expected = PI * f64::from(*g) / 1023.0;
            assert!((phase - expected).abs() < 1e-6, "g={g}: {phase} vs {expected}");
        }
    }

    #[test]
    fn sweep_is_cut_after_one_period() {
        let grayscales: Vec<u16> = (0..=8).map(|k| k * 100).collect();
        let intensities = [0.8, 0.5, 0.1, 0.0, 0.4, 0.9, 1.0, 0.6, 0.2];

        let curve = extract_curve(&grayscales, &intensities, 0).unwrap();

        assert_eq!(curve.grayscales, vec![0, 100, 200, 400, 500, 1023]);
        assert!(is_non_decreasing(&curve.phases));
        let rising = PI - 0.4f64.sqrt().acos();
        let start = 0.8f64.sqrt().acos();
        assert!((curve.phases[3] - 2.0 * (rising - start)).abs() < 1e-12);
    }

    #[test]
    fn leading_plateau_keeps_the_whole_sweep() {
        let grayscales: Vec<u16> = (0..=8).map(|k| k * 100).collect();
        let intensities = [1.0, 1.0, 0.8, 0.5, 0.2, 0.0, 0.3, 0.7, 1.0];

        let curve = extract_curve(&grayscales, &intensities, 1).unwrap();

        // only the minimum window goes; nothing is cut after the plateau
        assert_eq!(curve.grayscales, vec![0, 100, 200, 300, 700, 800, 1023]);
        assert_eq!(curve.phases[0], 0.0);
        assert_eq!(curve.phases[1], 0.0);
        assert!(is_non_decreasing(&curve.phases));
        let rising = 2.0 * (PI - 0.7f64.sqrt().acos());
        assert!((curve.phases[4] - rising).abs() < 1e-12);
        assert!((curve.phases[5] - 2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn synthetic_end_point_only_when_needed() {
        let grayscales = sample_grayscales(12);
        let intensities: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 1500.0).cos().powi(2))
            .collect();

        let curve = extract_curve(&grayscales, &intensities, 1).unwrap();
        assert_eq!(curve.len(), grayscales.len() - 3);
        assert_eq!(curve.grayscales.last(), Some(&MAX_GRAYSCALE));
        assert_eq!(
            curve.grayscales.iter().filter(|&&g| g == MAX_GRAYSCALE).count(),
            1
        );
        assert!(is_non_decreasing(&curve.phases));
    }

    #[test]
    fn minimum_window_clips_at_sweep_start() {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let intensities: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 2046.0).sin().powi(2))
            .collect();

        let curve = extract_curve(&grayscales, &intensities, 2).unwrap();
        // samples 0..=2 removed, 8 kept, plus the appended end point
        assert_eq!(curve.len(), 9);
        assert_eq!(curve.grayscales[0], 300);
        assert_eq!(curve.phases[0], 0.0);
        assert!(is_non_decreasing(&curve.phases));
    }

    #[test]
    fn degenerate_sweeps_fail() {
        let flat = extract_curve(&[0, 500, 1023], &[0.5, 0.5, 0.5], 1);
        assert!(matches!(flat, Err(SlmError::Calibration(_))));

        let single = extract_curve(&[0], &[1.0], 0);
        assert!(matches!(single, Err(SlmError::Calibration(_))));

        let mismatch = extract_curve(&[0, 1023], &[1.0], 0);
        assert!(matches!(mismatch, Err(SlmError::Calibration(_))));

        let eaten = extract_curve(&[0, 511, 1023], &[0.0, 0.5, 1.0], 1);
        assert!(matches!(eaten, Err(SlmError::Calibration(_))));

        let nan = extract_curve(&[0, 511, 1023], &[1.0, f64::NAN, 0.0], 0);
        assert!(matches!(nan, Err(SlmError::Calibration(_))));
    }

    #[test]
    fn inverse_reproduces_knots() {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let intensities: Vec<f64> = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 2046.0).cos().powi(2))
            .collect();
        let curve = extract_curve(&grayscales, &intensities, 1).unwrap();

        let back = curve.grayscales_for(&curve.phases).unwrap();
        let expected: Vec<f64> = curve.grayscales.iter().map(|&g| f64::from(g)).collect();
        assert_eq!(back, expected);

        let forward = curve.phases_at(&[250.0]).unwrap();
        assert!((forward[0] - PI * 250.0 / 1023.0).abs() < 1e-9);
    }
}
