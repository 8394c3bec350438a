//! Raw calibration sweeps.
//!
//! A sweep is the intensity transmitted through the polarizer/SLM/polarizer
//! stack while the whole display is driven through a series of grayscale
//! values. One measurement run produces a [`SweepMatrix`]: one row per
//! commanded grayscale, one column per spectrometer wavelength bin.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SlmError, SlmResult};

/// Largest grayscale value accepted by the display (10-bit).
pub const MAX_GRAYSCALE: u16 = 1023;

/// Intensity versus grayscale for a single wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    /// Commanded grayscales, ascending and evenly spaced.
    pub grayscales: Vec<u16>,
    /// Measured intensity at each grayscale.
    pub intensities: Vec<f64>,
}

impl Sweep {
    /// Pair grayscales with intensities, rejecting mismatched or empty input.
    pub fn new(grayscales: Vec<u16>, intensities: Vec<f64>) -> SlmResult<Self> {
        if grayscales.len() != intensities.len() {
            return Err(SlmError::Calibration(format!(
                "sweep has {} grayscales but {} intensities",
                grayscales.len(),
                intensities.len()
            )));
        }
        if grayscales.is_empty() {
            return Err(SlmError::Calibration("sweep is empty".into()));
        }
        Ok(Self {
            grayscales,
            intensities,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.grayscales.len()
    }

    /// Whether the sweep has no samples.
    pub fn is_empty(&self) -> bool {
        self.grayscales.is_empty()
    }
}

/// `sample_nb` grayscales linearly spaced over `[0, 1023]`, truncated to integers.
pub fn sample_grayscales(sample_nb: usize) -> Vec<u16> {
    match sample_nb {
        0 => Vec::new(),
        1 => vec![0],
        n => {
            let step = f64::from(MAX_GRAYSCALE) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        MAX_GRAYSCALE
                    } else {
                        (i as f64 * step) as u16
                    }
                })
                .collect()
        }
    }
}

/// How measured spectra are scaled before they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Keep raw spectrometer counts.
    #[default]
    None,
    /// Divide everything by the global maximum.
    All,
    /// Divide each wavelength column by its own maximum.
    PerWavelength,
}

/// Intensity for every (grayscale, wavelength) pair of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepMatrix {
    /// Commanded grayscale of each row.
    pub grayscales: Vec<u16>,
    /// Wavelength (nm) of each column.
    pub wavelengths: Vec<f64>,
    /// Shape `(grayscales.len(), wavelengths.len())`.
    pub intensities: Array2<f64>,
}

impl SweepMatrix {
    /// Wrap an intensity matrix, checking its shape against both axes.
    pub fn new(
        grayscales: Vec<u16>,
        wavelengths: Vec<f64>,
        intensities: Array2<f64>,
    ) -> SlmResult<Self> {
        let expected = (grayscales.len(), wavelengths.len());
        if intensities.dim() != expected {
            return Err(SlmError::Calibration(format!(
                "sweep matrix shape {:?} does not match {} grayscales x {} wavelengths",
                intensities.dim(),
                expected.0,
                expected.1
            )));
        }
        Ok(Self {
            grayscales,
            wavelengths,
            intensities,
        })
    }

    /// Build from one spectrum per commanded grayscale.
    pub fn from_spectra(
        grayscales: Vec<u16>,
        wavelengths: Vec<f64>,
        spectra: Vec<Vec<f64>>,
    ) -> SlmResult<Self> {
        let rows = spectra.len();
        let cols = wavelengths.len();
        if let Some(bad) = spectra.iter().position(|s| s.len() != cols) {
            return Err(SlmError::Calibration(format!(
                "spectrum {bad} has {} samples, expected {cols}",
                spectra[bad].len()
            )));
        }
        let flat: Vec<f64> = spectra.into_iter().flatten().collect();
        let intensities = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| SlmError::Calibration(e.to_string()))?;
        Self::new(grayscales, wavelengths, intensities)
    }

    /// Scale intensities in place. Bins without positive intensity are left as they are.
    pub fn normalize(&mut self, mode: Normalization) {
        match mode {
            Normalization::None => {}
            Normalization::All => {
                let max = self.intensities.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                if max > 0.0 {
                    self.intensities.mapv_inplace(|v| v / max);
                } else {
                    warn!(max, "sweep has no positive intensity; skipping normalization");
                }
            }
            Normalization::PerWavelength => {
                for (idx, mut column) in self.intensities.axis_iter_mut(Axis(1)).enumerate() {
                    let max = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                    if max > 0.0 {
                        column.mapv_inplace(|v| v / max);
                    } else {
                        warn!(
                            wavelength_nm = self.wavelengths[idx],
                            "wavelength bin has no positive intensity; left unnormalized"
                        );
                    }
                }
            }
        }
    }

    /// Index of the wavelength bin closest to `wavelength_nm` (first one on ties).
    pub fn nearest_wavelength_index(&self, wavelength_nm: f64) -> Option<usize> {
        self.wavelengths
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (idx, &wl)| {
                let distance = (wl - wavelength_nm).abs();
                match best {
                    Some((_, d)) if d <= distance => best,
                    _ => Some((idx, distance)),
                }
            })
            .map(|(idx, _)| idx)
    }

    /// The intensity-vs-grayscale sweep of one wavelength bin.
    pub fn sweep_at(&self, wavelength_index: usize) -> SlmResult<Sweep> {
        if wavelength_index >= self.wavelengths.len() {
            return Err(SlmError::Calibration(format!(
                "wavelength index {wavelength_index} out of range ({} bins)",
                self.wavelengths.len()
            )));
        }
        let column = self.intensities.column(wavelength_index);
        Sweep::new(self.grayscales.clone(), column.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sample_grayscales_spans_full_range() {
        let g = sample_grayscales(30);
        assert_eq!(g.len(), 30);
        assert_eq!(g[0], 0);
        assert_eq!(*g.last().unwrap(), 1023);
        assert!(g.windows(2).all(|w| w[0] < w[1]));
        // 1023 / 29 = 35.27..., truncated
        assert_eq!(g[1], 35);
        assert_eq!(sample_grayscales(1), vec![0]);
        assert!(sample_grayscales(0).is_empty());
    }

    #[test]
    fn sweep_rejects_length_mismatch() {
        assert!(Sweep::new(vec![0, 1], vec![1.0]).is_err());
        assert!(Sweep::new(vec![], vec![]).is_err());
    }

    #[test]
    fn per_wavelength_normalization() {
        let mut m = SweepMatrix::new(
            vec![0, 1023],
            vec![1000.0, 1100.0],
            array![[2.0, 10.0], [4.0, 5.0]],
        )
        .unwrap();
        m.normalize(Normalization::PerWavelength);
        assert_eq!(m.intensities, array![[0.5, 1.0], [1.0, 0.5]]);
    }

    #[test]
    fn global_normalization() {
        let mut m =
            SweepMatrix::new(vec![0, 1023], vec![1000.0], array![[2.0], [8.0]]).unwrap();
        m.normalize(Normalization::All);
        assert_eq!(m.intensities, array![[0.25], [1.0]]);
    }

    #[test]
    fn nearest_wavelength_prefers_first_on_tie() {
        let m = SweepMatrix::new(
            vec![0],
            vec![1000.0, 1010.0, 1020.0],
            array![[1.0, 1.0, 1.0]],
        )
        .unwrap();
        assert_eq!(m.nearest_wavelength_index(1005.0), Some(0));
        assert_eq!(m.nearest_wavelength_index(1016.0), Some(2));
        assert_eq!(m.nearest_wavelength_index(-5.0), Some(0));
    }

    #[test]
    fn from_spectra_checks_shape() {
        let ok = SweepMatrix::from_spectra(
            vec![0, 512],
            vec![1.0, 2.0],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(ok.sweep_at(1).unwrap().intensities, vec![2.0, 4.0]);

        let bad = SweepMatrix::from_spectra(vec![0, 512], vec![1.0, 2.0], vec![vec![1.0]]);
        assert!(bad.is_err());
    }
}
