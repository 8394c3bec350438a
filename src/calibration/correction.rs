//! Per-wavelength phase correction of display patterns.
//!
//! On the bench the spectrometer grating disperses wavelengths across the
//! SLM, so every line of pixels perpendicular to the dispersion direction
//! sees (roughly) one wavelength and needs its own calibration curve. A
//! [`CorrectionTable`] stores one calibration sweep per distinct wavelength
//! bin and the bin used by each line; [`apply_correction`] turns a pattern
//! expressed in nominal grayscales into the grayscales that actually produce
//! the intended phase on each line.
//!
//! Nominal grayscale `g` stands for the phase `g·2π/1023`.

use std::collections::HashMap;
use std::f64::consts::PI;

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::curve::{extract_curve, CalibrationCurve};
use super::sweep::{Sweep, SweepMatrix, MAX_GRAYSCALE};
use crate::error::{SlmError, SlmResult};
use crate::patterns::Pattern;

/// Phase (radians) a nominal grayscale stands for.
pub fn grayscale_to_phase(grayscale: u16) -> f64 {
    2.0 * PI * (f64::from(grayscale) / f64::from(MAX_GRAYSCALE))
}

/// Direction along which the wavelength varies on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispersionAxis {
    /// Wavelength changes with the column index; each column has one curve.
    #[default]
    Columns,
    /// Wavelength changes with the row index; each row has one curve.
    Rows,
}

impl DispersionAxis {
    /// Pattern axis whose index selects the calibration line.
    fn pattern_axis(self) -> Axis {
        match self {
            DispersionAxis::Columns => Axis(1),
            DispersionAxis::Rows => Axis(0),
        }
    }
}

/// Calibration sweep measured at one spectrometer wavelength bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    /// Center of the spectrometer bin.
    pub wavelength_nm: f64,
    /// Intensity against grayscale at that wavelength.
    pub sweep: Sweep,
}

/// Calibration data for every line of the display.
///
/// Built once per calibration run and replaced wholesale on re-measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionTable {
    /// Pattern axis the lines run across.
    pub axis: DispersionAxis,
    /// Distinct wavelength bins referenced by `lines`.
    pub bins: Vec<CalibrationBin>,
    /// Index into `bins` for each display line.
    pub lines: Vec<usize>,
}

impl CorrectionTable {
    /// Assign a measured wavelength bin to each of `line_count` lines.
    ///
    /// Wavelengths are assumed to spread linearly over the lines: line `i`
    /// sits at `min_wl + i·(max_wl - min_wl)/line_count` and takes the
    /// nearest measured bin.
    #[instrument(skip(matrix), fields(bins = matrix.wavelengths.len()))]
    pub fn from_sweep(
        matrix: &SweepMatrix,
        line_count: usize,
        min_wavelength_nm: f64,
        max_wavelength_nm: f64,
        axis: DispersionAxis,
    ) -> SlmResult<Self> {
        if line_count == 0 {
            return Err(SlmError::Calibration("correction table needs at least one line".into()));
        }
        let span = max_wavelength_nm - min_wavelength_nm;
        let mut bins = Vec::new();
        let mut by_column: HashMap<usize, usize> = HashMap::new();
        let mut lines = Vec::with_capacity(line_count);

        for line in 0..line_count {
            let assumed = min_wavelength_nm + line as f64 * span / line_count as f64;
            let column = matrix.nearest_wavelength_index(assumed).ok_or_else(|| {
                SlmError::Calibration("sweep matrix has no wavelength bins".into())
            })?;
            let bin = match by_column.get(&column) {
                Some(&bin) => bin,
                None => {
                    bins.push(CalibrationBin {
                        wavelength_nm: matrix.wavelengths[column],
                        sweep: matrix.sweep_at(column)?,
                    });
                    by_column.insert(column, bins.len() - 1);
                    bins.len() - 1
                }
            };
            lines.push(bin);
        }

        debug!(lines = line_count, distinct_bins = bins.len(), "built correction table");
        Ok(Self { axis, bins, lines })
    }

    /// One sweep shared by every line.
    pub fn uniform(
        sweep: Sweep,
        wavelength_nm: f64,
        line_count: usize,
        axis: DispersionAxis,
    ) -> Self {
        Self {
            axis,
            bins: vec![CalibrationBin {
                wavelength_nm,
                sweep,
            }],
            lines: vec![0; line_count],
        }
    }

    /// Number of display lines covered.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line is covered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Calibration bin assigned to `line`.
    pub fn bin_for_line(&self, line: usize) -> Option<&CalibrationBin> {
        self.lines.get(line).and_then(|&b| self.bins.get(b))
    }

    /// Extract the curve of every bin, in `bins` order.
    pub fn curves(&self, ignored_samples: usize) -> SlmResult<Vec<CalibrationCurve>> {
        self.bins
            .iter()
            .map(|bin| {
                extract_curve(&bin.sweep.grayscales, &bin.sweep.intensities, ignored_samples)
                    .map_err(|e| match e {
                        SlmError::Calibration(msg) => SlmError::Calibration(format!(
                            "bin at {} nm: {msg}",
                            bin.wavelength_nm
                        )),
                        other => other,
                    })
            })
            .collect()
    }
}

/// Correct `pattern` line by line, returning a new pattern of the same shape.
///
/// Each value is read as the phase `g·2π/1023`, inverted through the curve of
/// its line and truncated to an integer grayscale. Targets outside a curve's
/// phase range fail with [`SlmError::Range`]; no clamping is applied.
pub fn apply_correction(
    pattern: &Pattern,
    table: &CorrectionTable,
    ignored_samples: usize,
) -> SlmResult<Pattern> {
    let axis = table.axis.pattern_axis();
    let line_count = pattern.len_of(axis);
    if line_count != table.len() {
        return Err(SlmError::Precondition(format!(
            "pattern has {line_count} lines along {:?} but the correction table covers {}",
            table.axis,
            table.len()
        )));
    }
    if let Some(&bad) = table.lines.iter().find(|&&b| b >= table.bins.len()) {
        return Err(SlmError::Calibration(format!(
            "line refers to bin {bad}, table has {}",
            table.bins.len()
        )));
    }

    let curves = table.curves(ignored_samples)?;
    let mut corrected = Pattern::zeros(pattern.raw_dim());

    for (line, (source, mut target)) in pattern
        .axis_iter(axis)
        .zip(corrected.axis_iter_mut(axis))
        .enumerate()
    {
        let curve = &curves[table.lines[line]];
        let phases: Vec<f64> = source.iter().map(|&g| grayscale_to_phase(g)).collect();
        let grayscales = curve.grayscales_for(&phases)?;
        for (out, g) in target.iter_mut().zip(grayscales) {
            *out = g as u16;
        }
    }
    Ok(corrected)
}

/// [`apply_correction`] writing the result back into `pattern`.
pub fn correct_in_place(
    pattern: &mut Pattern,
    table: &CorrectionTable,
    ignored_samples: usize,
) -> SlmResult<()> {
    let corrected = apply_correction(pattern, table, ignored_samples)?;
    pattern.assign(&corrected);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn cos2_sweep(period: f64) -> Sweep {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let intensities = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / period).cos().powi(2))
            .collect();
        Sweep::new(grayscales, intensities).unwrap()
    }

    fn two_bin_table(axis: DispersionAxis) -> CorrectionTable {
        CorrectionTable {
            axis,
            bins: vec![
                CalibrationBin {
                    wavelength_nm: 1100.0,
                    sweep: cos2_sweep(2046.0),
                },
                CalibrationBin {
                    wavelength_nm: 1400.0,
                    sweep: cos2_sweep(1400.0),
                },
            ],
            lines: vec![0, 1],
        }
    }

    fn expected(curve: &CalibrationCurve, g: u16) -> u16 {
        curve.grayscales_for(&[grayscale_to_phase(g)]).unwrap()[0] as u16
    }

    #[test]
    fn columns_follow_their_own_curve() {
        let table = two_bin_table(DispersionAxis::Columns);
        let curves = table.curves(1).unwrap();
        let pattern: Pattern = array![[256, 256], [0, 0], [400, 400]];

        let corrected = apply_correction(&pattern, &table, 1).unwrap();

        assert_eq!(corrected.dim(), (3, 2));
        for ((row, col), &g) in pattern.indexed_iter() {
            assert_eq!(corrected[[row, col]], expected(&curves[col], g));
        }
        // the two wavelengths must actually differ for this to mean anything
        assert_ne!(corrected[[0, 0]], corrected[[0, 1]]);
        assert_eq!(corrected[[1, 0]], 0);
    }

    #[test]
    fn rows_axis_is_the_transpose_of_columns() {
        let pattern: Pattern = array![[256, 100, 700], [50, 900, 0]];

        let by_rows = apply_correction(&pattern, &two_bin_table(DispersionAxis::Rows), 1).unwrap();
        let transposed = pattern.t().to_owned();
        let by_columns =
            apply_correction(&transposed, &two_bin_table(DispersionAxis::Columns), 1).unwrap();

        assert_eq!(by_rows, by_columns.t());
    }

    #[test]
    fn line_count_must_match_table() {
        let table = two_bin_table(DispersionAxis::Columns);
        let pattern: Pattern = Array2::zeros((2, 3));
        let err = apply_correction(&pattern, &table, 1).unwrap_err();
        assert!(matches!(err, SlmError::Precondition(_)));
    }

    #[test]
    fn knot_phases_round_trip_to_knot_grayscales() {
        // curve of cos²(πg/2046) has phase πg/1023, so nominal g/2 lands on knot g
        let table = CorrectionTable::uniform(cos2_sweep(2046.0), 1100.0, 1, DispersionAxis::Columns);
        let pattern: Pattern = array![[0], [50], [100], [150], [200], [400]];

        let corrected = apply_correction(&pattern, &table, 1).unwrap();

        let expected: Pattern = array![[0], [100], [200], [300], [400], [800]];
        assert_eq!(corrected, expected);
    }

    #[test]
    fn full_scale_maps_to_full_scale() {
        let table = CorrectionTable::uniform(cos2_sweep(2046.0), 1100.0, 2, DispersionAxis::Columns);
        let mut pattern: Pattern = array![[1023, 1023]];
        correct_in_place(&mut pattern, &table, 1).unwrap();
        assert_eq!(pattern, array![[1023, 1023]]);
    }

    #[test]
    fn from_sweep_picks_nearest_bins() {
        let grayscales: Vec<u16> = (0..=10).map(|k| k * 100).collect();
        let wavelengths = vec![1000.0, 1100.0, 1200.0, 1300.0];
        let mut intensities = Array2::zeros((grayscales.len(), wavelengths.len()));
        for (r, &g) in grayscales.iter().enumerate() {
            for c in 0..wavelengths.len() {
                let period = 2046.0 - 100.0 * c as f64;
                intensities[[r, c]] = (PI * f64::from(g) / period).cos().powi(2);
            }
        }
        let matrix = SweepMatrix::new(grayscales, wavelengths, intensities).unwrap();

        // lines at 1050, 1100, 1150, 1200, 1250, 1300
        let table =
            CorrectionTable::from_sweep(&matrix, 6, 1050.0, 1350.0, DispersionAxis::Columns).unwrap();

        assert_eq!(table.len(), 6);
        let wls: Vec<f64> = (0..6)
            .map(|l| table.bin_for_line(l).unwrap().wavelength_nm)
            .collect();
        assert_eq!(wls, vec![1000.0, 1100.0, 1100.0, 1200.0, 1200.0, 1300.0]);
        assert_eq!(table.bins.len(), 4);
        assert_eq!(table.bins[1].sweep, matrix.sweep_at(1).unwrap());
    }

    #[test]
    fn out_of_range_targets_surface_as_range_errors() {
        // the sweep ends on 1023 so nothing is appended and the curve stops short of 2π
        let grayscales = crate::calibration::sample_grayscales(12);
        let intensities = grayscales
            .iter()
            .map(|&g| (PI * f64::from(g) / 1500.0).cos().powi(2))
            .collect();
        let sweep = Sweep::new(grayscales, intensities).unwrap();
        let table = CorrectionTable::uniform(sweep, 1100.0, 1, DispersionAxis::Rows);

        assert!(apply_correction(&array![[0, 100]], &table, 1).is_ok());
        let err = apply_correction(&array![[0, 1023]], &table, 1).unwrap_err();
        assert!(err.is_range());
    }
}
