//! Grayscale Calibration Procedure
//!
//! Sweeps the commanded grayscale and records a spectrum at every step:
//! 1. Drive phase 0 and wait for the display to settle
//! 2. For each of `sample_nb` grayscales spread over [0, 1023]: send, settle, read
//! 3. Keep the spectrometer bins within [min, max] wavelength
//! 4. Normalize the resulting grayscale x wavelength matrix
//!
//! Two modes are available. `GrayscaleCalibration` sends a uniform pattern and
//! expects the SLM between two polarizers at 45° to its operating axis.
//! `BinaryEfficiency` sends a 50% duty-cycle binary grating and expects a lens
//! at focal distance in front of the spectrometer.
//!
//! # Configuration
//!
//! ```toml
//! [calibration]
//! mode = "grayscale_calibration"
//! sample_nb = 30
//! interval_ms = 50
//! min_wavelength_nm = 1050.0
//! max_wavelength_nm = 1550.0
//! normalize = "per_wavelength"
//! ignored_samples = 1
//! integration_time_us = 10000
//! subtract_background = true
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{settle, ProcedureContext, ProcedureState};
use crate::calibration::{
    sample_grayscales, CorrectionTable, DispersionAxis, Normalization, SweepMatrix,
};
use crate::error::{SlmError, SlmResult};
use crate::hardware::Dimensions;
use crate::patterns::{BinaryGrating, PatternSpec, Uniform};

// =============================================================================
// Configuration
// =============================================================================

/// What is displayed at each step of the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Uniform pattern, polarizers at 45°.
    #[default]
    GrayscaleCalibration,
    /// Binary grating with 50% duty cycle.
    BinaryEfficiency,
}

/// Typed configuration for the grayscale sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayscaleCalibrationConfig {
    /// Pattern family displayed during the sweep
    #[serde(default)]
    pub mode: CalibrationMode,

    /// Number of commanded grayscales
    #[serde(default = "default_sample_nb")]
    pub sample_nb: usize,

    /// Settle time between sending a pattern and reading the spectrum
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Settle time after driving phase 0, before the first sample
    #[serde(default = "default_initial_settle_ms")]
    pub initial_settle_ms: u64,

    /// Shortest spectrometer bin kept
    #[serde(default = "default_min_wavelength")]
    pub min_wavelength_nm: f64,

    /// Longest spectrometer bin kept
    #[serde(default = "default_max_wavelength")]
    pub max_wavelength_nm: f64,

    /// Scaling applied to each bin before curve extraction
    #[serde(default)]
    pub normalize: Normalization,

    /// Spectrometer exposure applied before the sweep
    #[serde(default = "default_integration_time")]
    pub integration_time_us: u32,

    /// Subtract a dark spectrum recorded with the beam blocked
    #[serde(default = "default_subtract_background")]
    pub subtract_background: bool,

    /// Samples dropped on each side of the intensity minimum during extraction
    #[serde(default = "default_ignored_samples")]
    pub ignored_samples: usize,

    /// Grating period in `BinaryEfficiency` mode
    #[serde(default = "default_grating_period")]
    pub grating_period_px: usize,

    /// Grating lines run along the width instead of the height
    #[serde(default)]
    pub grating_horizontal: bool,
}

fn default_sample_nb() -> usize {
    30
}
fn default_interval_ms() -> u64 {
    50
}
fn default_initial_settle_ms() -> u64 {
    1000
}
fn default_min_wavelength() -> f64 {
    1050.0
}
fn default_max_wavelength() -> f64 {
    1550.0
}
fn default_integration_time() -> u32 {
    10_000
}
fn default_subtract_background() -> bool {
    true
}
fn default_ignored_samples() -> usize {
    1
}
fn default_grating_period() -> usize {
    25
}

impl Default for GrayscaleCalibrationConfig {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::default(),
            sample_nb: default_sample_nb(),
            interval_ms: default_interval_ms(),
            initial_settle_ms: default_initial_settle_ms(),
            min_wavelength_nm: default_min_wavelength(),
            max_wavelength_nm: default_max_wavelength(),
            normalize: Normalization::default(),
            integration_time_us: default_integration_time(),
            subtract_background: default_subtract_background(),
            ignored_samples: default_ignored_samples(),
            grating_period_px: default_grating_period(),
            grating_horizontal: false,
        }
    }
}

impl GrayscaleCalibrationConfig {
    /// Reject settings the sweep cannot run with.
    pub fn validate(&self) -> SlmResult<()> {
        if self.sample_nb < 2 {
            return Err(SlmError::Configuration(format!(
                "sample_nb must be at least 2, got {}",
                self.sample_nb
            )));
        }
        if !(self.min_wavelength_nm < self.max_wavelength_nm) {
            return Err(SlmError::Configuration(format!(
                "min_wavelength_nm ({}) must be below max_wavelength_nm ({})",
                self.min_wavelength_nm, self.max_wavelength_nm
            )));
        }
        if self.integration_time_us == 0 {
            return Err(SlmError::Configuration(
                "integration_time_us must be positive".into(),
            ));
        }
        if self.mode == CalibrationMode::BinaryEfficiency && self.grating_period_px < 2 {
            return Err(SlmError::Configuration(format!(
                "grating_period_px must be at least 2, got {}",
                self.grating_period_px
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Procedure Implementation
// =============================================================================

/// Grayscale sweep measured on a spectrometer.
#[derive(Debug, Clone, Default)]
pub struct GrayscaleCalibration {
    params: GrayscaleCalibrationConfig,
}

impl GrayscaleCalibration {
    /// Procedure with the given sweep settings.
    pub fn new(params: GrayscaleCalibrationConfig) -> Self {
        Self { params }
    }

    /// Sweep settings.
    pub fn params(&self) -> &GrayscaleCalibrationConfig {
        &self.params
    }

    /// Pattern displayed for one commanded grayscale.
    pub fn pattern_for(&self, grayscale: u16) -> PatternSpec {
        match self.params.mode {
            CalibrationMode::GrayscaleCalibration => PatternSpec::Uniform(Uniform { phase: grayscale }),
            CalibrationMode::BinaryEfficiency => PatternSpec::BinaryGrating(BinaryGrating {
                phase: grayscale,
                period_px: self.params.grating_period_px,
                duty_cycle: 0.5,
                horizontal: self.params.grating_horizontal,
            }),
        }
    }

    /// Run the sweep and return the normalized grayscale x wavelength matrix.
    #[instrument(skip(self, ctx), fields(mode = ?self.params.mode, samples = self.params.sample_nb))]
    pub fn run(&self, ctx: &mut ProcedureContext<'_>) -> SlmResult<SweepMatrix> {
        self.params.validate()?;
        let spectrometer = ctx.spectrometer()?;
        ctx.session.dimensions()?;
        spectrometer.set_integration_time_us(self.params.integration_time_us)?;
        debug!(integration_us = self.params.integration_time_us, "integration time set");

        let grayscales = sample_grayscales(self.params.sample_nb);
        let total = grayscales.len();

        ctx.report(ProcedureState::Settling, 0, total, "driving phase 0");
        ctx.session.send_generated(&self.pattern_for(0))?;
        settle(self.params.initial_settle_ms);

        let (min_wl, max_wl) = (self.params.min_wavelength_nm, self.params.max_wavelength_nm);
        let mut kept_wavelengths: Option<Vec<f64>> = None;
        let mut spectra = Vec::with_capacity(total);

        for (i, &grayscale) in grayscales.iter().enumerate() {
            ctx.session.send_generated(&self.pattern_for(grayscale))?;
            settle(self.params.interval_ms);

            let (wavelengths, values) = spectrometer.read_spectrum()?;
            if wavelengths.len() != values.len() {
                return Err(SlmError::Precondition(format!(
                    "spectrometer returned {} wavelengths and {} values",
                    wavelengths.len(),
                    values.len()
                )));
            }
            let (wls, kept): (Vec<f64>, Vec<f64>) = wavelengths
                .into_iter()
                .zip(values)
                .filter(|(wl, _)| (min_wl..=max_wl).contains(wl))
                .unzip();

            match &kept_wavelengths {
                None => kept_wavelengths = Some(wls),
                Some(first) if *first != wls => {
                    return Err(SlmError::Precondition(
                        "spectrometer wavelength axis changed during the sweep".into(),
                    ));
                }
                Some(_) => {}
            }
            debug!(grayscale, bins = kept.len(), "spectrum recorded");
            spectra.push(kept);
            ctx.report(
                ProcedureState::Running,
                i + 1,
                total,
                format!("grayscale {grayscale}"),
            );
        }

        let wavelengths = kept_wavelengths.unwrap_or_default();
        if wavelengths.is_empty() {
            return Err(SlmError::Calibration(format!(
                "no spectrometer bins within [{min_wl}, {max_wl}] nm"
            )));
        }

        let mut matrix = SweepMatrix::from_spectra(grayscales, wavelengths, spectra)?;
        matrix.normalize(self.params.normalize);

        info!(
            grayscales = matrix.grayscales.len(),
            wavelengths = matrix.wavelengths.len(),
            "grayscale calibration complete"
        );
        ctx.report(ProcedureState::Completed, total, total, "sweep complete");
        Ok(matrix)
    }
}

/// Number of display lines crossed by the dispersion axis.
pub fn line_count(dims: Dimensions, axis: DispersionAxis) -> usize {
    match axis {
        DispersionAxis::Columns => dims.width,
        DispersionAxis::Rows => dims.height,
    }
}

/// Build a correction table for the display from a measured sweep and check
/// that every bin it uses yields a calibration curve.
pub fn build_correction_table(
    matrix: &SweepMatrix,
    dims: Dimensions,
    min_wavelength_nm: f64,
    max_wavelength_nm: f64,
    axis: DispersionAxis,
    ignored_samples: usize,
) -> SlmResult<CorrectionTable> {
    let table = CorrectionTable::from_sweep(
        matrix,
        line_count(dims, axis),
        min_wavelength_nm,
        max_wavelength_nm,
        axis,
    )?;
    table.curves(ignored_samples)?;
    Ok(table)
}
