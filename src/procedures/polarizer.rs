//! Polarizer Alignment Helper
//!
//! Helps set the two polarizers at 45° to the SLM operating axis. With the
//! polarizers aligned, driving the display through its grayscale range swings
//! the camera intensity between full transmission and near extinction.
//!
//! 1. Record a camera background with the beam blocked
//! 2. Sample the background-subtracted intensity at 40 grayscales
//! 3. Keep the grayscales of the darkest and brightest samples
//! 4. Re-measure at those two settings and report the extinction ratio
//!
//! The extrema are taken directly from the samples. Rotate the polarizers
//! until the extinction ratio stops improving.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{settle, ProcedureContext, ProcedureState};
use crate::calibration::sample_grayscales;
use crate::error::{SlmError, SlmResult};
use crate::hardware::background::CameraIntensity;
use crate::hardware::Camera;
use crate::patterns::Uniform;
use crate::session::SlmSession;

/// Typed configuration for polarizer alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizerAlignmentConfig {
    /// Number of grayscales sampled over [0, 1023]
    #[serde(default = "default_sample_nb")]
    pub sample_nb: usize,

    /// Settle time between sending a pattern and reading the camera
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Settle time after driving phase 0
    #[serde(default = "default_initial_settle_ms")]
    pub initial_settle_ms: u64,
}

fn default_sample_nb() -> usize {
    40
}
fn default_interval_ms() -> u64 {
    50
}
fn default_initial_settle_ms() -> u64 {
    1000
}

impl Default for PolarizerAlignmentConfig {
    fn default() -> Self {
        Self {
            sample_nb: default_sample_nb(),
            interval_ms: default_interval_ms(),
            initial_settle_ms: default_initial_settle_ms(),
        }
    }
}

/// Grayscales of the darkest and brightest samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extrema {
    /// Grayscale of the darkest sample.
    pub min_grayscale: u16,
    /// Grayscale of the brightest sample.
    pub max_grayscale: u16,
}

/// Intensities at the two extrema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastMeasurement {
    /// Camera intensity at `min_grayscale`.
    pub min_intensity: f64,
    /// Camera intensity at `max_grayscale`.
    pub max_intensity: f64,
    /// `min_intensity / max_intensity`
    pub extinction_ratio: f64,
}

/// Camera-based search for the extinction setting.
pub struct PolarizerAlignment<C> {
    params: PolarizerAlignmentConfig,
    camera: CameraIntensity<C>,
    extrema: Option<Extrema>,
}

impl<C: Camera> PolarizerAlignment<C> {
    /// Helper reading `camera`, with no background and no extrema yet.
    pub fn new(params: PolarizerAlignmentConfig, camera: C) -> Self {
        Self {
            params,
            camera: CameraIntensity::new(camera),
            extrema: None,
        }
    }

    /// Record the current frame as background. Block the beam first.
    pub fn capture_background(&self) -> SlmResult<()> {
        self.camera.capture_background()
    }

    /// Result of the last [`find_extrema`](Self::find_extrema).
    pub fn extrema(&self) -> Option<Extrema> {
        self.extrema
    }

    fn intensity_at(&self, session: &SlmSession, grayscale: u16) -> SlmResult<f64> {
        session.send_generated(&Uniform { phase: grayscale })?;
        settle(self.params.interval_ms);
        self.camera.intensity()
    }

    /// Sample the grayscale range and keep the darkest and brightest settings.
    #[instrument(skip(self, ctx), fields(samples = self.params.sample_nb))]
    pub fn find_extrema(&mut self, ctx: &mut ProcedureContext<'_>) -> SlmResult<Extrema> {
        if self.params.sample_nb < 2 {
            return Err(SlmError::Configuration(format!(
                "sample_nb must be at least 2, got {}",
                self.params.sample_nb
            )));
        }
        if !self.camera.has_background() {
            warn!("no camera background recorded; intensities include dark counts");
        }
        let grayscales = sample_grayscales(self.params.sample_nb);
        let total = grayscales.len();

        ctx.report(ProcedureState::Settling, 0, total, "driving phase 0");
        self.intensity_at(ctx.session, 0)?;
        settle(self.params.initial_settle_ms);

        let mut samples = Vec::with_capacity(total);
        for (i, &grayscale) in grayscales.iter().enumerate() {
            samples.push((grayscale, self.intensity_at(ctx.session, grayscale)?));
            ctx.report(ProcedureState::Running, i + 1, total, format!("grayscale {grayscale}"));
        }

        let mut min = samples[0];
        let mut max = samples[0];
        for &sample in &samples[1..] {
            if sample.1 < min.1 {
                min = sample;
            }
            if sample.1 > max.1 {
                max = sample;
            }
        }
        let extrema = Extrema {
            min_grayscale: min.0,
            max_grayscale: max.0,
        };
        info!(
            min_grayscale = extrema.min_grayscale,
            max_grayscale = extrema.max_grayscale,
            "polarizer extrema located"
        );
        ctx.report(ProcedureState::Completed, total, total, "extrema located");
        self.extrema = Some(extrema);
        Ok(extrema)
    }

    /// Measure intensity at the stored extrema.
    pub fn measure_contrast(&self, session: &SlmSession) -> SlmResult<ContrastMeasurement> {
        let extrema = self.extrema.ok_or_else(|| {
            SlmError::Precondition("locate the intensity extrema before measuring contrast".into())
        })?;
        let min_intensity = self.intensity_at(session, extrema.min_grayscale)?;
        let max_intensity = self.intensity_at(session, extrema.max_grayscale)?;
        if max_intensity <= 0.0 {
            return Err(SlmError::Calibration(
                "camera sees no light at the brightest setting".into(),
            ));
        }
        let measurement = ContrastMeasurement {
            min_intensity,
            max_intensity,
            extinction_ratio: min_intensity / max_intensity,
        };
        info!(
            min_intensity,
            max_intensity,
            extinction_ratio = measurement.extinction_ratio,
            "contrast measured"
        );
        Ok(measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{MockBench, OpticalModel};
    use tracing_test::traced_test;

    fn fast() -> PolarizerAlignmentConfig {
        PolarizerAlignmentConfig {
            interval_ms: 0,
            initial_settle_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn contrast_needs_extrema() {
        let bench = MockBench::builder().dimensions(2, 2).build();
        let mut session = SlmSession::new(Box::new(bench.slm()));
        session.connect().unwrap();
        let alignment = PolarizerAlignment::new(fast(), bench.camera());
        assert!(matches!(
            alignment.measure_contrast(&session),
            Err(SlmError::Precondition(_))
        ));
    }

    #[test]
    fn aligned_polarizers_reach_high_extinction() {
        let bench = MockBench::builder()
            .dimensions(2, 2)
            .camera_shape(4, 4)
            .model(OpticalModel {
                camera_peak: 60_000.0,
                ..OpticalModel::default()
            })
            .build();
        let mut session = SlmSession::new(Box::new(bench.slm()));
        session.connect().unwrap();
        let mut alignment = PolarizerAlignment::new(fast(), bench.camera());

        bench.set_beam_blocked(true);
        alignment.capture_background().unwrap();
        bench.set_beam_blocked(false);

        let extrema = {
            let mut ctx = ProcedureContext::new(&mut session);
            alignment.find_extrema(&mut ctx).unwrap()
        };
        // half a wave at 1064 nm sits near grayscale 546
        assert_eq!(extrema.min_grayscale, 550);
        assert_eq!(extrema.max_grayscale, 0);

        let contrast = alignment.measure_contrast(&session).unwrap();
        assert!(contrast.extinction_ratio < 1e-3);
        assert!(contrast.max_intensity > 0.9 * 60_000.0 * 16.0);
    }

    #[test]
    #[traced_test]
    fn dark_counts_stay_without_background() {
        let bench = MockBench::builder().dimensions(2, 2).camera_shape(2, 2).build();
        let mut session = SlmSession::new(Box::new(bench.slm()));
        session.connect().unwrap();
        let mut alignment = PolarizerAlignment::new(fast(), bench.camera());
        {
            let mut ctx = ProcedureContext::new(&mut session);
            alignment.find_extrema(&mut ctx).unwrap();
        }
        assert!(logs_contain("no camera background recorded"));

        // 20 dark counts per pixel remain at extinction
        let contrast = alignment.measure_contrast(&session).unwrap();
        assert!(contrast.min_intensity >= 4.0 * 20.0);
    }

    #[test]
    fn misaligned_polarizers_show_poor_extinction() {
        let bench = MockBench::builder()
            .dimensions(2, 2)
            .camera_shape(4, 4)
            .model(OpticalModel {
                camera_peak: 60_000.0,
                polarizer_angle_deg: 20.0,
                ..OpticalModel::default()
            })
            .build();
        let mut session = SlmSession::new(Box::new(bench.slm()));
        session.connect().unwrap();
        let mut alignment = PolarizerAlignment::new(fast(), bench.camera());
        bench.set_beam_blocked(true);
        alignment.capture_background().unwrap();
        bench.set_beam_blocked(false);

        {
            let mut ctx = ProcedureContext::new(&mut session);
            alignment.find_extrema(&mut ctx).unwrap();
        }
        let contrast = alignment.measure_contrast(&session).unwrap();
        assert!(contrast.extinction_ratio > 0.5);
    }
}
