//! Mock Hardware Implementations
//!
//! A simulated optical bench for running the calibration procedures without
//! the Santec SLM, the spectrometer or the camera attached.
//!
//! # Available Mocks
//!
//! - `MockSlm` - Simulated SLM display + USB controller
//! - `MockSpectrometer` - Spectrum of the light transmitted through the bench
//! - `MockCamera` - Flat frame whose brightness follows the same transmission
//!
//! All three share one [`MockBench`] state, so what is written to the SLM
//! shows up in the spectrometer and camera readings.
//!
//! # Optical Model
//!
//! The SLM sits between two parallel polarizers at `polarizer_angle_deg` to
//! its operating axis. A pixel at grayscale `g` retards light of wavelength
//! `λ` by
//!
//! ```text
//! Γ(g, λ) = offset + depth · 2π · (g / 1023) · (reference_wl / λ)
//! ```
//!
//! and transmits `1 - sin²(2α)·sin²(Γ/2)`, i.e. `cos²(Γ/2)` at 45°.
//! Readings average this over every pixel of the last pattern written.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{SlmError, SlmResult};
use crate::hardware::capabilities::{
    Camera, DisplayFlags, Dimensions, SlmDevice, Spectrometer, WavelengthPhase,
};
use crate::hardware::santec::status_description;

const GRAY_LEVELS: usize = 1024;

/// Simple pseudo-random number generator (LCG) for reproducible noise.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fff_ffff
}

/// Physical parameters of the simulated bench.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalModel {
    /// Wavelength at which `depth` is specified (nm).
    pub reference_wavelength_nm: f64,
    /// Retardance at grayscale 1023 and the reference wavelength, in waves.
    pub depth: f64,
    /// Retardance at grayscale 0 (rad).
    pub offset_rad: f64,
    /// Angle between the polarizers and the SLM operating axis.
    pub polarizer_angle_deg: f64,
    /// Counts per spectrometer bin at full transmission and 10 ms integration.
    pub spectrometer_peak: f64,
    /// Dark counts per spectrometer bin.
    pub spectrometer_dark: f64,
    /// Counts per camera pixel at full transmission.
    pub camera_peak: f64,
    /// Dark counts per camera pixel.
    pub camera_dark: u16,
    /// Wavelength seen by the camera (nm).
    pub camera_wavelength_nm: f64,
    /// Relative amplitude of uniform noise added to each spectrometer bin.
    pub noise: f64,
}

impl Default for OpticalModel {
    fn default() -> Self {
        Self {
            reference_wavelength_nm: 1050.0,
            depth: 0.95,
            offset_rad: 0.0,
            polarizer_angle_deg: 45.0,
            spectrometer_peak: 10_000.0,
            spectrometer_dark: 50.0,
            camera_peak: 200.0,
            camera_dark: 20,
            camera_wavelength_nm: 1064.0,
            noise: 0.0,
        }
    }
}

impl OpticalModel {
    /// Retardance (rad) of grayscale `g` at `wavelength_nm`.
    pub fn retardance(&self, grayscale: u16, wavelength_nm: f64) -> f64 {
        self.offset_rad
            + self.depth
                * 2.0
                * PI
                * (f64::from(grayscale) / 1023.0)
                * (self.reference_wavelength_nm / wavelength_nm)
    }

    /// Fraction of light transmitted by a pixel at grayscale `g`.
    pub fn transmission(&self, grayscale: u16, wavelength_nm: f64) -> f64 {
        let visibility = (2.0 * self.polarizer_angle_deg.to_radians()).sin().powi(2);
        1.0 - visibility * (self.retardance(grayscale, wavelength_nm) / 2.0).sin().powi(2)
    }
}

#[derive(Debug)]
struct BenchState {
    display_open: bool,
    usb_open: bool,
    dimensions: Dimensions,
    setting: WavelengthPhase,
    saved_setting: Option<WavelengthPhase>,
    /// Pixel count per grayscale level of the displayed image.
    histogram: Vec<u64>,
    last_pattern: Option<Array2<u16>>,
    pattern_writes: usize,
    beam_blocked: bool,
    integration_us: u32,
    readings: u64,
}

impl BenchState {
    fn fill(&mut self, value: u16) {
        self.histogram.iter_mut().for_each(|c| *c = 0);
        let pixels = (self.dimensions.width * self.dimensions.height) as u64;
        self.histogram[usize::from(value).min(GRAY_LEVELS - 1)] = pixels.max(1);
    }

    fn mean_transmission(&self, model: &OpticalModel, wavelength_nm: f64) -> f64 {
        if self.beam_blocked {
            return 0.0;
        }
        let total: u64 = self.histogram.iter().sum();
        if total == 0 {
            return 1.0;
        }
        let weighted: f64 = self
            .histogram
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(g, &count)| count as f64 * model.transmission(g as u16, wavelength_nm))
            .sum();
        weighted / total as f64
    }
}

/// Builder for [`MockBench`].
#[derive(Debug, Clone)]
pub struct MockBenchBuilder {
    model: OpticalModel,
    dimensions: Dimensions,
    setting: WavelengthPhase,
    wavelengths: Vec<f64>,
    camera_shape: (usize, usize),
}

impl Default for MockBenchBuilder {
    fn default() -> Self {
        Self {
            model: OpticalModel::default(),
            dimensions: Dimensions {
                height: 1200,
                width: 1920,
            },
            setting: WavelengthPhase {
                wavelength_nm: 1550,
                phase_x100: 200,
            },
            wavelengths: (0..=120).map(|i| 1000.0 + 5.0 * f64::from(i)).collect(),
            camera_shape: (32, 32),
        }
    }
}

impl MockBenchBuilder {
    /// Replace the optical model.
    pub fn model(mut self, model: OpticalModel) -> Self {
        self.model = model;
        self
    }

    /// Display size reported by the SLM.
    pub fn dimensions(mut self, height: usize, width: usize) -> Self {
        self.dimensions = Dimensions { height, width };
        self
    }

    /// Controller setting read back at connect time.
    pub fn wavelength_phase(mut self, wavelength_nm: u32, phase_x100: u32) -> Self {
        self.setting = WavelengthPhase {
            wavelength_nm,
            phase_x100,
        };
        self
    }

    /// Spectrometer bins (nm).
    pub fn wavelengths(mut self, wavelengths: Vec<f64>) -> Self {
        self.wavelengths = wavelengths;
        self
    }

    /// Camera frame shape.
    pub fn camera_shape(mut self, height: usize, width: usize) -> Self {
        self.camera_shape = (height, width);
        self
    }

    /// Create the bench with the display closed and showing grayscale 0.
    pub fn build(self) -> MockBench {
        let mut state = BenchState {
            display_open: false,
            usb_open: false,
            dimensions: self.dimensions,
            setting: self.setting,
            saved_setting: None,
            histogram: vec![0; GRAY_LEVELS],
            last_pattern: None,
            pattern_writes: 0,
            beam_blocked: false,
            integration_us: 10_000,
            readings: 0,
        };
        state.fill(0);
        MockBench {
            model: Arc::new(self.model),
            wavelengths: Arc::new(self.wavelengths),
            camera_shape: self.camera_shape,
            state: Arc::new(Mutex::new(state)),
        }
    }
}

/// Shared state of the simulated bench. Clones share the same bench.
#[derive(Debug, Clone)]
pub struct MockBench {
    model: Arc<OpticalModel>,
    wavelengths: Arc<Vec<f64>>,
    camera_shape: (usize, usize),
    state: Arc<Mutex<BenchState>>,
}

impl Default for MockBench {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MockBench {
    /// Builder starting from a 1920x1200 display and 1000-1600 nm bins.
    pub fn builder() -> MockBenchBuilder {
        MockBenchBuilder::default()
    }

    /// Optical model shared by every instrument on the bench.
    pub fn model(&self) -> &OpticalModel {
        &self.model
    }

    /// SLM handle on this bench.
    pub fn slm(&self) -> MockSlm {
        MockSlm {
            bench: self.clone(),
        }
    }

    /// Spectrometer handle on this bench.
    pub fn spectrometer(&self) -> MockSpectrometer {
        MockSpectrometer {
            bench: self.clone(),
        }
    }

    /// Camera handle on this bench.
    pub fn camera(&self) -> MockCamera {
        MockCamera {
            bench: self.clone(),
        }
    }

    /// Block or unblock the beam, e.g. to record a background.
    pub fn set_beam_blocked(&self, blocked: bool) {
        self.state.lock().beam_blocked = blocked;
    }

    /// Last pattern written with `write_pattern`.
    pub fn last_pattern(&self) -> Option<Array2<u16>> {
        self.state.lock().last_pattern.clone()
    }

    /// Number of successful `write_pattern` calls.
    pub fn pattern_writes(&self) -> usize {
        self.state.lock().pattern_writes
    }

    /// Setting persisted with `save_wavelength_phase`.
    pub fn saved_wavelength_phase(&self) -> Option<WavelengthPhase> {
        self.state.lock().saved_setting
    }

    /// Integration time currently applied to the spectrometer.
    pub fn integration_time_us(&self) -> u32 {
        self.state.lock().integration_us
    }

    /// Whether both the display and the USB channel are open.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        state.display_open && state.usb_open
    }
}

fn status_error(code: i32, context: &str) -> SlmError {
    SlmError::Device {
        code,
        description: status_description(code),
        context: context.to_string(),
    }
}

/// Simulated SLM.
#[derive(Debug, Clone)]
pub struct MockSlm {
    bench: MockBench,
}

impl MockSlm {
    fn require_display(&self, context: &str) -> SlmResult<parking_lot::MutexGuard<'_, BenchState>> {
        let state = self.bench.state.lock();
        if !state.display_open {
            return Err(status_error(santec_sys::SLM_NOT_OPEN_MONITOR, context));
        }
        Ok(state)
    }

    fn require_usb(&self, context: &str) -> SlmResult<parking_lot::MutexGuard<'_, BenchState>> {
        let state = self.bench.state.lock();
        if !state.usb_open {
            return Err(status_error(santec_sys::SLM_NOT_OPEN_USB, context));
        }
        Ok(state)
    }
}

impl SlmDevice for MockSlm {
    fn open(&self) -> SlmResult<()> {
        let mut state = self.bench.state.lock();
        state.display_open = true;
        state.usb_open = true;
        debug!("MockSlm: opened");
        Ok(())
    }

    fn close(&self) -> SlmResult<()> {
        let mut state = self.bench.state.lock();
        state.display_open = false;
        state.usb_open = false;
        debug!("MockSlm: closed");
        Ok(())
    }

    fn write_grayscale(&self, value: u16) -> SlmResult<()> {
        let mut state = self.require_display("write grayscale")?;
        state.fill(value);
        Ok(())
    }

    fn write_pattern(
        &self,
        width: usize,
        height: usize,
        _flags: DisplayFlags,
        data: &[u16],
    ) -> SlmResult<()> {
        let mut state = self.require_display("write pattern")?;
        if data.len() != width * height {
            return Err(SlmError::Precondition(format!(
                "pattern buffer has {} values, display is {width}x{height}",
                data.len()
            )));
        }
        if width != state.dimensions.width || height != state.dimensions.height {
            return Err(status_error(santec_sys::SLM_DATA_FORMAT_ERR, "write pattern"));
        }
        let pattern = Array2::from_shape_vec((height, width), data.to_vec())
            .map_err(|e| SlmError::Precondition(e.to_string()))?;

        state.histogram.iter_mut().for_each(|c| *c = 0);
        for &g in data {
            state.histogram[usize::from(g).min(GRAY_LEVELS - 1)] += 1;
        }
        state.last_pattern = Some(pattern);
        state.pattern_writes += 1;
        Ok(())
    }

    fn read_dimensions(&self) -> SlmResult<Dimensions> {
        Ok(self.require_display("read display info")?.dimensions)
    }

    fn write_wavelength_phase(&self, setting: WavelengthPhase) -> SlmResult<()> {
        self.require_usb("write wavelength/phase")?.setting = setting;
        Ok(())
    }

    fn read_wavelength_phase(&self) -> SlmResult<WavelengthPhase> {
        Ok(self.require_usb("read wavelength/phase")?.setting)
    }

    fn save_wavelength_phase(&self) -> SlmResult<()> {
        let mut state = self.require_usb("save wavelength/phase")?;
        state.saved_setting = Some(state.setting);
        Ok(())
    }
}

/// Simulated spectrometer looking at the light transmitted by the bench.
#[derive(Debug, Clone)]
pub struct MockSpectrometer {
    bench: MockBench,
}

impl Spectrometer for MockSpectrometer {
    fn read_spectrum(&self) -> SlmResult<(Vec<f64>, Vec<f64>)> {
        let model = &self.bench.model;
        let mut state = self.bench.state.lock();
        state.readings += 1;
        let scale = f64::from(state.integration_us) / 10_000.0;
        let seed = state.readings.wrapping_mul(2654435761);

        let intensities = self
            .bench
            .wavelengths
            .iter()
            .enumerate()
            .map(|(i, &wl)| {
                let signal = model.spectrometer_peak * scale * state.mean_transmission(model, wl);
                let noise = if model.noise > 0.0 {
                    let r = prng(seed ^ i as u64) as f64 / f64::from(0x7fff_ffff_u32);
                    (r - 0.5) * 2.0 * model.noise * model.spectrometer_peak * scale
                } else {
                    0.0
                };
                (signal + noise).max(0.0) + model.spectrometer_dark
            })
            .collect();
        Ok((self.bench.wavelengths.to_vec(), intensities))
    }

    fn set_integration_time_us(&self, micros: u32) -> SlmResult<()> {
        if micros == 0 {
            return Err(SlmError::Precondition(
                "integration time must be positive".into(),
            ));
        }
        self.bench.state.lock().integration_us = micros;
        Ok(())
    }
}

/// Simulated camera: a flat frame scaled by the bench transmission.
#[derive(Debug, Clone)]
pub struct MockCamera {
    bench: MockBench,
}

impl Camera for MockCamera {
    fn read_image(&self) -> SlmResult<Array2<u16>> {
        let model = &self.bench.model;
        let state = self.bench.state.lock();
        let transmission = state.mean_transmission(model, model.camera_wavelength_nm);
        let value = (model.camera_peak * transmission) as u16 + model.camera_dark;
        Ok(Array2::from_elem(self.bench.camera_shape, value))
    }
}
