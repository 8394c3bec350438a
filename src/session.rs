//! The SLM session.
//!
//! [`SlmSession`] owns everything that is global to one connection: the
//! device handle, the display dimensions read at connect time, the
//! controller wavelength/phase setting and the current [`CorrectionTable`].
//! Pattern generators and procedures receive the session explicitly instead
//! of looking collaborators up by name.
//!
//! ## Lifecycle
//!
//! - **`connect`**: opens the device, caches dimensions and the wavelength setting.
//! - **`send_*`**: write patterns; every call fails with a precondition error
//!   while disconnected.
//! - **`set_correction_table`**: replaces the table wholesale after a
//!   calibration run; it is only ever read by `send_corrected`.
//! - **`disconnect`**: closes the device.

use tracing::{debug, info, instrument};

use crate::calibration::{apply_correction, CorrectionTable, MAX_GRAYSCALE};
use crate::error::{SlmError, SlmResult};
use crate::hardware::{Dimensions, DisplayFlags, SlmDevice, WavelengthPhase};
use crate::patterns::{Pattern, PatternGenerator};

/// One connection to an SLM and the calibration data used with it.
pub struct SlmSession {
    device: Box<dyn SlmDevice>,
    dimensions: Option<Dimensions>,
    setting: Option<WavelengthPhase>,
    correction: Option<CorrectionTable>,
}

impl std::fmt::Debug for SlmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlmSession")
            .field("dimensions", &self.dimensions)
            .field("setting", &self.setting)
            .field("has_correction", &self.correction.is_some())
            .finish()
    }
}

impl SlmSession {
    /// Session over `device`, not yet connected.
    pub fn new(device: Box<dyn SlmDevice>) -> Self {
        Self {
            device,
            dimensions: None,
            setting: None,
            correction: None,
        }
    }

    /// Underlying device handle.
    pub fn device(&self) -> &dyn SlmDevice {
        self.device.as_ref()
    }

    /// Open the device and cache its dimensions and wavelength setting.
    #[instrument(skip(self))]
    pub fn connect(&mut self) -> SlmResult<()> {
        self.device.open()?;
        let dimensions = self.device.read_dimensions()?;
        let setting = self.device.read_wavelength_phase()?;
        info!(
            height = dimensions.height,
            width = dimensions.width,
            wavelength_nm = setting.wavelength_nm,
            phase_x100 = setting.phase_x100,
            "SLM connected"
        );
        self.dimensions = Some(dimensions);
        self.setting = Some(setting);
        Ok(())
    }

    /// Close the device. Does nothing when not connected.
    pub fn disconnect(&mut self) -> SlmResult<()> {
        if self.dimensions.take().is_none() {
            return Ok(());
        }
        self.setting = None;
        self.device.close()?;
        info!("SLM disconnected");
        Ok(())
    }

    /// Whether `connect` succeeded and `disconnect` has not been called since.
    pub fn is_connected(&self) -> bool {
        self.dimensions.is_some()
    }

    /// Display size read at connect time.
    pub fn dimensions(&self) -> SlmResult<Dimensions> {
        self.dimensions.ok_or_else(|| SlmError::not_connected("SLM"))
    }

    /// Controller setting read at connect time or last written.
    pub fn wavelength_phase(&self) -> SlmResult<WavelengthPhase> {
        self.setting.ok_or_else(|| SlmError::not_connected("SLM"))
    }

    /// Write a full-display pattern.
    pub fn send_pattern(&self, pattern: &Pattern) -> SlmResult<()> {
        let dims = self.dimensions()?;
        if pattern.dim() != dims.shape() {
            return Err(SlmError::Precondition(format!(
                "pattern shape {:?} does not match display (height, width) {:?}",
                pattern.dim(),
                dims.shape()
            )));
        }
        if let Some(&value) = pattern.iter().find(|&&v| v > MAX_GRAYSCALE) {
            return Err(SlmError::Precondition(format!(
                "pattern value {value} exceeds {MAX_GRAYSCALE}"
            )));
        }
        let data: Vec<u16> = pattern.iter().copied().collect();
        self.device
            .write_pattern(dims.width, dims.height, DisplayFlags::GRAY, &data)?;
        debug!(height = dims.height, width = dims.width, "pattern sent");
        Ok(())
    }

    /// Generate a pattern for this display and send it. Returns what was sent.
    pub fn send_generated(&self, generator: &dyn PatternGenerator) -> SlmResult<Pattern> {
        let pattern = generator.generate(self.dimensions()?)?;
        self.send_pattern(&pattern)?;
        Ok(pattern)
    }

    /// Generate, correct with the session's table and send. Returns what was sent.
    pub fn send_corrected(
        &self,
        generator: &dyn PatternGenerator,
        ignored_samples: usize,
    ) -> SlmResult<Pattern> {
        let table = self.correction.as_ref().ok_or_else(|| {
            SlmError::Precondition("no correction table loaded; run a calibration first".into())
        })?;
        let pattern = generator.generate(self.dimensions()?)?;
        let corrected = apply_correction(&pattern, table, ignored_samples)?;
        self.send_pattern(&corrected)?;
        Ok(corrected)
    }

    /// Write the controller wavelength/phase setting, optionally persisting it.
    #[instrument(skip(self))]
    pub fn update_wavelength(
        &mut self,
        wavelength_nm: u32,
        phase_x100: u32,
        persist: bool,
    ) -> SlmResult<()> {
        self.dimensions()?;
        let setting = WavelengthPhase {
            wavelength_nm,
            phase_x100,
        };
        self.device.write_wavelength_phase(setting)?;
        if persist {
            self.device.save_wavelength_phase()?;
        }
        self.setting = Some(setting);
        info!(wavelength_nm, phase_x100, persist, "wavelength setting updated");
        Ok(())
    }

    /// Replace the correction table used by `send_corrected`.
    pub fn set_correction_table(&mut self, table: CorrectionTable) {
        info!(lines = table.len(), bins = table.bins.len(), "correction table replaced");
        self.correction = Some(table);
    }

    /// Current correction table, if any.
    pub fn correction_table(&self) -> Option<&CorrectionTable> {
        self.correction.as_ref()
    }

    /// Remove and return the current correction table.
    pub fn clear_correction_table(&mut self) -> Option<CorrectionTable> {
        self.correction.take()
    }
}
