//! Background subtraction for spectra and camera frames.
//!
//! Both wrappers record a reference reading taken with the beam blocked and
//! subtract it from later readings, clipping at zero. Until a reference is
//! recorded, readings pass through unchanged.

use ndarray::Array2;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{SlmError, SlmResult};
use crate::hardware::capabilities::{Camera, Spectrometer};

/// Spectrometer that subtracts a stored dark spectrum.
pub struct BackgroundSpectrometer<S> {
    inner: S,
    background: Mutex<Option<Vec<f64>>>,
    subtract: bool,
}

impl<S: Spectrometer> BackgroundSpectrometer<S> {
    /// Wrap `inner` with subtraction enabled and no background recorded.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            background: Mutex::new(None),
            subtract: true,
        }
    }

    /// Turn subtraction on or off without dropping the stored background.
    pub fn with_subtraction(mut self, subtract: bool) -> Self {
        self.subtract = subtract;
        self
    }

    /// Record the current spectrum as background.
    pub fn capture_background(&self) -> SlmResult<()> {
        let (wavelengths, intensities) = self.inner.read_spectrum()?;
        info!(bins = wavelengths.len(), "Spectrometer background set");
        *self.background.lock() = Some(intensities);
        Ok(())
    }

    /// Forget the recorded background.
    pub fn clear_background(&self) {
        *self.background.lock() = None;
    }

    /// Whether readings are currently background-subtracted.
    pub fn has_background(&self) -> bool {
        self.subtract && self.background.lock().is_some()
    }

    /// Wrapped spectrometer.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Spectrometer> Spectrometer for BackgroundSpectrometer<S> {
    fn read_spectrum(&self) -> SlmResult<(Vec<f64>, Vec<f64>)> {
        let (wavelengths, mut intensities) = self.inner.read_spectrum()?;
        if !self.subtract {
            return Ok((wavelengths, intensities));
        }
        if let Some(background) = self.background.lock().as_ref() {
            if background.len() != intensities.len() {
                return Err(SlmError::Precondition(format!(
                    "background has {} bins, spectrum has {}",
                    background.len(),
                    intensities.len()
                )));
            }
            for (v, b) in intensities.iter_mut().zip(background) {
                *v = (*v - b).max(0.0);
            }
        }
        Ok((wavelengths, intensities))
    }

    fn set_integration_time_us(&self, micros: u32) -> SlmResult<()> {
        self.inner.set_integration_time_us(micros)
    }
}

/// Camera reader reporting background-subtracted frames and their total intensity.
pub struct CameraIntensity<C> {
    camera: C,
    background: Mutex<Option<Array2<u16>>>,
}

impl<C: Camera> CameraIntensity<C> {
    /// Wrap `camera` with no background recorded.
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            background: Mutex::new(None),
        }
    }

    /// Record the current frame as background.
    pub fn capture_background(&self) -> SlmResult<()> {
        let frame = self.camera.read_image()?;
        info!(shape = ?frame.dim(), "Camera background set");
        *self.background.lock() = Some(frame);
        Ok(())
    }

    /// Whether a background frame has been recorded.
    pub fn has_background(&self) -> bool {
        self.background.lock().is_some()
    }

    /// Current frame minus the background, clipped at zero.
    pub fn processed_image(&self) -> SlmResult<Array2<u16>> {
        let frame = self.camera.read_image()?;
        match self.background.lock().as_ref() {
            None => Ok(frame),
            Some(background) if background.dim() != frame.dim() => {
                Err(SlmError::Precondition(format!(
                    "background frame is {:?}, camera frame is {:?}",
                    background.dim(),
                    frame.dim()
                )))
            }
            Some(background) => Ok(ndarray::Zip::from(&frame)
                .and(background)
                .map_collect(|&v, &b| v.saturating_sub(b))),
        }
    }

    /// Sum of the processed frame.
    pub fn intensity(&self) -> SlmResult<f64> {
        Ok(self
            .processed_image()?
            .iter()
            .map(|&v| f64::from(v))
            .sum())
    }
}
