//! Hardware Capabilities
//!
//! Small capability traits implemented by the instruments on the SLM bench:
//!
//! - the SLM itself implements [`SlmDevice`]
//! - the spectrometer implements [`Spectrometer`]
//! - the camera used for polarizer alignment implements [`Camera`]
//!
//! Procedures are written against these traits so that the vendor driver
//! and the simulated bench in [`crate::hardware::mock`] are interchangeable.
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is synchronous: every call blocks until the instrument answers
//! - Is thread-safe (requires Send + Sync) and takes `&self`; state lives
//!   behind interior mutability
//! - Returns [`SlmResult`], with non-OK vendor status codes mapped to
//!   [`SlmError::Device`](crate::error::SlmError::Device)
//! - Focuses on ONE instrument role
//!
//! # Example
//!
//! ```rust,ignore
//! fn show_uniform<D: SlmDevice + ?Sized>(slm: &D, value: u16) -> SlmResult<()> {
//!     slm.open()?;
//!     slm.write_grayscale(value)?;
//!     slm.close()
//! }
//! ```

use bitflags::bitflags;
use ndarray::Array2;

use crate::error::SlmResult;

bitflags! {
    /// Flags accepted by the display write calls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFlags: u32 {
        /// Red channel only.
        const R = santec_sys::FLAGS_COLOR_R;
        /// Green channel only.
        const G = santec_sys::FLAGS_COLOR_G;
        /// Blue channel only.
        const B = santec_sys::FLAGS_COLOR_B;
        /// Grayscale data, used for every pattern write.
        const GRAY = santec_sys::FLAGS_COLOR_GRAY;
        /// 10-bit color data.
        const COLOR_10BIT = santec_sys::FLAGS_COLOR_10BIT;
        /// 120 Hz frame rate.
        const RATE120 = santec_sys::FLAGS_RATE120;
    }
}

impl DisplayFlags {
    /// No color processing (`FLAGS_COLOR_NOP`).
    pub const NOP: Self = Self::empty();
}

/// Physical size of the display in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    /// Rows of pixels.
    pub height: usize,
    /// Columns of pixels.
    pub width: usize,
}

impl Dimensions {
    /// Shape of a pattern filling the display, `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Wavelength/phase setting stored in the SLM controller.
///
/// The controller expects `phase_x100` as the maximum phase in units of
/// 0.01π (e.g. 200 for 2π).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WavelengthPhase {
    /// Design wavelength in nm.
    pub wavelength_nm: u32,
    /// Maximum phase in 0.01π.
    pub phase_x100: u32,
}

/// Capability: Spatial Light Modulator
///
/// A display addressed with 10-bit grayscale values plus a USB control
/// channel for controller settings.
///
/// # Contract
/// - `open` must succeed before any other call; otherwise the device reports
///   a "not opened" status.
/// - `write_pattern` takes a row-major buffer of exactly `width * height`
///   values.
/// - `save_wavelength_phase` persists the current setting across power
///   cycles.
pub trait SlmDevice: Send + Sync {
    /// Open the display and the control channel.
    fn open(&self) -> SlmResult<()>;

    /// Close whatever `open` acquired.
    fn close(&self) -> SlmResult<()>;

    /// Fill the whole display with one grayscale.
    fn write_grayscale(&self, value: u16) -> SlmResult<()>;

    /// Write a row-major grayscale buffer to the display.
    fn write_pattern(
        &self,
        width: usize,
        height: usize,
        flags: DisplayFlags,
        data: &[u16],
    ) -> SlmResult<()>;

    /// Display size in pixels.
    fn read_dimensions(&self) -> SlmResult<Dimensions>;

    /// Change the controller wavelength/phase setting.
    fn write_wavelength_phase(&self, setting: WavelengthPhase) -> SlmResult<()>;

    /// Current controller wavelength/phase setting.
    fn read_wavelength_phase(&self) -> SlmResult<WavelengthPhase>;

    /// Persist the current setting across power cycles.
    fn save_wavelength_phase(&self) -> SlmResult<()>;
}

/// Capability: Spectrum Acquisition
pub trait Spectrometer: Send + Sync {
    /// Read one spectrum as `(wavelengths_nm, intensities)` of equal length.
    fn read_spectrum(&self) -> SlmResult<(Vec<f64>, Vec<f64>)>;

    /// Exposure applied to the following reads, in microseconds.
    fn set_integration_time_us(&self, micros: u32) -> SlmResult<()>;
}

/// Capability: Image Acquisition
pub trait Camera: Send + Sync {
    /// Read one frame, shape `(height, width)`.
    fn read_image(&self) -> SlmResult<Array2<u16>>;
}
