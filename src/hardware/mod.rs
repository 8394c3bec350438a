//! Instrument access for the SLM bench.
//!
//! - [`capabilities`]: the traits procedures are written against
//! - [`santec`]: the vendor-library driver
//! - [`background`]: dark-reading subtraction wrappers
//! - [`mock`]: a simulated bench for tests and dry runs

pub mod background;
pub mod capabilities;
pub mod mock;
pub mod santec;

pub use capabilities::{Camera, DisplayFlags, Dimensions, SlmDevice, Spectrometer, WavelengthPhase};
pub use santec::{check_status, status_description, SantecSlm};
