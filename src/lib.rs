//! # Santec SLM Control Library
//!
//! This crate drives a Santec spatial light modulator through the vendor
//! `SLMFunc` library, generates phase patterns for it, and calibrates the
//! mapping from the 10-bit grayscale command to the optical phase actually
//! imposed at each wavelength. The `santec-slm` binary is a thin CLI over it.
//!
//! ## Crate Structure
//!
//! - **`calibration`**: sweep data, calibration curve extraction, piecewise
//!   linear interpolation and per-line phase correction of patterns.
//! - **`config`**: figment-based `Settings` loaded from TOML and environment.
//! - **`error`**: the `SlmError` enum used across the crate.
//! - **`hardware`**: device capability traits, the vendor driver, background
//!   subtraction and a simulated bench.
//! - **`logging`**: tracing-subscriber initialization.
//! - **`patterns`**: pattern generators (uniform, gratings, slits, pinhole).
//! - **`procedures`**: grayscale calibration and polarizer alignment runs.
//! - **`session`**: `SlmSession`, owner of the device handle and the
//!   current correction table.
//! - **`storage`**: CSV and JSON persistence of calibration data.

pub mod calibration;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod patterns;
pub mod procedures;
pub mod session;
pub mod storage;

pub use error::{SlmError, SlmResult};
pub use session::SlmSession;
