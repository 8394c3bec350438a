//! Grayscale-to-phase calibration and correction.
//!
//! The SLM takes a 10-bit grayscale command per pixel, but the optical phase it
//! imposes is neither linear in that command nor the same at every wavelength.
//! This module turns raw calibration sweeps into phase maps and uses them to
//! pre-distort patterns before they are written to the display.
//!
//! # Pipeline
//!
//! ```text
//! SweepMatrix (intensity[grayscale][wavelength])
//!     │  CorrectionTable::from_sweep   one sweep per display line
//!     ▼
//! CorrectionTable ──extract_curve──▶ CalibrationCurve (grayscale → phase)
//!                                           │  interpolate(phase → grayscale)
//! Pattern (grayscale = intended phase) ─────┴──▶ corrected Pattern
//! ```
//!
//! The sweep is captured with the SLM between two polarizers at 45° to its
//! operating axis, so the transmitted intensity follows `cos²` of half the
//! retardation. [`curve::extract_curve`] inverts that law, resolving the
//! two-fold `acos` ambiguity from the local slope and stitching the branches
//! into one continuous curve.

pub mod correction;
pub mod curve;
pub mod interpolate;
pub mod sweep;

pub use correction::{
    apply_correction, correct_in_place, grayscale_to_phase, CalibrationBin, CorrectionTable,
    DispersionAxis,
};
pub use curve::{extract_curve, CalibrationCurve};
pub use interpolate::interpolate;
pub use sweep::{sample_grayscales, Normalization, Sweep, SweepMatrix, MAX_GRAYSCALE};
