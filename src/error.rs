//! Custom error types for the application.
//!
//! This module defines the primary error type, `SlmError`, for the entire crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur, from device status codes and calibration domain
//! violations to configuration and file I/O.
//!
//! ## Error Hierarchy
//!
//! - **`Device`**: a non-OK status code returned by the vendor library. Carries the
//!   raw code, the description looked up from the fixed status table, and the
//!   operation that failed. Fatal to the current operation.
//! - **`Range`**: an interpolation target lies outside the calibrated domain. The
//!   correction refuses to extrapolate.
//! - **`Precondition`**: the device was used before a connection was established, or
//!   a pattern does not fit the display.
//! - **`Calibration`**: a sweep could not be turned into a usable calibration curve
//!   (empty input, mismatched lengths, too few usable samples, non-finite phases).
//! - **`Storage`**: a stored sweep or table file is malformed.
//! - **`Config`**, **`Io`**, **`Csv`**, **`Serialization`**: wrap the errors of the
//!   underlying crates so `?` works throughout.
//!
//! None of these are retried anywhere; they abort the action that raised them.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type SlmResult<T> = std::result::Result<T, SlmError>;

/// Primary error type for the crate.
#[derive(Error, Debug)]
pub enum SlmError {
    /// Non-OK status returned by the vendor library.
    #[error("{context}: SLM returned error code {code}. Description: {description}")]
    Device {
        /// Raw status code.
        code: i32,
        /// Entry of the fixed status table.
        description: &'static str,
        /// Operation that failed.
        context: String,
    },

    /// Interpolation target outside the calibrated domain.
    #[error("Linear interpolation failed: target {value} not in range [{min}, {max}]")]
    Range {
        /// Lowest calibrated value.
        min: f64,
        /// Highest calibrated value.
        max: f64,
        /// Offending target.
        value: f64,
    },

    /// Device used before `connect`, or a pattern that does not fit the display.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Sweep that cannot produce a calibration curve.
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Settings could not be extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Settings extracted but rejected by validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Malformed sweep or table file.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SlmError {
    /// Status code carried by a `Device` error.
    pub fn device_code(&self) -> Option<i32> {
        match self {
            SlmError::Device { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error came from the calibrated-domain check.
    pub fn is_range(&self) -> bool {
        matches!(self, SlmError::Range { .. })
    }

    pub(crate) fn not_connected(what: &str) -> Self {
        SlmError::Precondition(format!("{what} is not connected"))
    }
}
