//! Calibration Procedures
//!
//! Measurement workflows that drive the SLM and read back an optical signal.
//!
//! # Key Concepts
//!
//! - **ProcedureContext**: the collaborators a procedure needs (session and
//!   spectrometer) handed over as typed references, resolved once
//! - **ProcedureProgress**: step counter reported to an optional observer
//! - **GrayscaleCalibration**: grayscale sweep read on a spectrometer
//! - **PolarizerAlignment**: camera-based helper for the 45° polarizer setup
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     ProcedureContext                       │
//! │   SlmSession  │  &dyn Spectrometer  │  progress observer   │
//! ├────────────────────────────────────────────────────────────┤
//! │  GrayscaleCalibration       PolarizerAlignment<Camera>     │
//! │  send → settle → spectrum   send → settle → intensity      │
//! ├────────────────────────────────────────────────────────────┤
//! │  SweepMatrix → CorrectionTable::from_sweep → session       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on the calling thread. Settling delays block with
//! `std::thread::sleep` and a sweep runs to completion or returns the first
//! error.

pub mod grayscale_calibration;
pub mod polarizer;

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{SlmError, SlmResult};
use crate::hardware::Spectrometer;
use crate::session::SlmSession;

pub use grayscale_calibration::{
    build_correction_table, line_count, CalibrationMode, GrayscaleCalibration,
    GrayscaleCalibrationConfig,
};
pub use polarizer::{ContrastMeasurement, Extrema, PolarizerAlignment, PolarizerAlignmentConfig};

/// Current state of a procedure execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureState {
    /// Not yet started
    Idle,
    /// Waiting for the device to settle before the first sample
    Settling,
    /// Sampling
    Running,
    /// Completed successfully
    Completed,
}

/// Progress information during execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureProgress {
    /// Phase of the run
    pub state: ProcedureState,
    /// Samples taken so far
    pub current_step: usize,
    /// Samples in the whole run
    pub total_steps: usize,
    /// Human-readable description of the step
    pub message: String,
}

impl ProcedureProgress {
    /// Overall progress (0.0 - 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.current_step as f64 / self.total_steps as f64
    }
}

type ProgressObserver<'a> = Box<dyn FnMut(&ProcedureProgress) + 'a>;

/// Collaborators for one procedure run.
pub struct ProcedureContext<'a> {
    /// Connected session the procedure drives.
    pub session: &'a mut SlmSession,
    spectrometer: Option<&'a dyn Spectrometer>,
    observer: Option<ProgressObserver<'a>>,
}

impl<'a> ProcedureContext<'a> {
    /// Context with only a session.
    pub fn new(session: &'a mut SlmSession) -> Self {
        Self {
            session,
            spectrometer: None,
            observer: None,
        }
    }

    /// Attach the spectrometer read by the grayscale calibration.
    pub fn with_spectrometer(mut self, spectrometer: &'a dyn Spectrometer) -> Self {
        self.spectrometer = Some(spectrometer);
        self
    }

    /// Receive a [`ProcedureProgress`] after every step.
    pub fn on_progress(mut self, observer: impl FnMut(&ProcedureProgress) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Attached spectrometer, or a precondition error.
    pub fn spectrometer(&self) -> SlmResult<&'a dyn Spectrometer> {
        self.spectrometer
            .ok_or_else(|| SlmError::not_connected("spectrometer"))
    }

    pub(crate) fn report(
        &mut self,
        state: ProcedureState,
        current_step: usize,
        total_steps: usize,
        message: impl Into<String>,
    ) {
        let progress = ProcedureProgress {
            state,
            current_step,
            total_steps,
            message: message.into(),
        };
        trace!(step = current_step, total = total_steps, "{}", progress.message);
        if let Some(observer) = self.observer.as_mut() {
            observer(&progress);
        }
    }
}

/// Block for `millis` milliseconds; zero returns immediately.
pub(crate) fn settle(millis: u64) {
    if millis > 0 {
        thread::sleep(Duration::from_millis(millis));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction() {
        let progress = ProcedureProgress {
            state: ProcedureState::Running,
            current_step: 3,
            total_steps: 12,
            message: String::new(),
        };
        assert!((progress.fraction() - 0.25).abs() < 1e-12);
        let empty = ProcedureProgress {
            total_steps: 0,
            ..progress
        };
        assert_eq!(empty.fraction(), 0.0);
    }
}
