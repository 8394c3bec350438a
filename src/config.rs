//! Configuration System using Figment
//!
//! Settings are loaded from:
//! 1. a TOML file (base configuration, optional)
//! 2. Environment variables prefixed with `SANTEC_SLM_`, with `__` separating
//!    nested keys
//!
//! Every section has defaults, so an empty or missing file yields a usable
//! configuration for the standard bench.
//!
//! # Example
//! ```no_run
//! use santec_slm::config::Settings;
//!
//! // SANTEC_SLM_CALIBRATION__SAMPLE_NB=60 overrides the file
//! let settings = Settings::load_from("config/santec.toml")?;
//! settings.validate()?;
//! println!("Application: {}", settings.application.name);
//! # Ok::<(), santec_slm::error::SlmError>(())
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::calibration::DispersionAxis;
use crate::error::{SlmError, SlmResult};
use crate::logging::OutputFormat;
use crate::procedures::{GrayscaleCalibrationConfig, PolarizerAlignmentConfig};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[application]`
    pub application: ApplicationConfig,
    /// `[device]`
    pub device: DeviceConfig,
    /// `[calibration]`: grayscale sweep parameters
    pub calibration: GrayscaleCalibrationConfig,
    /// `[polarizer]`
    pub polarizer: PolarizerAlignmentConfig,
    /// `[correction]`
    pub correction: CorrectionConfig,
    /// `[storage]`
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Display name used in log output
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Subscriber output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// SLM connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Monitor number the SLM display is attached to
    #[serde(default = "default_display_number")]
    pub display_number: u32,
    /// USB controller number (1-8)
    #[serde(default = "default_slm_number")]
    pub slm_number: u32,
    /// Use the simulated bench instead of the vendor library
    #[serde(default)]
    pub mock: bool,
}

/// How measured sweeps map onto display lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Wavelength assumed at the first display line
    #[serde(default = "default_min_wavelength")]
    pub min_wavelength_nm: f64,
    /// Wavelength approached by the last display line
    #[serde(default = "default_max_wavelength")]
    pub max_wavelength_nm: f64,
    /// Display axis along which the wavelength changes
    #[serde(default)]
    pub axis: DispersionAxis,
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Output directory for sweeps and correction tables
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Base file name for a calibration run
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

// Default value functions
fn default_name() -> String {
    "Santec SLM".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_display_number() -> u32 {
    2
}

fn default_slm_number() -> u32 {
    1
}

fn default_min_wavelength() -> f64 {
    1050.0
}

fn default_max_wavelength() -> f64 {
    1400.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_name() -> String {
    "calibGrayscale".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            display_number: default_display_number(),
            slm_number: default_slm_number(),
            mock: false,
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_wavelength_nm: default_min_wavelength(),
            max_wavelength_nm: default_max_wavelength(),
            axis: DispersionAxis::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: default_file_name(),
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Settings {
    /// File plus environment, before extraction. Callers may merge further
    /// providers (e.g. command-line overrides) on top.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SANTEC_SLM_").split("__"))
    }

    /// Load configuration from a TOML file and `SANTEC_SLM_` environment variables.
    ///
    /// Example: `SANTEC_SLM_APPLICATION__LOG_LEVEL=debug`
    pub fn load_from<P: AsRef<Path>>(path: P) -> SlmResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> SlmResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(SlmError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        if !(1..=8).contains(&self.device.slm_number) {
            return Err(SlmError::Configuration(format!(
                "Invalid slm_number {}. Must be 1-8",
                self.device.slm_number
            )));
        }

        self.calibration.validate()?;

        if self.polarizer.sample_nb < 2 {
            return Err(SlmError::Configuration(format!(
                "polarizer sample_nb must be at least 2, got {}",
                self.polarizer.sample_nb
            )));
        }

        if !(self.correction.min_wavelength_nm < self.correction.max_wavelength_nm) {
            return Err(SlmError::Configuration(format!(
                "correction min_wavelength_nm ({}) must be below max_wavelength_nm ({})",
                self.correction.min_wavelength_nm, self.correction.max_wavelength_nm
            )));
        }

        if self.storage.file_name.trim().is_empty() {
            return Err(SlmError::Configuration("storage file_name is empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Normalization;
    use crate::procedures::CalibrationMode;
    use figment::providers::Serialized;
    use std::fs;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings = Figment::new()
            .merge(Toml::file(dir.path().join("absent.toml")))
            .extract()
            .unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.device.display_number, 2);
        assert_eq!(settings.calibration.sample_nb, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("santec.toml");
        fs::write(
            &path,
            r#"
[application]
log_level = "debug"
log_format = "json"

[device]
slm_number = 3
mock = true

[calibration]
mode = "binary_efficiency"
sample_nb = 12
normalize = "per_wavelength"

[correction]
axis = "rows"
min_wavelength_nm = 1000.0
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.application.log_format, OutputFormat::Json);
        assert_eq!(settings.device.slm_number, 3);
        assert!(settings.device.mock);
        assert_eq!(settings.calibration.mode, CalibrationMode::BinaryEfficiency);
        assert_eq!(settings.calibration.sample_nb, 12);
        assert_eq!(settings.calibration.interval_ms, 50);
        assert_eq!(settings.calibration.normalize, Normalization::PerWavelength);
        assert_eq!(settings.correction.axis, DispersionAxis::Rows);
        assert_eq!(settings.correction.max_wavelength_nm, 1400.0);
        assert_eq!(settings.calibration.max_wavelength_nm, 1550.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn later_providers_win() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings = Settings::figment(dir.path().join("absent.toml"))
            .merge(Serialized::default("device.mock", true))
            .extract()
            .unwrap();
        assert!(settings.device.mock);
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut settings = Settings::default();
        settings.application.log_level = "verbose".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.device.slm_number = 9;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.calibration.sample_nb = 1;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.correction.max_wavelength_nm = 900.0;
        assert!(matches!(settings.validate(), Err(SlmError::Configuration(_))));
    }
}
