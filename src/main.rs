//! CLI Entry Point for santec-slm
//!
//! Provides command-line access to:
//! - the grayscale calibration measurement (writes the sweep and a correction table)
//! - calibration curve extraction from a stored sweep
//! - sending generated, optionally corrected, patterns to the SLM
//! - polarizer alignment on the simulated bench
//!
//! # Usage
//!
//! ```bash
//! santec-slm --mock calibrate --output calibGray
//! santec-slm curve --sweep data/calibGray.csv --wavelength 1310
//! santec-slm send grating.toml --table data/calibGray.table.json
//! santec-slm info
//! ```
//!
//! On the vendor library, `info` also reports the video mode and whether the
//! controller is busy.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use figment::providers::Serialized;
use tracing::info;

use santec_slm::calibration::extract_curve;
use santec_slm::config::Settings;
use santec_slm::hardware::background::BackgroundSpectrometer;
use santec_slm::hardware::mock::MockBench;
use santec_slm::hardware::{Dimensions, SantecSlm, SlmDevice, Spectrometer, WavelengthPhase};
use santec_slm::logging;
use santec_slm::patterns::PatternSpec;
use santec_slm::procedures::{
    build_correction_table, GrayscaleCalibration, PolarizerAlignment, ProcedureContext,
};
use santec_slm::storage;
use santec_slm::SlmSession;

#[derive(Parser)]
#[command(name = "santec-slm")]
#[command(about = "Santec SLM pattern and phase calibration tool", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/santec.toml")]
    config: PathBuf,

    /// Use the simulated bench instead of the vendor library
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure a grayscale sweep and build a correction table
    Calibrate {
        /// Base file name (defaults to storage.file_name)
        #[arg(long)]
        output: Option<String>,
    },

    /// Print the calibration curve of one wavelength bin of a stored sweep
    Curve {
        /// Sweep CSV written by `calibrate`
        #[arg(long)]
        sweep: PathBuf,

        /// Wavelength (nm); the nearest bin is used
        #[arg(long)]
        wavelength: f64,

        /// Samples ignored around the minimum (defaults to calibration.ignored_samples)
        #[arg(long)]
        ignored: Option<usize>,
    },

    /// Generate a pattern from a TOML description and send it
    Send {
        /// Pattern description, e.g. `kind = "uniform"` and `phase = 512`
        pattern: PathBuf,

        /// Correction table to apply before sending
        #[arg(long)]
        table: Option<PathBuf>,
    },

    /// Locate the extinction setting for polarizer alignment
    Align,

    /// Connect and print the display size and wavelength setting
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut figment = Settings::figment(&cli.config);
    if cli.mock {
        figment = figment.merge(Serialized::default("device.mock", true));
    }
    let settings: Settings = figment
        .extract()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    settings.validate()?;
    logging::init_from_settings(&settings)?;

    match cli.command {
        Commands::Calibrate { output } => calibrate(&settings, output),
        Commands::Curve {
            sweep,
            wavelength,
            ignored,
        } => print_curve(&settings, sweep, wavelength, ignored),
        Commands::Send { pattern, table } => send(&settings, pattern, table),
        Commands::Align => align(&settings),
        Commands::Info => show_info(&settings),
    }
}

/// Session on the configured device, plus the bench when it is simulated.
fn open_session(settings: &Settings) -> Result<(SlmSession, Option<MockBench>)> {
    let (mut session, bench) = if settings.device.mock {
        let bench = MockBench::default();
        (SlmSession::new(Box::new(bench.slm())), Some(bench))
    } else {
        let slm = SantecSlm::new(settings.device.display_number, settings.device.slm_number);
        (SlmSession::new(Box::new(slm)), None)
    };
    session.connect().context("connecting to the SLM")?;
    Ok((session, bench))
}

fn calibrate(settings: &Settings, output: Option<String>) -> Result<()> {
    let (mut session, bench) = open_session(settings)?;
    let Some(bench) = bench else {
        bail!("no spectrometer driver is available for the physical bench; run with --mock");
    };

    let calibration = &settings.calibration;
    let spectrometer = BackgroundSpectrometer::new(bench.spectrometer())
        .with_subtraction(calibration.subtract_background);
    spectrometer.set_integration_time_us(calibration.integration_time_us)?;
    if calibration.subtract_background {
        bench.set_beam_blocked(true);
        spectrometer.capture_background()?;
        bench.set_beam_blocked(false);
    }
    info!(
        background = spectrometer.has_background(),
        integration_us = calibration.integration_time_us,
        "spectrometer ready"
    );

    let procedure = GrayscaleCalibration::new(calibration.clone());
    let matrix = {
        let mut ctx = ProcedureContext::new(&mut session)
            .with_spectrometer(&spectrometer)
            .on_progress(|p| {
                if p.current_step > 0 {
                    println!("[{:>3.0}%] {}", p.fraction() * 100.0, p.message);
                }
            });
        procedure.run(&mut ctx)?
    };

    let dims = session.dimensions()?;
    let correction = &settings.correction;
    let table = build_correction_table(
        &matrix,
        dims,
        correction.min_wavelength_nm,
        correction.max_wavelength_nm,
        correction.axis,
        calibration.ignored_samples,
    )?;

    let name = output.unwrap_or_else(|| settings.storage.file_name.clone());
    let (csv_path, table_path) = storage::output_paths(&settings.storage.output_dir, &name)?;
    storage::write_sweep_csv(&csv_path, &matrix)?;
    storage::save_table(&table_path, &table)?;

    println!(
        "Sweep: {} grayscales x {} wavelengths -> {}",
        matrix.grayscales.len(),
        matrix.wavelengths.len(),
        csv_path.display()
    );
    println!(
        "Correction table: {} lines, {} bins -> {}",
        table.len(),
        table.bins.len(),
        table_path.display()
    );
    session.set_correction_table(table);
    session.disconnect()?;
    Ok(())
}

fn print_curve(
    settings: &Settings,
    sweep: PathBuf,
    wavelength: f64,
    ignored: Option<usize>,
) -> Result<()> {
    let matrix = storage::read_sweep_csv(&sweep)
        .with_context(|| format!("reading {}", sweep.display()))?;
    let Some(idx) = matrix.nearest_wavelength_index(wavelength) else {
        bail!("{} has no wavelength bins", sweep.display());
    };
    let bin = matrix.sweep_at(idx)?;
    let ignored = ignored.unwrap_or(settings.calibration.ignored_samples);
    let curve = extract_curve(&bin.grayscales, &bin.intensities, ignored)?;

    println!("# wavelength bin: {} nm", matrix.wavelengths[idx]);
    println!("grayscale,phase_rad");
    for (g, phase) in curve.grayscales.iter().zip(&curve.phases) {
        println!("{g},{phase:.6}");
    }
    Ok(())
}

fn send(settings: &Settings, pattern: PathBuf, table: Option<PathBuf>) -> Result<()> {
    let text = fs::read_to_string(&pattern)
        .with_context(|| format!("reading {}", pattern.display()))?;
    let spec = PatternSpec::from_toml_str(&text)?;

    let (mut session, _bench) = open_session(settings)?;
    let sent = match table {
        Some(path) => {
            session.set_correction_table(storage::load_table(&path)?);
            session.send_corrected(&spec, settings.calibration.ignored_samples)?
        }
        None => session.send_generated(&spec)?,
    };
    info!(shape = ?sent.dim(), "pattern displayed");
    println!("Sent {:?} pattern of shape {:?}", spec, sent.dim());
    session.disconnect()?;
    Ok(())
}

fn align(settings: &Settings) -> Result<()> {
    let (mut session, bench) = open_session(settings)?;
    let Some(bench) = bench else {
        bail!("no camera driver is available for the physical bench; run with --mock");
    };

    let mut alignment = PolarizerAlignment::new(settings.polarizer.clone(), bench.camera());
    bench.set_beam_blocked(true);
    alignment.capture_background()?;
    bench.set_beam_blocked(false);

    let extrema = {
        let mut ctx = ProcedureContext::new(&mut session);
        alignment.find_extrema(&mut ctx)?
    };
    let contrast = alignment.measure_contrast(&session)?;
    println!(
        "Minimum at grayscale {}, maximum at grayscale {}",
        extrema.min_grayscale, extrema.max_grayscale
    );
    println!(
        "Minimum: {:.1}, Maximum: {:.1}, Extinction ratio: {:.4}",
        contrast.min_intensity, contrast.max_intensity, contrast.extinction_ratio
    );
    session.disconnect()?;
    Ok(())
}

fn show_info(settings: &Settings) -> Result<()> {
    if settings.device.mock {
        let (mut session, _bench) = open_session(settings)?;
        print_display(session.dimensions()?, session.wavelength_phase()?);
        session.disconnect()?;
        return Ok(());
    }

    let slm = SantecSlm::new(settings.device.display_number, settings.device.slm_number);
    slm.open().context("connecting to the SLM")?;
    print_display(slm.read_dimensions()?, slm.read_wavelength_phase()?);
    println!("Video mode: {:?}", slm.read_video_mode()?);
    println!("Controller: {:?}", slm.read_status()?);
    slm.close()?;
    Ok(())
}

fn print_display(dims: Dimensions, setting: WavelengthPhase) {
    println!("Display: {} x {} (width x height)", dims.width, dims.height);
    println!(
        "Wavelength: {} nm, phase range: {:.2} pi",
        setting.wavelength_nm,
        f64::from(setting.phase_x100) / 100.0
    );
}
