//! End-to-end calibration on the simulated bench.
//!
//! Measures a grayscale sweep through the mock spectrometer, builds a
//! correction table, stores and reloads it, then checks that corrected
//! patterns produce the intended retardance on every display line.

use santec_slm::calibration::{
    apply_correction, correct_in_place, grayscale_to_phase, DispersionAxis, Normalization,
    SweepMatrix,
};
use santec_slm::hardware::background::BackgroundSpectrometer;
use santec_slm::hardware::mock::{MockBench, OpticalModel};
use santec_slm::patterns::{BlazedGrating, PatternGenerator, Uniform};
use santec_slm::procedures::{
    build_correction_table, GrayscaleCalibration, GrayscaleCalibrationConfig, ProcedureContext,
};
use santec_slm::{storage, SlmError, SlmSession};

fn fast_config() -> GrayscaleCalibrationConfig {
    GrayscaleCalibrationConfig {
        interval_ms: 0,
        initial_settle_ms: 0,
        normalize: Normalization::PerWavelength,
        ..GrayscaleCalibrationConfig::default()
    }
}

fn measure(bench: &MockBench, session: &mut SlmSession) -> SweepMatrix {
    let spectrometer = BackgroundSpectrometer::new(bench.spectrometer());
    bench.set_beam_blocked(true);
    spectrometer.capture_background().unwrap();
    bench.set_beam_blocked(false);
    assert!(spectrometer.has_background());

    let mut ctx = ProcedureContext::new(session).with_spectrometer(&spectrometer);
    let matrix = GrayscaleCalibration::new(fast_config()).run(&mut ctx).unwrap();
    matrix
}

fn connected(bench: &MockBench) -> SlmSession {
    let mut session = SlmSession::new(Box::new(bench.slm()));
    session.connect().unwrap();
    session
}

#[test]
fn corrected_patterns_hit_the_intended_retardance() {
    let bench = MockBench::builder().dimensions(3, 16).build();
    let mut session = connected(&bench);
    let matrix = measure(&bench, &mut session);
    let config = fast_config();

    let table = build_correction_table(
        &matrix,
        session.dimensions().unwrap(),
        config.min_wavelength_nm,
        config.max_wavelength_nm,
        DispersionAxis::Columns,
        config.ignored_samples,
    )
    .unwrap();
    session.set_correction_table(table.clone());

    for nominal in [150_u16, 300, 500] {
        let sent = session
            .send_corrected(&Uniform { phase: nominal }, config.ignored_samples)
            .unwrap();
        assert_eq!(bench.last_pattern().unwrap(), sent);

        let target = grayscale_to_phase(nominal);
        for (col, &g) in sent.row(0).iter().enumerate() {
            let wavelength = table.bin_for_line(col).unwrap().wavelength_nm;
            let achieved = bench.model().retardance(g, wavelength);
            assert!(
                (achieved - target).abs() < 0.03,
                "column {col} at {wavelength} nm: grayscale {g} gives {achieved}, wanted {target}"
            );
        }
    }
}

#[test]
fn stored_calibration_reproduces_the_same_correction() {
    let bench = MockBench::builder().dimensions(2, 8).build();
    let mut session = connected(&bench);
    let matrix = measure(&bench, &mut session);
    let config = fast_config();
    let dims = session.dimensions().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (csv_path, table_path) = storage::output_paths(dir.path(), "calibGray").unwrap();
    storage::write_sweep_csv(&csv_path, &matrix).unwrap();

    let reloaded = storage::read_sweep_csv(&csv_path).unwrap();
    assert_eq!(reloaded, matrix);

    let table = build_correction_table(
        &reloaded,
        dims,
        config.min_wavelength_nm,
        config.max_wavelength_nm,
        DispersionAxis::Columns,
        config.ignored_samples,
    )
    .unwrap();
    storage::save_table(&table_path, &table).unwrap();
    let loaded = storage::load_table(&table_path).unwrap();
    assert_eq!(loaded, table);

    let grating = BlazedGrating {
        period_px: 2,
        max_phase: 600,
        horizontal: false,
    };
    let pattern = grating.generate(dims).unwrap();
    let corrected = apply_correction(&pattern, &loaded, config.ignored_samples).unwrap();

    let mut in_place = pattern.clone();
    correct_in_place(&mut in_place, &table, config.ignored_samples).unwrap();
    assert_eq!(in_place, corrected);

    // row 0 is the zero-phase part of the ramp
    assert!(corrected.row(0).iter().all(|&g| g == 0));
    assert!(corrected.row(1).iter().all(|&g| g >= 600));
}

#[test]
fn rows_axis_corrects_along_the_height() {
    let bench = MockBench::builder().dimensions(12, 3).build();
    let mut session = connected(&bench);
    let matrix = measure(&bench, &mut session);
    let config = fast_config();

    let table = build_correction_table(
        &matrix,
        session.dimensions().unwrap(),
        config.min_wavelength_nm,
        config.max_wavelength_nm,
        DispersionAxis::Rows,
        config.ignored_samples,
    )
    .unwrap();
    assert_eq!(table.len(), 12);
    session.set_correction_table(table);

    let sent = session
        .send_corrected(&Uniform { phase: 300 }, config.ignored_samples)
        .unwrap();
    for row in sent.rows() {
        assert!(row.iter().all(|&g| g == row[0]));
    }
    let first_column = sent.column(0).to_vec();
    assert!(first_column.windows(2).all(|w| w[1] >= w[0]));
    assert!(first_column[11] > first_column[0]);
}

#[test]
fn unmodulated_sweep_cannot_calibrate() {
    // polarizers along the SLM axis: the display changes phase, not intensity
    let bench = MockBench::builder()
        .dimensions(2, 4)
        .model(OpticalModel {
            polarizer_angle_deg: 0.0,
            ..OpticalModel::default()
        })
        .build();
    let mut session = connected(&bench);
    let matrix = measure(&bench, &mut session);

    let err = build_correction_table(
        &matrix,
        session.dimensions().unwrap(),
        1050.0,
        1550.0,
        DispersionAxis::Columns,
        1,
    )
    .unwrap_err();
    assert!(matches!(err, SlmError::Calibration(_)), "{err}");
}

#[test]
fn targets_beyond_the_curve_are_range_errors() {
    let bench = MockBench::builder().dimensions(2, 4).build();
    let mut session = connected(&bench);
    let matrix = measure(&bench, &mut session);
    let table = build_correction_table(
        &matrix,
        session.dimensions().unwrap(),
        1500.0,
        1550.0,
        DispersionAxis::Columns,
        1,
    )
    .unwrap();
    session.set_correction_table(table);

    // a full wave of retardance is out of reach near 1500 nm
    let err = session.send_corrected(&Uniform { phase: 1000 }, 1).unwrap_err();
    assert!(err.is_range(), "{err}");
}
