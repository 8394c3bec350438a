//! Persistence for calibration data.
//!
//! - Sweep matrices are stored as CSV: a header row of wavelengths, then one
//!   row per commanded grayscale. Lines starting with `#` carry metadata and
//!   are skipped on read.
//! - Correction tables are stored as pretty-printed JSON.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::calibration::{CorrectionTable, SweepMatrix};
use crate::error::{SlmError, SlmResult};

/// `<dir>/<name>.csv` and `<dir>/<name>.table.json`, creating `dir` if needed.
pub fn output_paths(dir: &Path, name: &str) -> SlmResult<(PathBuf, PathBuf)> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok((
        dir.join(format!("{name}.csv")),
        dir.join(format!("{name}.table.json")),
    ))
}

/// Write the sweep with a commented creation timestamp.
pub fn write_sweep_csv(path: &Path, matrix: &SweepMatrix) -> SlmResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "# created: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(
        file,
        "# rows: grayscale, columns: wavelength (nm), values: intensity"
    )?;

    let mut writer = csv::Writer::from_writer(file);
    let mut header = Vec::with_capacity(matrix.wavelengths.len() + 1);
    header.push("grayscale".to_string());
    header.extend(matrix.wavelengths.iter().map(|wl| wl.to_string()));
    writer.write_record(&header)?;

    for (grayscale, row) in matrix.grayscales.iter().zip(matrix.intensities.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(grayscale.to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = matrix.grayscales.len(), "sweep written");
    Ok(())
}

fn parse_field<T: std::str::FromStr>(field: &str, what: &str, line: u64) -> SlmResult<T> {
    field.trim().parse().map_err(|_| {
        SlmError::Storage(format!("line {line}: cannot parse {what} from {field:?}"))
    })
}

/// Read a sweep written by [`write_sweep_csv`]. The first header cell is ignored.
pub fn read_sweep_csv(path: &Path) -> SlmResult<SweepMatrix> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_path(path)?;

    let header = reader.headers()?.clone();
    let wavelengths = header
        .iter()
        .skip(1)
        .map(|field| parse_field::<f64>(field, "wavelength", 1))
        .collect::<SlmResult<Vec<f64>>>()?;
    if wavelengths.is_empty() {
        return Err(SlmError::Storage(format!(
            "{} has no wavelength columns",
            path.display()
        )));
    }

    let mut grayscales = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let mut fields = record.iter();
        let grayscale = fields
            .next()
            .ok_or_else(|| SlmError::Storage(format!("line {line}: empty record")))?;
        grayscales.push(parse_field::<u16>(grayscale, "grayscale", line)?);
        for field in fields {
            values.push(parse_field::<f64>(field, "intensity", line)?);
        }
    }

    let intensities = Array2::from_shape_vec((grayscales.len(), wavelengths.len()), values)
        .map_err(|e| SlmError::Storage(e.to_string()))?;
    SweepMatrix::new(grayscales, wavelengths, intensities)
}

/// Write a correction table as pretty-printed JSON.
pub fn save_table(path: &Path, table: &CorrectionTable) -> SlmResult<()> {
    let json = serde_json::to_string_pretty(table)?;
    fs::write(path, json)?;
    info!(path = %path.display(), lines = table.len(), bins = table.bins.len(), "correction table saved");
    Ok(())
}

/// Read a table written by [`save_table`], rejecting lines that point past `bins`.
pub fn load_table(path: &Path) -> SlmResult<CorrectionTable> {
    let text = fs::read_to_string(path)?;
    let table: CorrectionTable = serde_json::from_str(&text)?;
    if let Some(bad) = table.lines.iter().find(|&&bin| bin >= table.bins.len()) {
        return Err(SlmError::Storage(format!(
            "{}: line refers to bin {bad} but only {} bins are stored",
            path.display(),
            table.bins.len()
        )));
    }
    Ok(table)
}
