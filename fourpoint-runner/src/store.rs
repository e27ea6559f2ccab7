//! Flat CSV store for canonical records, fundamentals snapshots and picks.
//!
//! Column order follows the struct field order, so the record file header is
//! always [`CanonicalRecord::HEADER`]. Missing values are empty cells.

use crate::ranking::Pick;
use fourpoint_core::assemble::{IngestReport, SeriesAssembler};
use fourpoint_core::data::CanonicalRecord;
use fourpoint_core::domain::FundamentalsSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path}: expected header {expected:?}, found {found:?}")]
    Header {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(io_err(path)),
        _ => Ok(()),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], append: bool) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let has_content = append && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(io_err(path))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!has_content)
        .from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(csv_err(path))?;
    }
    writer.flush().map_err(io_err(path))?;
    debug!(path = %path.display(), rows = rows.len(), append, "rows written");
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut reader = csv::Reader::from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err(path))
}

// ─── Canonical records ───────────────────────────────────────────────

/// Replace `path` with `records`.
pub fn write_records(path: &Path, records: &[CanonicalRecord]) -> Result<(), StoreError> {
    write_rows(path, records, false)
}

/// Append `records`, writing the header only when the file is new or empty.
pub fn append_records(path: &Path, records: &[CanonicalRecord]) -> Result<(), StoreError> {
    write_rows(path, records, true)
}

/// Read every record, checking the header first.
pub fn read_records(path: &Path) -> Result<Vec<CanonicalRecord>, StoreError> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut reader = csv::Reader::from_reader(file);
    let found: Vec<String> = reader
        .headers()
        .map_err(csv_err(path))?
        .iter()
        .map(str::to_string)
        .collect();
    if found.is_empty() {
        return Ok(Vec::new());
    }
    if found != CanonicalRecord::HEADER {
        return Err(StoreError::Header {
            path: path.to_path_buf(),
            expected: CanonicalRecord::HEADER.iter().map(|s| s.to_string()).collect(),
            found,
        });
    }
    reader
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err(path))
}

/// Load the store into a fresh assembler.
///
/// Rows are ingested in date order, so a store built from out-of-order runs
/// still assembles; a repeated symbol-date is rejected and reported.
pub fn load_assembler(path: &Path) -> Result<(SeriesAssembler, IngestReport), StoreError> {
    let mut records = read_records(path)?;
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
    let mut assembler = SeriesAssembler::new();
    let report = assembler.ingest(records);
    info!(
        path = %path.display(),
        symbols = assembler.len(),
        appended = report.appended,
        rejected = report.rejected.len(),
        "store loaded"
    );
    Ok((assembler, report))
}

// ─── Fundamentals and picks ──────────────────────────────────────────

pub fn write_snapshots(path: &Path, snapshots: &[FundamentalsSnapshot]) -> Result<(), StoreError> {
    write_rows(path, snapshots, false)
}

pub fn read_snapshots(path: &Path) -> Result<Vec<FundamentalsSnapshot>, StoreError> {
    read_rows(path)
}

pub fn write_picks(path: &Path, picks: &[Pick]) -> Result<(), StoreError> {
    write_rows(path, picks, false)
}

pub fn read_picks(path: &Path) -> Result<Vec<Pick>, StoreError> {
    read_rows(path)
}
