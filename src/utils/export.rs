use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::errors::AppError;

/// Create a temp file next to `path` so the final rename stays on one filesystem.
fn temp_file_beside(path: &Path) -> Result<NamedTempFile, AppError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", dir.display(), e)))?;
    NamedTempFile::new_in(dir)
        .map_err(|e| AppError::FileWrite(format!("Cannot create temp file in {}: {}", dir.display(), e)))
}

/// Swap the finished temp file into place. Readers see either the old or the new file.
fn commit(tmp: NamedTempFile, path: &Path) -> Result<(), AppError> {
    tmp.as_file()
        .sync_all()
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    tmp.persist(path)?;
    Ok(())
}

/// Write rows to a CSV file, replacing `path` atomically. The header comes from
/// the first row; `header` is written instead when there are no rows.
/// Returns the number of rows written.
pub fn write_csv_atomic<'a, T, I>(rows: I, header: &[&str], path: &Path) -> Result<usize, AppError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let tmp = temp_file_beside(path)?;
    let mut wtr = csv::Writer::from_writer(tmp);

    let mut written = 0;
    for row in rows {
        wtr.serialize(row)?;
        written += 1;
    }
    if written == 0 {
        wtr.write_record(header)?;
    }

    let tmp = wtr
        .into_inner()
        .map_err(|e| AppError::FileWrite(e.error().to_string()))?;
    commit(tmp, path)?;
    Ok(written)
}

/// Write a value as compact JSON, replacing `path` atomically.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    let mut tmp = temp_file_beside(path)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, value)?;
        writer
            .flush()
            .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }
    commit(tmp, path)
}
