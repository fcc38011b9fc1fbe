use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::dataset::Dataset;
use crate::errors::AppError;
use crate::models::config::CollectorConfig;
use crate::models::record::{DatasetKind, Record};
use crate::utils::export::write_csv_atomic;

/// Columns every dataset file must carry to be usable at all.
const KEY_COLUMNS: [&str; 2] = ["coin", "time"];

/// On-disk home of the funding and volume datasets (one CSV file each).
#[derive(Debug, Clone)]
pub struct DatasetStore {
    funding_path: PathBuf,
    volume_path: PathBuf,
}

impl DatasetStore {
    pub fn new(funding_path: impl Into<PathBuf>, volume_path: impl Into<PathBuf>) -> Self {
        DatasetStore {
            funding_path: funding_path.into(),
            volume_path: volume_path.into(),
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(
            config.dataset_path(DatasetKind::Funding),
            config.dataset_path(DatasetKind::Volume),
        )
    }

    pub fn path(&self, kind: DatasetKind) -> &Path {
        match kind {
            DatasetKind::Funding => &self.funding_path,
            DatasetKind::Volume => &self.volume_path,
        }
    }

    /// Load the dataset for `R`.
    ///
    /// A missing file, an unreadable header or a header without the key
    /// columns all yield an empty dataset. Rows that fail to parse are
    /// skipped. Known-bad timestamps for the kind are stripped. Only I/O
    /// failures on an existing file are returned as errors.
    pub fn load<R: Record>(&self) -> Result<Dataset<R>, AppError> {
        let kind = R::KIND;
        let path = self.path(kind);

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No existing {} data file found at {}. Starting fresh.", kind, path.display());
                return Ok(Dataset::new());
            }
            Err(e) => {
                return Err(AppError::FileRead(format!("{}: {}", path.display(), e)));
            }
        };

        let mut rdr = csv::Reader::from_reader(BufReader::new(file));
        let headers = match rdr.headers() {
            Ok(h) => h.clone(),
            Err(e) => {
                warn!("Unreadable header in {} ({}). Using empty dataset.", path.display(), e);
                return Ok(Dataset::new());
            }
        };
        if let Some(missing) = KEY_COLUMNS
            .iter()
            .find(|col| !headers.iter().any(|h| h.trim() == **col))
        {
            warn!(
                "'{}' column not found in {} CSV. Using empty dataset.",
                missing, kind
            );
            return Ok(Dataset::new());
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in rdr.deserialize::<R>() {
            match row {
                Ok(record) => records.push(record),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} malformed rows in {}", skipped, path.display());
        }

        let (dataset, removed) = Dataset::from_records(records).without_timestamps(kind.known_bad_timestamps());
        if removed > 0 {
            info!("Removed {} {} entries with known-incomplete timestamps", removed, kind);
        }
        info!("Loaded existing {} data with {} rows.", kind, dataset.len());
        Ok(dataset)
    }

    /// Persist the full dataset for `R`, replacing the previous file atomically.
    pub fn save<R: Record>(&self, dataset: &Dataset<R>) -> Result<usize, AppError> {
        let path = self.path(R::KIND);
        let written = write_csv_atomic(dataset.iter(), R::COLUMNS, path)?;
        info!("Saved {} data to {} with {} rows.", R::KIND, path.display(), written);
        Ok(written)
    }
}
