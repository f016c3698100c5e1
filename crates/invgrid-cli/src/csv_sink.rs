//! File-backed record sink: one CSV file per collection.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use invgrid_core::{RecordSink, SinkError, SinkValue};

/// Appends rows to `<dir>/<collection>.csv`.
pub struct CsvSink {
    dir: PathBuf,
    // Serializes appends so rows from concurrent writers never interleave.
    lock: Mutex<()>,
}

impl CsvSink {
    /// Open a sink rooted at `dir`, creating the directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a collection.
    pub fn path(&self, collection: &str) -> PathBuf {
        let name: String = collection
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.csv", name))
    }
}

impl RecordSink for CsvSink {
    fn append(&self, collection: &str, values: &[SinkValue]) -> Result<(), SinkError> {
        let append_error = |reason: String| SinkError::Append {
            collection: collection.to_string(),
            reason,
        };

        let _guard = self
            .lock
            .lock()
            .map_err(|_| append_error("sink lock poisoned".to_string()))?;

        let path = self.path(collection);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
        wtr.write_record(values.iter().map(|v| v.display()))
            .map_err(|e| append_error(e.to_string()))?;
        wtr.flush()?;

        debug!("Appended {} values to {}", values.len(), path.display());
        Ok(())
    }
}
