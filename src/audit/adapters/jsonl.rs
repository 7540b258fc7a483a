//! JSON-lines file sink.

use crate::audit::{
    domain::ActivityEvent,
    ports::{ActivitySink, ActivitySinkError},
};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlActivityLog {
    /// Opens (creating if needed) the log file at `path`.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`ActivitySinkError::Io`] when the directory or file cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ActivitySinkError> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        Ok(Self {
            path: log_path,
            file: Mutex::new(file),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivitySink for JsonlActivityLog {
    fn record(&self, event: &ActivityEvent) -> Result<(), ActivitySinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = self.file.lock().map_err(|_| ActivitySinkError::Poisoned)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
