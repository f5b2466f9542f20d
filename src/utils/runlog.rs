//! The [`RunLog`] logging context passed to every pipeline stage.

use chrono::prelude::*;
use color_eyre::eyre::{Report, Result, WrapErr};
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Logging context for one run or one batch.
///
/// Every message is forwarded to the [`log`] facade (console, filtered by `RUST_LOG`) and
/// appended with a timestamp to each log file attached to the context.
///
/// ```rust
/// use arts::utils::runlog::RunLog;
/// let dir = tempfile::tempdir()?;
/// let log = RunLog::new("arts").with_file(&dir.path().join("arts-query.log"))?;
/// log.info("Milestone_1_complete");
/// let content = std::fs::read_to_string(dir.path().join("arts-query.log"))?;
/// assert!(content.ends_with("INFO - Milestone_1_complete\n"));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct RunLog {
    name: String,
    files: Vec<Arc<Mutex<File>>>,
}

impl RunLog {
    /// A console-only logging context.
    pub fn new(name: &str) -> Self {
        RunLog { name: name.to_string(), files: Vec::new() }
    }

    /// Attach a log file (created or appended to).
    pub fn with_file(mut self, path: &Path) -> Result<Self, Report> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("Failed to open log file: {path:?}"))?;
        self.files.push(Arc::new(Mutex::new(file)));
        Ok(self)
    }

    /// A context for a sub-run that also writes to every file of this context (ex. `combined.log`).
    pub fn child(&self, name: &str) -> Self {
        RunLog { name: name.to_string(), files: self.files.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.record(Level::Error, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.record(Level::Warn, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.record(Level::Info, msg.as_ref());
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.record(Level::Debug, msg.as_ref());
    }

    /// Log a stage failure with its full error chain.
    pub fn exception(&self, msg: impl AsRef<str>, report: &Report) {
        self.record(Level::Error, &format!("{}: {report:?}", msg.as_ref()));
    }

    fn record(&self, level: Level, msg: &str) {
        log::log!(target: &self.name, level, "{msg}");

        if level > Level::Info && !log::log_enabled!(target: &self.name, level) {
            return;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{timestamp} - {} - {level} - {msg}\n", self.name);
        for file in &self.files {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            // write errors are ignored
            let _ = file.write_all(line.as_bytes());
        }
    }
}
