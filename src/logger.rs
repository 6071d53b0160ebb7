//! Logger Adapter
//!
//! The step-visible log sink. A single capability named `logging` resolves to
//! an [`Arc<dyn Logger>`](Logger); callers only ever need [`Logger::log`].
//! Sink errors stay inside the adapter and are reported on the diagnostic
//! `tracing` stream instead of being returned.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity attached to a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Write-a-log-line capability.
///
/// Implementations must be callable from any thread; the import manager hands
/// out one shared instance per process.
pub trait Logger: Send + Sync {
    /// Write `message` at `severity`. Never fails from the caller's view.
    fn log_at(&self, severity: Severity, message: &str);

    /// Write `message` at [`Severity::Info`].
    fn log(&self, message: &str) {
        self.log_at(Severity::Info, message);
    }

    /// Short name used in status output.
    fn sink_name(&self) -> &'static str;
}

/// Routes lines into the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_at(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "labstep::step", "{}", message),
            Severity::Info => tracing::info!(target: "labstep::step", "{}", message),
            Severity::Warn => tracing::warn!(target: "labstep::step", "{}", message),
            Severity::Error => tracing::error!(target: "labstep::step", "{}", message),
        }
    }

    fn sink_name(&self) -> &'static str {
        "tracing"
    }
}

/// Appends `[LEVEL] message` lines to a file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    // Serializes appends so concurrent steps never interleave partial lines
    lock: Mutex<()>,
}

impl FileLogger {
    /// Open (creating if needed) the log file at `path`.
    ///
    /// Fails if the file cannot be opened for appending, which lets the
    /// logging capability fall back to the next loader.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Logger for FileLogger {
    fn log_at(&self, severity: Severity, message: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "[{}] {}", severity, message));
        if let Err(e) = result {
            tracing::warn!("Failed to write log line to {:?}: {}", self.path, e);
        }
    }

    fn sink_name(&self) -> &'static str {
        "file"
    }
}

/// Keeps every line in memory. Handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured lines in write order.
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Captured messages without severities.
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, msg)| msg).collect()
    }
}

impl Logger for MemoryLogger {
    fn log_at(&self, severity: Severity, message: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        lines.push((severity, message.to_string()));
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}

/// Shared logger handle as stored in the capability registry.
pub type SharedLogger = Arc<dyn Logger>;
