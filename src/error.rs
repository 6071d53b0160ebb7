//! Error handling module for labstep
//!
//! Provides the error taxonomy shared by the import manager and the step
//! wrapper. Loader-local failures are not errors here: they are recorded as
//! [`LoaderFailure`](crate::imports::LoaderFailure) data on the capability
//! status and only surface once every fallback is exhausted.

use thiserror::Error;

use crate::imports::{LoaderFailure, ResolveAllReport};

/// Main error type for labstep
#[derive(Error, Debug)]
pub enum LabError {
    /// A capability name was registered twice (programmer error at startup)
    #[error("Capability '{0}' is already registered")]
    DuplicateCapability(String),

    /// A capability name was queried or resolved without being registered
    #[error("Unknown capability: '{0}'")]
    UnknownCapability(String),

    /// Every loader in a capability's fallback chain failed
    #[error("All {} loader(s) for capability '{name}' failed: {}", .failures.len(), summarize(.failures))]
    AllFallbacksExhausted {
        name: String,
        failures: Vec<LoaderFailure>,
    },

    /// `resolve_all` was asked for capabilities and none became usable
    #[error("None of the requested capabilities are usable: {}", .report.unusable_names().join(", "))]
    NoCapabilityUsable { report: ResolveAllReport },

    /// A capability resolved to a module of an unexpected type
    #[error("Capability '{name}' resolved to {actual}, expected {expected}")]
    HandleType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The logging capability could not be resolved before a step
    #[error("Logging capability unavailable: {source}")]
    LoggingUnavailable {
        #[source]
        source: Box<LabError>,
    },

    /// The step body failed; the original error is carried unchanged
    #[error(transparent)]
    StepBody(anyhow::Error),

    /// A configuration path was given but does not exist
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Configuration content could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    /// Harness settings failed to load or validate
    #[error("Settings error: {0}")]
    Settings(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for labstep operations
pub type Result<T> = std::result::Result<T, LabError>;

fn summarize(failures: &[LoaderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}: {}", f.position, f.loader, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LabError {
    /// Create a configuration parse error
    pub fn config_parse(msg: impl Into<String>) -> Self {
        Self::ConfigParse(msg.into())
    }

    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Whether this error came out of a step body rather than the harness.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::StepBody(_))
    }

    /// Recover the step body's original error.
    ///
    /// Harness errors are converted into an `anyhow::Error` instead.
    pub fn into_step_error(self) -> anyhow::Error {
        match self {
            Self::StepBody(err) => err,
            other => anyhow::Error::new(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::FailureKind;

    #[test]
    fn test_error_display() {
        let err = LabError::DuplicateCapability("logging".to_string());
        assert_eq!(err.to_string(), "Capability 'logging' is already registered");

        let err = LabError::UnknownCapability("nope".to_string());
        assert_eq!(err.to_string(), "Unknown capability: 'nope'");
    }

    #[test]
    fn test_exhausted_lists_failures_in_order() {
        let err = LabError::AllFallbacksExhausted {
            name: "logging".to_string(),
            failures: vec![
                LoaderFailure::new(0, "file", "no log file configured", FailureKind::Error),
                LoaderFailure::new(1, "tracing", "boom", FailureKind::Panic),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("All 2 loader(s) for capability 'logging' failed"));
        let first = text.find("[0] file").expect("first failure listed");
        let second = text.find("[1] tracing").expect("second failure listed");
        assert!(first < second);
    }

    #[test]
    fn test_step_body_is_transparent() {
        let err = LabError::StepBody(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "disk full");
        assert!(err.is_step_failure());
        assert_eq!(err.into_step_error().to_string(), "disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LabError = io_err.into();
        assert!(matches!(err, LabError::Io(_)));
        assert!(!err.is_step_failure());
    }
}
