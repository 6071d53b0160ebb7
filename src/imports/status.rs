//! Load outcome records.

use serde::Serialize;
use strum::Display;

/// Outcome of the last resolution of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ImportOutcome {
    /// Never resolved (or reset by `re_resolve` before it ran)
    NotAttempted,
    /// The first loader in the chain succeeded
    Succeeded,
    /// A later loader succeeded after at least one earlier failure
    FailedFallback,
    /// Every loader failed
    FailedAll,
}

impl ImportOutcome {
    /// Whether a handle is available for this capability.
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedFallback)
    }
}

/// How a single loader attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The loader returned an error
    Error,
    /// The loader panicked
    Panic,
    /// The loader did not finish within the configured bound
    Timeout,
}

/// One loader's failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderFailure {
    /// Position of the loader in the fallback chain
    pub position: usize,
    /// Loader description
    pub loader: String,
    /// Human-readable reason
    pub reason: String,
    pub kind: FailureKind,
}

impl LoaderFailure {
    pub fn new(
        position: usize,
        loader: impl Into<String>,
        reason: impl Into<String>,
        kind: FailureKind,
    ) -> Self {
        Self {
            position,
            loader: loader.into(),
            reason: reason.into(),
            kind,
        }
    }
}

/// Read-only snapshot of a capability's load state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStatus {
    pub outcome: ImportOutcome,
    /// Description of the loader that produced the handle
    pub winning_loader: Option<String>,
    /// Failures before success or final failure, in chain order
    pub failures: Vec<LoaderFailure>,
}

impl ImportStatus {
    pub fn not_attempted() -> Self {
        Self {
            outcome: ImportOutcome::NotAttempted,
            winning_loader: None,
            failures: Vec::new(),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.outcome.is_usable()
    }
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self::not_attempted()
    }
}

/// Per-name entry of a [`ResolveAllReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub name: String,
    pub usable: bool,
    /// `None` when the name was never registered
    pub status: Option<ImportStatus>,
    /// Error text when the capability is not usable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of resolving several capabilities in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveAllReport {
    /// Entries in request order
    pub capabilities: Vec<CapabilityReport>,
}

impl ResolveAllReport {
    pub fn usable_names(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .filter(|c| c.usable)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn unusable_names(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .filter(|c| !c.usable)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn is_usable(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name && c.usable)
    }

    /// True when every requested capability is usable.
    pub fn all_usable(&self) -> bool {
        self.capabilities.iter().all(|c| c.usable)
    }

    /// True when at least one capability is usable but not all.
    pub fn is_degraded(&self) -> bool {
        !self.all_usable() && self.capabilities.iter().any(|c| c.usable)
    }
}
