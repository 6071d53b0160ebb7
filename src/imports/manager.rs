//! The capability registry and its resolution loop.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::handle::{LoaderEntry, ModuleHandle};
use super::status::{
    CapabilityReport, FailureKind, ImportOutcome, ImportStatus, LoaderFailure, ResolveAllReport,
};
use crate::error::{LabError, Result};

/// Mutable part of a capability, guarded per capability.
#[derive(Default)]
struct SlotState {
    status: ImportStatus,
    handle: Option<ModuleHandle>,
}

/// A registered capability: its immutable chain plus guarded state.
struct Slot {
    loaders: Vec<LoaderEntry>,
    /// Per loader: set while a timed-out attempt is still running
    abandoned: Vec<Arc<AtomicBool>>,
    state: Mutex<SlotState>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Loaders run under catch_unwind, so a poisoned slot still holds a
        // consistent status from the last completed resolution
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Default)]
struct Registry {
    slots: HashMap<String, Arc<Slot>>,
    order: Vec<String>,
}

/// Registry of capabilities and their fallback chains.
///
/// Constructed once by the host and passed by reference to everything that
/// needs a capability. It is `Send + Sync`:
///
/// - the name → slot map sits behind an `RwLock` that is only written by
///   [`register`](Self::register);
/// - each capability has its own mutex, held for the whole resolution, so a
///   loader never runs twice concurrently for the same capability while
///   different capabilities resolve independently.
#[derive(Default)]
pub struct ImportManager {
    registry: RwLock<Registry>,
    loader_timeout: Option<Duration>,
}

impl ImportManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every loader attempt by `timeout`.
    ///
    /// Each attempt then runs on a helper thread. A loader that overruns is
    /// recorded as a [`FailureKind::Timeout`] failure and the next loader is
    /// tried. The abandoned thread is left to finish on its own, and until it
    /// does that loader is not started again; later attempts record a
    /// `Timeout` failure instead.
    pub fn with_loader_timeout(mut self, timeout: Duration) -> Self {
        self.loader_timeout = Some(timeout);
        self
    }

    pub fn loader_timeout(&self) -> Option<Duration> {
        self.loader_timeout
    }

    /// Register `name` with its loaders in try order.
    pub fn register(&self, name: impl Into<String>, loaders: Vec<LoaderEntry>) -> Result<()> {
        let name = name.into();
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if registry.slots.contains_key(&name) {
            return Err(LabError::DuplicateCapability(name));
        }

        let loaders: Vec<LoaderEntry> = loaders
            .into_iter()
            .enumerate()
            .map(|(position, entry)| entry.with_position(position))
            .collect();
        debug!("Registered capability '{}' with {} loader(s)", name, loaders.len());

        registry.slots.insert(
            name.clone(),
            Arc::new(Slot {
                abandoned: loaders.iter().map(|_| Arc::default()).collect(),
                loaders,
                state: Mutex::new(SlotState::default()),
            }),
        );
        registry.order.push(name);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.read_registry().slots.contains_key(name)
    }

    /// Registered capability names in registration order.
    pub fn capabilities(&self) -> Vec<String> {
        self.read_registry().order.clone()
    }

    /// Resolve `name` to a module handle.
    ///
    /// A usable capability returns its memoized handle without invoking any
    /// loader. A capability whose chain was already exhausted returns the
    /// recorded failures again; use [`re_resolve`](Self::re_resolve) to try
    /// anew.
    pub fn resolve(&self, name: &str) -> Result<ModuleHandle> {
        let slot = self.slot(name)?;
        let mut state = slot.lock();

        match state.status.outcome {
            ImportOutcome::Succeeded | ImportOutcome::FailedFallback => {
                if let Some(handle) = &state.handle {
                    debug!("Capability '{}' already loaded", name);
                    return Ok(handle.clone());
                }
            }
            ImportOutcome::FailedAll => {
                return Err(LabError::AllFallbacksExhausted {
                    name: name.to_string(),
                    failures: state.status.failures.clone(),
                });
            }
            ImportOutcome::NotAttempted => {}
        }

        self.run_chain(name, &slot, &mut state)
    }

    /// Discard the previous outcome of `name` and walk its chain again.
    pub fn re_resolve(&self, name: &str) -> Result<ModuleHandle> {
        let slot = self.slot(name)?;
        let mut state = slot.lock();
        *state = SlotState::default();
        info!("Re-resolving capability '{}'", name);
        self.run_chain(name, &slot, &mut state)
    }

    /// Snapshot of the load state of `name`.
    pub fn status(&self, name: &str) -> Result<ImportStatus> {
        let slot = self.slot(name)?;
        let state = slot.lock();
        Ok(state.status.clone())
    }

    /// Snapshot of every registered capability, in registration order.
    pub fn statuses(&self) -> Vec<(String, ImportStatus)> {
        self.capabilities()
            .into_iter()
            .filter_map(|name| self.status(&name).ok().map(|status| (name, status)))
            .collect()
    }

    /// Resolve each name in order without stopping at failures.
    ///
    /// Policy: returns `Ok` with a per-name report whenever at least one
    /// requested capability is usable (or nothing was requested). Only when
    /// every requested capability is unusable does it fail with
    /// [`LabError::NoCapabilityUsable`], which still carries the report.
    /// Unregistered names count as unusable.
    pub fn resolve_all<I, S>(&self, names: I) -> Result<ResolveAllReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ResolveAllReport::default();

        for name in names {
            let name = name.as_ref();
            let (usable, error) = match self.resolve(name) {
                Ok(_) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            report.capabilities.push(CapabilityReport {
                name: name.to_string(),
                usable,
                status: self.status(name).ok(),
                error,
            });
        }

        if !report.capabilities.is_empty() && report.usable_names().is_empty() {
            warn!("No requested capability could be loaded");
            return Err(LabError::NoCapabilityUsable { report });
        }
        if report.is_degraded() {
            warn!(
                "Continuing degraded; unavailable capabilities: {}",
                report.unusable_names().join(", ")
            );
        }
        Ok(report)
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, name: &str) -> Result<Arc<Slot>> {
        self.read_registry()
            .slots
            .get(name)
            .cloned()
            .ok_or_else(|| LabError::UnknownCapability(name.to_string()))
    }

    fn run_chain(&self, name: &str, slot: &Slot, state: &mut SlotState) -> Result<ModuleHandle> {
        let mut failures = Vec::new();

        for (entry, abandoned) in slot.loaders.iter().zip(&slot.abandoned) {
            debug!(
                "Trying loader {} '{}' for capability '{}'",
                entry.position(),
                entry.description(),
                name
            );
            match self.attempt(entry, abandoned) {
                Ok(handle) => {
                    let outcome = if failures.is_empty() {
                        ImportOutcome::Succeeded
                    } else {
                        ImportOutcome::FailedFallback
                    };
                    info!(
                        "Capability '{}' loaded via '{}' ({})",
                        name,
                        entry.description(),
                        outcome
                    );
                    state.status = ImportStatus {
                        outcome,
                        winning_loader: Some(entry.description().to_string()),
                        failures,
                    };
                    state.handle = Some(handle.clone());
                    return Ok(handle);
                }
                Err(failure) => {
                    warn!(
                        "Loader '{}' for capability '{}' failed ({}): {}",
                        failure.loader, name, failure.kind, failure.reason
                    );
                    failures.push(failure);
                }
            }
        }

        warn!("All loaders for capability '{}' failed", name);
        state.status = ImportStatus {
            outcome: ImportOutcome::FailedAll,
            winning_loader: None,
            failures: failures.clone(),
        };
        state.handle = None;
        Err(LabError::AllFallbacksExhausted {
            name: name.to_string(),
            failures,
        })
    }

    /// Invoke one loader, converting every failure mode into a record.
    fn attempt(
        &self,
        entry: &LoaderEntry,
        abandoned: &Arc<AtomicBool>,
    ) -> std::result::Result<ModuleHandle, LoaderFailure> {
        let load = entry.load_fn();
        let failure = |reason: String, kind| {
            LoaderFailure::new(entry.position(), entry.description(), reason, kind)
        };

        let outcome = match self.loader_timeout {
            None => panic::catch_unwind(AssertUnwindSafe(|| load())),
            Some(timeout) => {
                if abandoned.load(Ordering::SeqCst) {
                    return Err(failure(
                        "previous attempt still running".to_string(),
                        FailureKind::Timeout,
                    ));
                }
                abandoned.store(true, Ordering::SeqCst);

                let (tx, rx) = mpsc::channel();
                let running = Arc::clone(abandoned);
                let spawned = thread::Builder::new()
                    .name(format!("loader-{}", entry.position()))
                    .spawn(move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| load()));
                        running.store(false, Ordering::SeqCst);
                        // Receiver is gone when the attempt already timed out
                        let _ = tx.send(result);
                    });
                if let Err(e) = spawned {
                    abandoned.store(false, Ordering::SeqCst);
                    return Err(failure(
                        format!("failed to spawn loader thread: {}", e),
                        FailureKind::Error,
                    ));
                }
                match rx.recv_timeout(timeout) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(failure(
                            format!("timed out after {:?}", timeout),
                            FailureKind::Timeout,
                        ));
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(failure(
                            "loader thread exited without a result".to_string(),
                            FailureKind::Panic,
                        ));
                    }
                }
            }
        };

        match outcome {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => Err(failure(format!("{:#}", e), FailureKind::Error)),
            Err(payload) => Err(failure(panic_message(payload.as_ref()), FailureKind::Panic)),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
