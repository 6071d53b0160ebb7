//! Step Invocation Wrapper
//!
//! Runs one unit of automation work: resolve its configuration, make sure a
//! logger is available, then execute the body in strict mode. A failing body
//! is logged exactly once through the logging capability and its error is
//! returned unchanged.
//!
//! # Step States
//!
//! ```text
//! Idle → ConfigResolved → LoggerReady → Running → Completed
//!                                          ↓
//!                                     FailedLogged
//! ```
//!
//! There are no retries at this layer.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::config_input::{ConfigInput, ConfigObject, LiteralPolicy};
use crate::error::{LabError, Result};
use crate::imports::{ImportManager, panic_message};
use crate::logger::{Severity, SharedLogger};
use crate::modules::resolve_logger;
use crate::platform::Platform;
use crate::strictness::{Strictness, StrictnessCell};

/// Where a step invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
    #[default]
    Idle,
    ConfigResolved,
    LoggerReady,
    Running,
    Completed,
    FailedLogged,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::FailedLogged)
    }
}

/// What a step body can see and do besides reading its configuration.
pub struct StepScope<'a> {
    name: &'a str,
    logger: &'a SharedLogger,
    strictness: &'a StrictnessCell,
    platform: Platform,
    recovered: Vec<String>,
}

impl<'a> StepScope<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn logger(&self) -> &SharedLogger {
        self.logger
    }

    /// Write a line through the logging capability.
    pub fn log(&self, message: &str) {
        self.logger.log(message);
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness.get()
    }

    /// Report an error the body could carry on from.
    ///
    /// In [`Strictness::Stop`] (the mode every body starts in) the error is
    /// handed back for the body to propagate. In [`Strictness::Continue`] it
    /// is traced, remembered, and swallowed.
    pub fn report(&mut self, err: anyhow::Error) -> anyhow::Result<()> {
        match self.strictness.get() {
            Strictness::Stop => Err(err),
            Strictness::Continue => {
                warn!("Step '{}' continuing after error: {:#}", self.name, err);
                self.recovered.push(format!("{:#}", err));
                Ok(())
            }
        }
    }

    /// Run `f` with the strictness switched to `mode`, restoring it after.
    pub fn with_strictness<R>(&mut self, mode: Strictness, f: impl FnOnce(&mut Self) -> R) -> R {
        let cell = self.strictness;
        let _guard = cell.enter(mode);
        f(self)
    }

    /// Errors swallowed under [`Strictness::Continue`], in report order.
    pub fn recovered_errors(&self) -> &[String] {
        &self.recovered
    }
}

/// Result of a completed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub name: String,
    pub state: StepState,
    pub recovered_errors: Vec<String>,
}

/// Runs steps against a shared [`ImportManager`].
///
/// The runner owns the strictness mode of the steps it runs. It is not
/// `Sync`; concurrent callers each build their own runner over the same
/// manager.
pub struct StepRunner<'m> {
    manager: &'m ImportManager,
    literal_policy: LiteralPolicy,
    strictness: StrictnessCell,
    last_state: Cell<StepState>,
}

impl<'m> StepRunner<'m> {
    pub fn new(manager: &'m ImportManager) -> Self {
        Self {
            manager,
            literal_policy: LiteralPolicy::default(),
            strictness: StrictnessCell::default(),
            last_state: Cell::new(StepState::Idle),
        }
    }

    pub fn with_literal_policy(mut self, policy: LiteralPolicy) -> Self {
        self.literal_policy = policy;
        self
    }

    /// Strictness outside of any running step.
    pub fn strictness(&self) -> Strictness {
        self.strictness.get()
    }

    /// State reached by the most recent invocation.
    pub fn last_state(&self) -> StepState {
        self.last_state.get()
    }

    fn transition(&self, name: &str, state: StepState) {
        debug!("Step '{}': {} -> {}", name, self.last_state.get(), state);
        self.last_state.set(state);
    }

    /// Run `body` as the step `name` with configuration from `input`.
    ///
    /// # Errors
    ///
    /// - configuration errors from [`ConfigInput::resolve`]
    /// - [`LabError::LoggingUnavailable`] if `logging` cannot be resolved
    /// - [`LabError::StepBody`] carrying the body's own error, after one
    ///   error line has been written to the logger
    ///
    /// A panicking body is logged the same way and the panic is resumed.
    pub fn run_step<F>(&self, name: &str, input: &ConfigInput, body: F) -> Result<StepOutcome>
    where
        F: FnOnce(&ConfigObject, &mut StepScope<'_>) -> anyhow::Result<()>,
    {
        self.last_state.set(StepState::Idle);
        info!("Step '{}' starting ({})", name, input);

        let config = input.resolve(self.literal_policy)?;
        self.transition(name, StepState::ConfigResolved);

        let logger = resolve_logger(self.manager).map_err(|e| LabError::LoggingUnavailable {
            source: Box::new(e),
        })?;
        self.transition(name, StepState::LoggerReady);

        let mut scope = StepScope {
            name,
            logger: &logger,
            strictness: &self.strictness,
            platform: Platform::current(),
            recovered: Vec::new(),
        };

        self.transition(name, StepState::Running);
        let result = {
            let _strict = self.strictness.enter(Strictness::Stop);
            panic::catch_unwind(AssertUnwindSafe(|| body(&config, &mut scope)))
        };

        match result {
            Ok(Ok(())) => {
                self.transition(name, StepState::Completed);
                info!("Step '{}' completed", name);
                Ok(StepOutcome {
                    name: name.to_string(),
                    state: StepState::Completed,
                    recovered_errors: scope.recovered,
                })
            }
            Ok(Err(err)) => {
                logger.log_at(Severity::Error, &format!("Step '{}' failed: {:#}", name, err));
                self.transition(name, StepState::FailedLogged);
                Err(LabError::StepBody(err))
            }
            Err(payload) => {
                logger.log_at(
                    Severity::Error,
                    &format!("Step '{}' failed: {}", name, panic_message(payload.as_ref())),
                );
                self.transition(name, StepState::FailedLogged);
                panic::resume_unwind(payload)
            }
        }
    }
}
