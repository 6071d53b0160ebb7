//! labstep Library
//!
//! A small automation harness for lab and infrastructure scripts: a step
//! wrapper that resolves configuration, guarantees a logger and runs the step
//! under strict error handling, and an import manager that loads optional
//! modules through ordered fallback chains.

pub mod cli;
pub mod command_step;
pub mod config_input;
pub mod error;
pub mod imports;
pub mod logger;
pub mod modules;
pub mod platform;
pub mod settings;
pub mod step;
pub mod strictness;

// Re-export main types for convenience
pub use config_input::{ConfigInput, ConfigObject, LiteralPolicy};
pub use error::{LabError, Result};
pub use imports::{
    CapabilityReport, FailureKind, ImportManager, ImportOutcome, ImportStatus, LoaderEntry,
    LoaderFailure, ModuleHandle, ResolveAllReport,
};
pub use logger::{FileLogger, Logger, MemoryLogger, Severity, SharedLogger, TracingLogger};
pub use modules::{
    ALL_CORE, BUILTIN_CAPABILITIES, CoreModules, LOGGING, ModuleLocation, PATCH_MANAGER,
    builtin_manager, register_builtin_capabilities, resolve_core_modules, resolve_logger,
    resolve_patch_manager,
};
pub use platform::Platform;
pub use settings::HarnessSettings;
pub use step::{StepOutcome, StepRunner, StepScope, StepState};
pub use strictness::{Strictness, StrictnessCell, StrictnessGuard};
