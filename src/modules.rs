//! Built-in capabilities
//!
//! Registers the fixed capability set with its fallback chains:
//!
//! | Capability      | Loaders, in try order |
//! |-----------------|-----------------------|
//! | `logging`       | file logger (only when `log_file` is set), tracing logger |
//! | `patch-manager` | `$LABSTEP_MODULES_PATH/PatchManager`, `<modules_path>/PatchManager` |
//! | `all-core`      | `$LABSTEP_MODULES_PATH`, `<modules_path>`; the root must hold `LabRunner` |
//!
//! The environment path is read when the loader runs, not when it is
//! registered, so a long-lived process picks up the value current at first
//! resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;

use crate::error::{LabError, Result};
use crate::imports::{ImportManager, LoaderEntry, ModuleHandle};
use crate::logger::{FileLogger, SharedLogger, TracingLogger};
use crate::settings::HarnessSettings;

pub const LOGGING: &str = "logging";
pub const PATCH_MANAGER: &str = "patch-manager";
pub const ALL_CORE: &str = "all-core";

/// Capabilities every harness registers
pub const BUILTIN_CAPABILITIES: &[&str] = &[LOGGING, PATCH_MANAGER, ALL_CORE];

/// Searched before the configured modules path when set and non-empty
pub const MODULES_PATH_ENV: &str = "LABSTEP_MODULES_PATH";

const PATCH_MANAGER_DIR: &str = "PatchManager";
const CORE_MARKER_DIR: &str = "LabRunner";

/// A module directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleLocation {
    pub name: String,
    pub path: PathBuf,
}

/// The set of core modules under one modules root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreModules {
    pub root: PathBuf,
    /// Module directories, sorted by name
    pub modules: Vec<ModuleLocation>,
}

impl CoreModules {
    pub fn get(&self, name: &str) -> Option<&ModuleLocation> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// Find `<root>/<name>` as a module directory.
pub fn locate_module(root: &Path, name: &str) -> anyhow::Result<ModuleLocation> {
    let path = root.join(name);
    if !path.is_dir() {
        bail!("module {} not found at {}", name, path.display());
    }
    Ok(ModuleLocation {
        name: name.to_string(),
        path,
    })
}

/// Enumerate the core modules under `root`.
///
/// The root only counts as a core modules directory if it holds `LabRunner`.
pub fn load_core_modules(root: &Path) -> anyhow::Result<CoreModules> {
    locate_module(root, CORE_MARKER_DIR)
        .with_context(|| format!("{} is not a core modules directory", root.display()))?;

    let mut modules = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))? {
        let entry = entry?;
        if entry.path().is_dir() {
            modules.push(ModuleLocation {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }
    }
    modules.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(CoreModules {
        root: root.to_path_buf(),
        modules,
    })
}

fn env_modules_root() -> anyhow::Result<PathBuf> {
    match env::var_os(MODULES_PATH_ENV) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => bail!("{} is not set", MODULES_PATH_ENV),
    }
}

fn logging_loaders(settings: &HarnessSettings) -> Vec<LoaderEntry> {
    let mut loaders = Vec::new();

    if let Some(log_file) = settings.log_file.clone() {
        loaders.push(LoaderEntry::new(
            format!("file logger ({})", log_file.display()),
            move || {
                let logger = FileLogger::open(&log_file)
                    .with_context(|| format!("cannot open log file {}", log_file.display()))?;
                Ok(ModuleHandle::new::<SharedLogger>(Arc::new(logger)))
            },
        ));
    }

    loaders.push(LoaderEntry::new("tracing logger", || {
        Ok(ModuleHandle::new::<SharedLogger>(Arc::new(TracingLogger)))
    }));
    loaders
}

fn patch_manager_loaders(settings: &HarnessSettings) -> Vec<LoaderEntry> {
    let configured = settings.modules_path.clone();
    vec![
        LoaderEntry::new(format!("${}/{}", MODULES_PATH_ENV, PATCH_MANAGER_DIR), || {
            let root = env_modules_root()?;
            Ok(ModuleHandle::new(locate_module(&root, PATCH_MANAGER_DIR)?))
        }),
        LoaderEntry::new(
            format!("{}/{}", configured.display(), PATCH_MANAGER_DIR),
            move || Ok(ModuleHandle::new(locate_module(&configured, PATCH_MANAGER_DIR)?)),
        ),
    ]
}

fn core_loaders(settings: &HarnessSettings) -> Vec<LoaderEntry> {
    let configured = settings.modules_path.clone();
    vec![
        LoaderEntry::new(format!("${}", MODULES_PATH_ENV), || {
            let root = env_modules_root()?;
            Ok(ModuleHandle::new(load_core_modules(&root)?))
        }),
        LoaderEntry::new(configured.display().to_string(), move || {
            Ok(ModuleHandle::new(load_core_modules(&configured)?))
        }),
    ]
}

/// Register `logging`, `patch-manager` and `all-core` on `manager`.
pub fn register_builtin_capabilities(manager: &ImportManager, settings: &HarnessSettings) -> Result<()> {
    manager.register(LOGGING, logging_loaders(settings))?;
    manager.register(PATCH_MANAGER, patch_manager_loaders(settings))?;
    manager.register(ALL_CORE, core_loaders(settings))?;
    Ok(())
}

/// Build a manager configured from `settings` with the built-ins registered.
pub fn builtin_manager(settings: &HarnessSettings) -> Result<ImportManager> {
    let manager = match settings.loader_timeout() {
        Some(timeout) => ImportManager::new().with_loader_timeout(timeout),
        None => ImportManager::new(),
    };
    register_builtin_capabilities(&manager, settings)?;
    Ok(manager)
}

fn expect_handle<T: Clone + 'static>(name: &str, handle: &ModuleHandle) -> Result<T> {
    handle
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| LabError::HandleType {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual: handle.type_name(),
        })
}

/// Resolve the `logging` capability to a logger.
pub fn resolve_logger(manager: &ImportManager) -> Result<SharedLogger> {
    let handle = manager.resolve(LOGGING)?;
    expect_handle::<SharedLogger>(LOGGING, &handle)
}

/// Resolve the `patch-manager` capability to its module directory.
pub fn resolve_patch_manager(manager: &ImportManager) -> Result<ModuleLocation> {
    let handle = manager.resolve(PATCH_MANAGER)?;
    expect_handle::<ModuleLocation>(PATCH_MANAGER, &handle)
}

/// Resolve the `all-core` capability to the core module set.
pub fn resolve_core_modules(manager: &ImportManager) -> Result<CoreModules> {
    let handle = manager.resolve(ALL_CORE)?;
    expect_handle::<CoreModules>(ALL_CORE, &handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::ImportOutcome;

    fn settings_with_root(root: &Path) -> HarnessSettings {
        HarnessSettings {
            modules_path: root.to_path_buf(),
            ..HarnessSettings::default()
        }
    }

    #[test]
    fn test_locate_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("PatchManager")).unwrap();

        let found = locate_module(dir.path(), "PatchManager").unwrap();
        assert_eq!(found.path, dir.path().join("PatchManager"));
        assert!(locate_module(dir.path(), "Missing").is_err());
    }

    #[test]
    fn test_core_modules_require_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("PatchManager")).unwrap();
        assert!(load_core_modules(dir.path()).is_err());

        fs::create_dir(dir.path().join("LabRunner")).unwrap();
        fs::write(dir.path().join("README.md"), "not a module").unwrap();
        let core = load_core_modules(dir.path()).unwrap();
        let names: Vec<_> = core.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["LabRunner", "PatchManager"]);
        assert!(core.get("LabRunner").is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_core_modules_follow_symlinked_dirs() {
        let shared = tempfile::tempdir().unwrap();
        fs::create_dir(shared.path().join("NetworkTools")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("LabRunner")).unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("NetworkTools"),
            dir.path().join("NetworkTools"),
        )
        .unwrap();

        let core = load_core_modules(dir.path()).unwrap();
        let names: Vec<_> = core.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["LabRunner", "NetworkTools"]);
    }

    #[test]
    fn test_logging_without_file_uses_tracing_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = builtin_manager(&settings_with_root(dir.path())).unwrap();

        let logger = resolve_logger(&manager).unwrap();
        assert_eq!(logger.sink_name(), "tracing");
        let status = manager.status(LOGGING).unwrap();
        assert_eq!(status.outcome, ImportOutcome::Succeeded);
        assert_eq!(status.winning_loader.as_deref(), Some("tracing logger"));
    }

    #[test]
    fn test_logging_prefers_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HarnessSettings {
            log_file: Some(dir.path().join("lab.log")),
            ..settings_with_root(dir.path())
        };
        let manager = builtin_manager(&settings).unwrap();

        let logger = resolve_logger(&manager).unwrap();
        assert_eq!(logger.sink_name(), "file");
        logger.log("hello");
        let content = fs::read_to_string(dir.path().join("lab.log")).unwrap();
        assert_eq!(content, "[INFO] hello\n");
    }

    #[test]
    fn test_logging_falls_back_when_file_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HarnessSettings {
            log_file: Some(dir.path().join("no-such-dir").join("lab.log")),
            ..settings_with_root(dir.path())
        };
        let manager = builtin_manager(&settings).unwrap();

        let logger = resolve_logger(&manager).unwrap();
        assert_eq!(logger.sink_name(), "tracing");
        let status = manager.status(LOGGING).unwrap();
        assert_eq!(status.outcome, ImportOutcome::FailedFallback);
        assert_eq!(status.failures.len(), 1);
        assert!(status.failures[0].reason.contains("cannot open log file"));
    }

    #[test]
    fn test_configured_modules_path() {
        // Only meaningful when the environment path is not pointing elsewhere
        if env::var_os(MODULES_PATH_ENV).is_some() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("PatchManager")).unwrap();
        fs::create_dir(dir.path().join("LabRunner")).unwrap();
        let manager = builtin_manager(&settings_with_root(dir.path())).unwrap();

        let patch = resolve_patch_manager(&manager).unwrap();
        assert_eq!(patch.path, dir.path().join("PatchManager"));
        let core = resolve_core_modules(&manager).unwrap();
        assert_eq!(core.root, dir.path());

        let status = manager.status(PATCH_MANAGER).unwrap();
        assert_eq!(status.outcome, ImportOutcome::FailedFallback);
        assert!(status.failures[0].reason.contains(MODULES_PATH_ENV));
    }

    #[test]
    fn test_missing_modules_exhaust_chain() {
        if env::var_os(MODULES_PATH_ENV).is_some() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let manager = builtin_manager(&settings_with_root(dir.path())).unwrap();

        let err = resolve_patch_manager(&manager).unwrap_err();
        assert!(matches!(err, LabError::AllFallbacksExhausted { .. }));
        assert_eq!(manager.status(PATCH_MANAGER).unwrap().failures.len(), 2);
    }

    #[test]
    fn test_handle_type_mismatch() {
        let manager = ImportManager::new();
        manager
            .register(LOGGING, vec![LoaderEntry::new("wrong", || Ok(ModuleHandle::new(1u8)))])
            .unwrap();
        let err = resolve_logger(&manager).err().unwrap();
        assert!(matches!(err, LabError::HandleType { actual: "u8", .. }));
    }
}
