//! Harness settings file handling.
//!
//! Settings control where optional modules are looked up, where the file
//! logger writes, how long a loader may take, and how configuration literals
//! that fail to parse are treated. They are distinct from the per-step
//! configuration object handed to step bodies.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config_input::LiteralPolicy;
use crate::error::{LabError, Result};
use crate::modules::BUILTIN_CAPABILITIES;

/// Overrides `log_file` when set and non-empty
pub const LOG_FILE_ENV: &str = "LABSTEP_LOG_FILE";

/// Harness settings that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Root directory holding optional lab modules
    pub modules_path: PathBuf,
    /// File sink for the logging capability; tracing is used when unset
    pub log_file: Option<PathBuf>,
    /// Upper bound for a single loader attempt, in milliseconds
    pub loader_timeout_ms: Option<u64>,
    /// What to do with configuration literals that are not valid JSON
    pub literal_policy: LiteralPolicy,
    /// Capabilities `labstep status` resolves when none are named
    pub required_capabilities: Vec<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            modules_path: PathBuf::from("modules"),
            log_file: None,
            loader_timeout_ms: None,
            literal_policy: LiteralPolicy::default(),
            required_capabilities: BUILTIN_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HarnessSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| {
            LabError::settings(format!("Failed to write settings to {:?}: {}", path.as_ref(), e))
        })?;
        Ok(())
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            LabError::settings(format!("Failed to read settings from {:?}: {}", path.as_ref(), e))
        })?;
        let settings: Self = serde_json::from_str(&content).map_err(|e| {
            LabError::settings(format!("Failed to parse settings JSON {:?}: {}", path.as_ref(), e))
        })?;
        Ok(settings)
    }

    /// Load from `path` if given, otherwise start from defaults; then apply
    /// environment overrides and validate.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `LABSTEP_LOG_FILE`.
    ///
    /// The module search path has its own environment loader in
    /// [`modules`](crate::modules) and is not overridden here.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path(LOG_FILE_ENV) {
            tracing::debug!("log_file overridden by {}: {:?}", LOG_FILE_ENV, path);
            self.log_file = Some(path);
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.modules_path.as_os_str().is_empty() {
            return Err(LabError::settings("modules_path must not be empty"));
        }
        if self.loader_timeout_ms == Some(0) {
            return Err(LabError::settings("loader_timeout_ms must be greater than zero"));
        }
        if let Some(log_file) = &self.log_file {
            if log_file.as_os_str().is_empty() {
                return Err(LabError::settings("log_file must not be empty when set"));
            }
        }
        if let Some(name) = self.required_capabilities.iter().find(|n| n.trim().is_empty()) {
            return Err(LabError::settings(format!(
                "required_capabilities contains an empty name: {:?}",
                name
            )));
        }
        Ok(())
    }

    pub fn loader_timeout(&self) -> Option<Duration> {
        self.loader_timeout_ms.map(Duration::from_millis)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = HarnessSettings::new();
        assert_eq!(settings, HarnessSettings::default());
        assert!(settings.validate().is_ok());
        assert_eq!(settings.modules_path, PathBuf::from("modules"));
        assert_eq!(settings.literal_policy, LiteralPolicy::PassThrough);
        assert_eq!(
            settings.required_capabilities,
            vec!["logging", "patch-manager", "all-core"]
        );
        assert!(settings.loader_timeout().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labstep.json");
        let settings = HarnessSettings {
            modules_path: PathBuf::from("/opt/lab/modules"),
            log_file: Some(PathBuf::from("/var/log/lab.log")),
            loader_timeout_ms: Some(250),
            literal_policy: LiteralPolicy::Strict,
            required_capabilities: vec!["logging".to_string()],
        };
        settings.save_to_file(&path).unwrap();

        let loaded = HarnessSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.loader_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labstep.json");
        fs::write(&path, r#"{"literal_policy": "strict"}"#).unwrap();

        let loaded = HarnessSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.literal_policy, LiteralPolicy::Strict);
        assert_eq!(loaded.modules_path, PathBuf::from("modules"));
    }

    #[test]
    fn test_invalid_json_is_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labstep.json");
        fs::write(&path, "{ not json").unwrap();

        let err = HarnessSettings::load_from_file(&path).unwrap_err();
        assert!(matches!(err, LabError::Settings(_)));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = HarnessSettings {
            loader_timeout_ms: Some(0),
            ..HarnessSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_capability() {
        let settings = HarnessSettings {
            required_capabilities: vec!["logging".into(), "  ".into()],
            ..HarnessSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
