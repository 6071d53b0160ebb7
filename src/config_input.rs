//! Configuration input resolution.
//!
//! A step receives its configuration either as a path to a JSON document or
//! as an inline JSON literal. The two are told apart exactly once, at the
//! call boundary, by [`ConfigInput::classify`]; everything downstream works
//! with the tagged variant.
//!
//! Literals are parsed permissively by default: a literal that is not valid
//! JSON is handed to the step as [`ConfigObject::Raw`]. That keeps existing
//! callers working but can hide a typo in a literal, so the behavior is a
//! named [`LiteralPolicy`] and a warning is traced each time it applies.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LabError, Result};

/// Treatment of configuration literals that fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiteralPolicy {
    /// Pass the raw string through unparsed
    #[default]
    PassThrough,
    /// Reject the literal with a parse error
    Strict,
}

/// Where a step's configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigInput {
    /// A JSON document on disk
    Path(PathBuf),
    /// Inline JSON (or opaque text under [`LiteralPolicy::PassThrough`])
    Literal(String),
}

impl ConfigInput {
    /// Decide between path and literal for a raw argument.
    ///
    /// An argument naming an existing regular file (or a symlink to one) is a
    /// path; anything else, directories included, is a literal.
    pub fn classify(arg: &str) -> Self {
        if !arg.is_empty() && Path::new(arg).is_file() {
            Self::Path(PathBuf::from(arg))
        } else {
            Self::Literal(arg.to_string())
        }
    }

    /// Produce the configuration object for a step.
    pub fn resolve(&self, policy: LiteralPolicy) -> Result<ConfigObject> {
        match self {
            Self::Path(path) => {
                if !path.exists() {
                    return Err(LabError::ConfigNotFound(path.display().to_string()));
                }
                let content = fs::read_to_string(path)?;
                let value = serde_json::from_str(&content).map_err(|e| {
                    LabError::config_parse(format!("{}: {}", path.display(), e))
                })?;
                debug!("Loaded configuration from {:?}", path);
                Ok(ConfigObject::Parsed(value))
            }
            Self::Literal(text) => match serde_json::from_str(text) {
                Ok(value) => Ok(ConfigObject::Parsed(value)),
                Err(e) => match policy {
                    LiteralPolicy::PassThrough => {
                        warn!("Configuration literal is not valid JSON ({}); passing it through unparsed", e);
                        Ok(ConfigObject::Raw(text.clone()))
                    }
                    LiteralPolicy::Strict => {
                        Err(LabError::config_parse(format!("literal: {}", e)))
                    }
                },
            },
        }
    }
}

impl fmt::Display for ConfigInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "file {}", path.display()),
            Self::Literal(_) => write!(f, "inline literal"),
        }
    }
}

impl From<PathBuf> for ConfigInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Value> for ConfigInput {
    fn from(value: Value) -> Self {
        Self::Literal(value.to_string())
    }
}

/// Configuration handed to a step body.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigObject {
    /// Structured JSON data
    Parsed(Value),
    /// A literal that was not valid JSON, passed through unchanged
    Raw(String),
}

impl ConfigObject {
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            Self::Parsed(_) => None,
        }
    }

    /// Top-level key lookup; `None` for raw configs and non-object values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_value()?.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    /// JSON form: parsed values as-is, raw text as a JSON string.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Parsed(value) => value.clone(),
            Self::Raw(text) => Value::String(text.clone()),
        }
    }
}
