//! Settings resolution and loading.
//!
//! An explicitly given settings file must exist. The per-user file
//! (`~/.shell-policy.json`) is optional and falls back to the built-in
//! policy values when absent.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::schema::ShellPolicyConfig;
use crate::error::{ConfigError, ShellPolicyError};

const USER_SETTINGS_FILE: &str = ".shell-policy.json";

/// Where the effective settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

/// Per-user settings file path.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(USER_SETTINGS_FILE))
}

/// Resolve and load the effective settings.
pub fn load_settings(
    explicit: Option<&Path>,
) -> Result<(ShellPolicyConfig, SettingsSource), ShellPolicyError> {
    if let Some(path) = explicit {
        return load_config(path).map(|config| (config, SettingsSource::File(path.to_path_buf())));
    }

    match default_settings_path() {
        Some(path) => match read_settings(&path)? {
            Some(json) => Ok((parse_config(&json)?, SettingsSource::File(path))),
            None => Ok((ShellPolicyConfig::default(), SettingsSource::BuiltIn)),
        },
        None => Ok((ShellPolicyConfig::default(), SettingsSource::BuiltIn)),
    }
}

/// Load a settings file that must exist.
pub fn load_config(path: &Path) -> Result<ShellPolicyConfig, ShellPolicyError> {
    let json = read_settings(path)?
        .ok_or_else(|| ConfigError::FileNotFound(path.display().to_string()))?;
    parse_config(&json)
}

/// Parse and validate settings JSON.
pub fn parse_config(json: &str) -> Result<ShellPolicyConfig, ShellPolicyError> {
    let config: ShellPolicyConfig = serde_json::from_str(json).map_err(|e| {
        ConfigError::ParseError(format!("line {}, column {}: {}", e.line(), e.column(), e))
    })?;
    config.validate()?;
    Ok(config)
}

/// File contents, or `None` when the file does not exist.
fn read_settings(path: &Path) -> Result<Option<String>, ShellPolicyError> {
    match std::fs::read_to_string(path) {
        Ok(json) => {
            tracing::debug!("Read settings from {}", path.display());
            Ok(Some(json))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(ConfigError::ParseError(format!("cannot read {}: {}", path.display(), e)).into())
        }
    }
}
