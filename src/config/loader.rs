use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::devices::DeviceDirectory;
use super::types::ShellSettings;
use crate::commands::CommandSpec;
use crate::error::{DeviceError, Result};

/// Parse a YAML file into any deserializable type.
fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(DeviceError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    Ok(serde_saphyr::from_str(&content)?)
}

/// Load the device directory declaration.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist
/// - The YAML content cannot be parsed
/// - There is no `default` entry or a record is malformed
pub fn load_devices(path: &Path) -> Result<DeviceDirectory> {
    let raw: serde_json::Value = read_yaml(path)?;
    let directory = DeviceDirectory::from_value(raw)?;
    info!(path = %path.display(), devices = directory.len(), "Devices loaded");
    Ok(directory)
}

/// Load the command tree declaration.
///
/// # Errors
///
/// Returns an error if the file is missing, is not valid YAML, or a command
/// value is neither null nor a mapping.
pub fn load_commands(path: &Path) -> Result<CommandSpec> {
    let raw: serde_json::Value = read_yaml(path)?;
    let spec = CommandSpec::from_value(&raw)?;
    info!(path = %path.display(), commands = spec.len(), "Commands loaded");
    Ok(spec)
}

/// Load shell settings, falling back to defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<ShellSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "No shell settings file, using defaults");
        return Ok(ShellSettings::default());
    }
    let settings: ShellSettings = read_yaml(path)?;
    regex::Regex::new(&settings.prompt).map_err(|e| DeviceError::ConfigInvalid {
        field: "prompt".to_string(),
        reason: format!("Invalid regex '{}': {e}", settings.prompt),
    })?;
    Ok(settings)
}
