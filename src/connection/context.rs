use tracing::info;

use crate::commands::CommandSpec;
use crate::config::{
    ConfigPaths, Credentials, DeviceDirectory, ShellSettings, load_commands, load_devices,
    load_settings,
};
use crate::error::Result;

/// Configuration loaded once at startup and shared by every connection.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub devices: DeviceDirectory,
    pub commands: CommandSpec,
    pub credentials: Credentials,
    pub settings: ShellSettings,
}

impl DeviceContext {
    #[must_use]
    pub const fn new(
        devices: DeviceDirectory,
        commands: CommandSpec,
        credentials: Credentials,
        settings: ShellSettings,
    ) -> Self {
        Self {
            devices,
            commands,
            credentials,
            settings,
        }
    }

    /// Load devices, commands and shell settings from the configuration tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the device or command declaration is missing or
    /// malformed, or the settings file exists but is invalid.
    pub fn load(paths: &ConfigPaths, credentials: Credentials) -> Result<Self> {
        let devices = load_devices(&paths.devices_file())?;
        let commands = load_commands(&paths.commands_file())?;
        let settings = load_settings(&paths.settings_file())?;
        info!(root = %paths.root().display(), "Configuration loaded");
        Ok(Self::new(devices, commands, credentials, settings))
    }
}
