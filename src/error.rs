use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid { field: String, reason: String },

    // Shell protocol errors
    #[error("Expected '{expected}' in {timeout:?}. Only read '{received}'")]
    ReadTimeout {
        expected: String,
        received: String,
        timeout: Duration,
    },

    #[error("Device connection test failed. Response: {response:?}")]
    ConnectionTest { response: String },

    #[error("Connection to {target} is closed")]
    ConnectionClosed { target: String },

    #[error("{operation} is not supported on {target}")]
    Unsupported { operation: String, target: String },

    // Lookup errors
    #[error("{device} device doesn't exist")]
    NoSuchDevice { device: String },

    #[error("{command} command doesn't exist")]
    NoSuchCommand { command: String },

    #[error("Subcommand {subcommand} doesn't exist under {command} command")]
    NoSuchSubCommand { command: String, subcommand: String },

    #[error("{path} has subcommands and cannot be invoked directly")]
    NotALeafCommand { path: String },

    #[error("Unknown connection type: {kind}")]
    NoSuchConnectionType { kind: String },

    // Transport errors
    #[error("SSH connection failed to {host}: {reason}")]
    SshConnection { host: String, reason: String },

    #[error("SSH authentication failed for {user}@{host}")]
    SshAuth { user: String, host: String },

    #[error("SSH channel error: {reason}")]
    SshChannel { reason: String },

    #[error("Serial port {port} error: {reason}")]
    Serial { port: String, reason: String },

    #[error("Transport error on {target}: {reason}")]
    Transport { target: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // YAML errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

impl DeviceError {
    /// Whether this error came from a read deadline expiring.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
