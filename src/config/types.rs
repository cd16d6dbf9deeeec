use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::DeviceError;

/// Prompt printed by the device shell, e.g. `[admin@MikroTik] /ip address> `.
pub const DEFAULT_PROMPT: &str = r"\[\w+@\w+\] [/\w]*> ";

/// Environment variable pointing at the framework root holding `config/`.
pub const ROOT_ENV: &str = "DEVICE_SHELL_DIR";

/// Environment variables consulted by [`Credentials::from_env`].
pub const USERNAME_ENV: &str = "DEVICE_USERNAME";
pub const PASSWORD_ENV: &str = "DEVICE_PASSWORD";

/// How the shell of a device is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Interactive shell over SSH
    Ssh,
    /// Line-oriented serial console
    Serial,
}

impl ConnectionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Serial => "serial",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionKind {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "serial" => Ok(Self::Serial),
            _ => Err(DeviceError::NoSuchConnectionType {
                kind: s.to_string(),
            }),
        }
    }
}

/// Login credentials handed over by the secrets store.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Read credentials from `DEVICE_USERNAME` / `DEVICE_PASSWORD`.
    ///
    /// A missing password is treated as empty, which is the factory default
    /// on the devices this targets.
    ///
    /// # Errors
    ///
    /// Returns an error if `DEVICE_USERNAME` is not set.
    pub fn from_env() -> Result<Self, DeviceError> {
        let username = std::env::var(USERNAME_ENV).map_err(|_| DeviceError::ConfigInvalid {
            field: USERNAME_ENV.to_string(),
            reason: "environment variable is not set".to_string(),
        })?;
        let password = std::env::var(PASSWORD_ENV).unwrap_or_default();
        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Commands used to check that an opened session reached the expected device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelfTestConfig {
    /// Harmless command sent first to settle the shell
    #[serde(default = "default_noop_command")]
    pub noop_command: String,

    /// Command whose response identifies the device
    #[serde(default = "default_identity_command")]
    pub identity_command: String,

    /// Exact response expected from `identity_command`
    #[serde(default = "default_expected_identity")]
    pub expected_identity: String,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            noop_command: default_noop_command(),
            identity_command: default_identity_command(),
            expected_identity: default_expected_identity(),
        }
    }
}

fn default_noop_command() -> String {
    "beep".to_string()
}

fn default_identity_command() -> String {
    "system identity print".to_string()
}

fn default_expected_identity() -> String {
    "name: MikroTik".to_string()
}

/// Tunables of the shell protocol engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellSettings {
    /// Regular expression matching the device prompt
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Deadline for establishing an SSH connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Default deadline for a full command exchange
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Default deadline for `read_until*` calls
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,

    /// Silence required before stale output counts as drained
    #[serde(default = "default_quiet_window")]
    pub quiet_window_ms: u64,

    /// Upper bound for a single transport read
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_login_prompt")]
    pub login_prompt: String,

    #[serde(default = "default_password_prompt")]
    pub password_prompt: String,

    #[serde(default)]
    pub self_test: SelfTestConfig,

    /// Sent when closing an SSH shell
    #[serde(default = "default_quit_command")]
    pub quit_command: String,

    #[serde(default = "default_quit_timeout")]
    pub quit_timeout_seconds: u64,

    #[serde(default = "default_reboot_command")]
    pub reboot_command: String,

    #[serde(default = "default_reboot_timeout")]
    pub reboot_timeout_seconds: u64,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            connect_timeout_seconds: default_connect_timeout(),
            command_timeout_seconds: default_command_timeout(),
            read_timeout_seconds: default_read_timeout(),
            quiet_window_ms: default_quiet_window(),
            poll_interval_ms: default_poll_interval(),
            login_prompt: default_login_prompt(),
            password_prompt: default_password_prompt(),
            self_test: SelfTestConfig::default(),
            quit_command: default_quit_command(),
            quit_timeout_seconds: default_quit_timeout(),
            reboot_command: default_reboot_command(),
            reboot_timeout_seconds: default_reboot_timeout(),
        }
    }
}

impl ShellSettings {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    #[must_use]
    pub const fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn quit_timeout(&self) -> Duration {
        Duration::from_secs(self.quit_timeout_seconds)
    }

    #[must_use]
    pub const fn reboot_timeout(&self) -> Duration {
        Duration::from_secs(self.reboot_timeout_seconds)
    }
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_command_timeout() -> u64 {
    15
}

const fn default_read_timeout() -> u64 {
    5
}

const fn default_quiet_window() -> u64 {
    500
}

const fn default_poll_interval() -> u64 {
    50
}

fn default_login_prompt() -> String {
    "Login: ".to_string()
}

fn default_password_prompt() -> String {
    "Password: ".to_string()
}

fn default_quit_command() -> String {
    "quit".to_string()
}

const fn default_quit_timeout() -> u64 {
    1
}

fn default_reboot_command() -> String {
    "system reboot".to_string()
}

const fn default_reboot_timeout() -> u64 {
    180
}

/// Locations of the declarative configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub root: PathBuf,
}

impl ConfigPaths {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the framework root.
    ///
    /// Order: `$DEVICE_SHELL_DIR`, the current directory when it has a
    /// `config/` folder, then the user config directory.
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(ROOT_ENV) {
            return Self::new(dir);
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join("config").is_dir() {
            return Self::new(cwd);
        }
        Self::new(
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("device-shell"),
        )
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    #[must_use]
    pub fn devices_file(&self) -> PathBuf {
        self.config_dir().join("devices").join("devices.yaml")
    }

    #[must_use]
    pub fn commands_file(&self) -> PathBuf {
        self.config_dir().join("commands").join("commands.yaml")
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir().join("shell.yaml")
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_kind_parse() {
        assert_eq!("ssh".parse::<ConnectionKind>().unwrap(), ConnectionKind::Ssh);
        assert_eq!(
            "SERIAL".parse::<ConnectionKind>().unwrap(),
            ConnectionKind::Serial
        );
        assert_eq!(
            " Ssh ".parse::<ConnectionKind>().unwrap(),
            ConnectionKind::Ssh
        );
    }

    #[test]
    fn test_connection_kind_unknown() {
        let err = "telnet".parse::<ConnectionKind>().unwrap_err();
        assert!(matches!(err, DeviceError::NoSuchConnectionType { kind } if kind == "telnet"));
    }

    #[test]
    fn test_connection_kind_display_roundtrips() {
        for kind in [ConnectionKind::Ssh, ConnectionKind::Serial] {
            assert_eq!(kind.to_string().parse::<ConnectionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_shell_settings_defaults() {
        let settings = ShellSettings::default();
        assert_eq!(settings.prompt, DEFAULT_PROMPT);
        assert_eq!(settings.command_timeout(), Duration::from_secs(15));
        assert_eq!(settings.read_timeout(), Duration::from_secs(5));
        assert_eq!(settings.quiet_window(), Duration::from_millis(500));
        assert_eq!(settings.self_test.noop_command, "beep");
        assert_eq!(settings.self_test.expected_identity, "name: MikroTik");
    }

    #[test]
    fn test_shell_settings_partial_yaml() {
        let yaml = "quiet_window_ms: 20\nself_test:\n  expected_identity: \"name: lab\"\n";
        let settings: ShellSettings = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(settings.quiet_window(), Duration::from_millis(20));
        assert_eq!(settings.self_test.expected_identity, "name: lab");
        assert_eq!(settings.self_test.identity_command, "system identity print");
        assert_eq!(settings.command_timeout_seconds, 15);
    }

    #[test]
    fn test_default_prompt_matches_device_prompts() {
        let re = regex::Regex::new(DEFAULT_PROMPT).unwrap();
        assert!(re.is_match("[admin@MikroTik] > "));
        assert!(re.is_match("[admin@MikroTik] /ip/address> "));
        assert!(!re.is_match("admin@MikroTik > "));
    }

    #[test]
    fn test_config_paths_layout() {
        let paths = ConfigPaths::new("/srv/lab");
        assert_eq!(
            paths.devices_file(),
            PathBuf::from("/srv/lab/config/devices/devices.yaml")
        );
        assert_eq!(
            paths.commands_file(),
            PathBuf::from("/srv/lab/config/commands/commands.yaml")
        );
        assert_eq!(paths.settings_file(), PathBuf::from("/srv/lab/config/shell.yaml"));
    }
}
