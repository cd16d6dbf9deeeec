//! Transport Port
//!
//! This module defines the byte-level capability the shell engine drives.
//! Concrete transports (serial console, SSH shell channel) implement it; the
//! engine never sees anything beyond these primitives.

use std::time::Duration;

use crate::config::Credentials;
use crate::error::Result;

/// How a session is established on top of an opened transport, and how it is
/// wound down before the transport is closed.
#[derive(Debug, Clone)]
pub enum SessionProfile {
    /// Raw console: log in through the login/password prompts after opening,
    /// drain pending output before closing.
    SerialConsole { credentials: Credentials },
    /// Authenticated interactive shell: nothing to do after opening, send the
    /// quit command before closing.
    SecureShell,
}

/// Byte-level link to a device shell.
///
/// Reads must never block longer than the configured read timeout, so that
/// the engine's deadline checks stay accurate.
pub trait Transport: Send {
    /// Human readable identifier used in logs and errors
    fn describe(&self) -> String;

    /// Session behaviour expected on this link
    fn session_profile(&self) -> SessionProfile;

    /// Establish the underlying link
    fn open(&mut self) -> Result<()>;

    /// Tear down the underlying link
    fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Non-blocking check for pending input
    fn output_available(&mut self) -> Result<bool>;

    /// Read up to `max` bytes; returns an empty buffer when nothing arrived
    /// within the read timeout.
    fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn read_timeout(&self) -> Duration;

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

#[cfg(test)]
pub mod mock {
    //! Scripted in-memory device used by the engine tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::DeviceError;

    pub const PROMPT: &str = "[admin@MikroTik] > ";

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub enum LoginStage {
        #[default]
        LoggedIn,
        AwaitUser,
        AwaitPassword,
    }

    #[derive(Default)]
    pub struct DeviceState {
        pub login: LoginStage,
        pub responses: HashMap<String, String>,
        pub pending: VecDeque<u8>,
        pub written: Vec<String>,
        pub connected: bool,
        pub open_calls: usize,
        pub close_calls: usize,
        pub reboot_command: Option<String>,
        pub hangup_command: Option<String>,
        pub hung_up: bool,
        line: String,
    }

    /// Shell that echoes each line behind a prompt and answers from a table.
    #[derive(Clone)]
    pub struct MockShell {
        pub state: Arc<Mutex<DeviceState>>,
        profile: SessionProfile,
        timeout: Duration,
    }

    impl MockShell {
        pub fn new() -> Self {
            let mut state = DeviceState::default();
            state
                .responses
                .insert("system identity print".to_string(), "  name: MikroTik".to_string());
            state.responses.insert("beep".to_string(), String::new());
            Self {
                state: Arc::new(Mutex::new(state)),
                profile: SessionProfile::SecureShell,
                timeout: Duration::from_millis(5),
            }
        }

        pub fn with_profile(mut self, profile: SessionProfile) -> Self {
            self.profile = profile;
            self
        }

        pub fn require_login(&self) {
            self.state.lock().unwrap().login = LoginStage::AwaitUser;
        }

        pub fn respond(&self, command: &str, output: &str) {
            self.state
                .lock()
                .unwrap()
                .responses
                .insert(command.to_string(), output.to_string());
        }

        /// Drop back to the login prompt when `command` is received.
        pub fn reboot_on(&self, command: &str) {
            self.state.lock().unwrap().reboot_command = Some(command.to_string());
        }

        /// Echo `command`, then drop the link without another prompt.
        pub fn hang_up_on(&self, command: &str) {
            self.state.lock().unwrap().hangup_command = Some(command.to_string());
        }

        pub fn inject(&self, data: &str) {
            self.state.lock().unwrap().pending.extend(data.bytes());
        }

        pub fn written(&self) -> Vec<String> {
            self.state.lock().unwrap().written.clone()
        }
    }

    impl Transport for MockShell {
        fn describe(&self) -> String {
            "mock".to_string()
        }

        fn session_profile(&self) -> SessionProfile {
            self.profile.clone()
        }

        fn open(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.connected = true;
            state.hung_up = false;
            state.open_calls += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.connected = false;
            state.close_calls += 1;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.state.lock().unwrap().connected
        }

        fn output_available(&mut self) -> Result<bool> {
            Ok(!self.state.lock().unwrap().pending.is_empty())
        }

        fn read(&mut self, max: usize) -> Result<Vec<u8>> {
            let (chunk, hung_up): (Vec<u8>, bool) = {
                let mut state = self.state.lock().unwrap();
                let n = max.min(state.pending.len());
                (state.pending.drain(..n).collect(), state.hung_up)
            };
            if chunk.is_empty() && hung_up {
                return Err(DeviceError::ConnectionClosed {
                    target: "mock".to_string(),
                });
            }
            if chunk.is_empty() {
                std::thread::sleep(self.timeout);
            }
            Ok(chunk)
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(DeviceError::Transport {
                    target: "mock".to_string(),
                    reason: "not connected".to_string(),
                });
            }
            state.line.push_str(&String::from_utf8_lossy(data));
            while let Some(pos) = state.line.find("\r\n") {
                let line: String = state.line.drain(..pos + 2).collect();
                let command = line.trim_end_matches("\r\n").to_string();
                state.written.push(command.clone());
                let stage = state.login;
                match stage {
                    LoginStage::AwaitUser if command.is_empty() => {
                        state.pending.extend(b"\r\nLogin: ");
                        continue;
                    }
                    LoginStage::AwaitUser => {
                        state.login = LoginStage::AwaitPassword;
                        state.pending.extend(format!("{command}\r\nPassword: ").bytes());
                        continue;
                    }
                    LoginStage::AwaitPassword => {
                        state.login = LoginStage::LoggedIn;
                        state.pending.extend(format!("\r\n\r\n{PROMPT}").bytes());
                        continue;
                    }
                    LoginStage::LoggedIn => {}
                }
                if state.hangup_command.as_deref() == Some(command.as_str()) {
                    state.hung_up = true;
                    state.pending.extend(format!("{PROMPT}{command}\r\n").bytes());
                    continue;
                }
                if state.reboot_command.as_deref() == Some(command.as_str()) {
                    state.login = LoginStage::AwaitUser;
                    state
                        .pending
                        .extend(format!("{PROMPT}{command}\r\nRebooting...\r\n\r\nLogin: ").bytes());
                    continue;
                }
                let reply = match state.responses.get(&command) {
                    Some(output) if output.is_empty() => {
                        format!("{PROMPT}{command}\r\n\r\n{PROMPT}")
                    }
                    Some(output) => format!("{PROMPT}{command}\r\n{output}\r\n\r\n{PROMPT}"),
                    None if command.is_empty() => PROMPT.to_string(),
                    None => format!(
                        "{PROMPT}{command}\r\nbad command name {command}\r\n\r\n{PROMPT}"
                    ),
                };
                state.pending.extend(reply.bytes());
            }
            Ok(())
        }

        fn read_timeout(&self) -> Duration {
            self.timeout
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.timeout = timeout.min(Duration::from_millis(5));
            Ok(())
        }
    }
}
