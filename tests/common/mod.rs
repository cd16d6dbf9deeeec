//! Scripted in-memory device shared by the integration tests.
//!
//! Echoes every line behind a `[admin@MikroTik] > ` prompt and answers from
//! a response table, the way the real shell does.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use device_shell::config::{Credentials, ShellSettings};
use device_shell::error::{DeviceError, Result};
use device_shell::ports::{SerialParams, SessionProfile, SshParams, Transport, TransportConnector};

pub const PROMPT: &str = "[admin@MikroTik] > ";

/// Settings with short windows so tests stay fast
pub fn fast_settings() -> ShellSettings {
    ShellSettings {
        quiet_window_ms: 5,
        poll_interval_ms: 2,
        read_timeout_seconds: 1,
        command_timeout_seconds: 2,
        quit_timeout_seconds: 1,
        ..ShellSettings::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Login {
    Done,
    AwaitUser,
    AwaitPassword,
}

struct State {
    login: Login,
    responses: HashMap<String, String>,
    hanging: HashSet<String>,
    pending: VecDeque<u8>,
    written: Vec<String>,
    partial_line: String,
    connected: bool,
    open_calls: usize,
    close_calls: usize,
}

/// Scripted device; clones share the same state.
#[derive(Clone)]
pub struct ScriptedDevice {
    state: Arc<Mutex<State>>,
    profile: SessionProfile,
    read_timeout: Duration,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    pub fn new() -> Self {
        let mut responses = HashMap::new();
        responses.insert("beep".to_string(), String::new());
        responses.insert(
            "system identity print".to_string(),
            "  name: MikroTik".to_string(),
        );
        Self {
            state: Arc::new(Mutex::new(State {
                login: Login::Done,
                responses,
                hanging: HashSet::new(),
                pending: VecDeque::new(),
                written: Vec::new(),
                partial_line: String::new(),
                connected: false,
                open_calls: 0,
                close_calls: 0,
            })),
            profile: SessionProfile::SecureShell,
            read_timeout: Duration::from_millis(2),
        }
    }

    /// Same device state, seen through a serial console.
    pub fn serial(&self, credentials: Credentials) -> Self {
        Self {
            profile: SessionProfile::SerialConsole { credentials },
            ..self.clone()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn respond(&self, command: &str, output: &str) {
        self.state()
            .responses
            .insert(command.to_string(), output.to_string());
    }

    /// Echo `command` but never print the prompt after it.
    pub fn hang_on(&self, command: &str) {
        self.state().hanging.insert(command.to_string());
    }

    pub fn inject(&self, data: &[u8]) {
        self.state().pending.extend(data);
    }

    /// Ask for username and password on the next blank line.
    pub fn require_login(&self) {
        self.state().login = Login::AwaitUser;
    }

    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.state().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    pub fn connected(&self) -> bool {
        self.state().connected
    }

    fn reply(state: &mut State, command: &str) {
        let login = state.login;
        match login {
            Login::AwaitUser if command.is_empty() => {
                state.pending.extend(b"\r\nLogin: ");
                return;
            }
            Login::AwaitUser => {
                state.login = Login::AwaitPassword;
                state.pending.extend(format!("{command}\r\nPassword: ").bytes());
                return;
            }
            Login::AwaitPassword => {
                state.login = Login::Done;
                state.pending.extend(format!("\r\n\r\n{PROMPT}").bytes());
                return;
            }
            Login::Done => {}
        }

        if state.hanging.contains(command) {
            state.pending.extend(format!("{PROMPT}{command}\r\n").bytes());
            return;
        }

        let reply = match state.responses.get(command) {
            None if command.is_empty() => PROMPT.to_string(),
            Some(output) if output.is_empty() => format!("{PROMPT}{command}\r\n\r\n{PROMPT}"),
            Some(output) => format!("{PROMPT}{command}\r\n{output}\r\n\r\n{PROMPT}"),
            None => format!("{PROMPT}{command}\r\nbad command name {command}\r\n\r\n{PROMPT}"),
        };
        state.pending.extend(reply.bytes());
    }
}

impl Transport for ScriptedDevice {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn session_profile(&self) -> SessionProfile {
        self.profile.clone()
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = true;
        state.open_calls += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.close_calls += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn output_available(&mut self) -> Result<bool> {
        Ok(!self.state().pending.is_empty())
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let chunk: Vec<u8> = {
            let mut state = self.state();
            let n = max.min(state.pending.len());
            state.pending.drain(..n).collect()
        };
        if chunk.is_empty() {
            std::thread::sleep(self.read_timeout);
        }
        Ok(chunk)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        if !state.connected {
            return Err(DeviceError::Transport {
                target: "scripted".to_string(),
                reason: "write on closed device".to_string(),
            });
        }
        state.partial_line.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = state.partial_line.find("\r\n") {
            let line: String = state.partial_line.drain(..pos + 2).collect();
            let command = line.trim_end_matches("\r\n").to_string();
            state.written.push(command.clone());
            Self::reply(state, &command);
        }
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}

/// Connector handing out the scripted device and recording requests
#[derive(Default)]
pub struct ScriptedConnector {
    pub device: ScriptedDevice,
    pub ssh_requests: Mutex<Vec<SshParams>>,
    pub serial_requests: Mutex<Vec<SerialParams>>,
}

impl ScriptedConnector {
    pub fn new(device: ScriptedDevice) -> Self {
        Self {
            device,
            ssh_requests: Mutex::new(Vec::new()),
            serial_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> usize {
        self.ssh_requests.lock().unwrap().len() + self.serial_requests.lock().unwrap().len()
    }
}

impl TransportConnector for ScriptedConnector {
    fn ssh(&self, params: SshParams) -> Result<Box<dyn Transport>> {
        self.ssh_requests.lock().unwrap().push(params);
        Ok(Box::new(self.device.clone()))
    }

    fn serial(&self, params: SerialParams) -> Result<Box<dyn Transport>> {
        let device = self.device.serial(params.credentials.clone());
        self.serial_requests.lock().unwrap().push(params);
        Ok(Box::new(device))
    }
}
