use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ShellSettings;
use crate::error::{DeviceError, Result};
use crate::ports::{SessionProfile, Transport};

use super::io::ShellIo;
use super::session;

/// Shell protocol engine bound to one transport.
///
/// All exchanges go through a single lock around the transport, so at most
/// one command is in flight at any time and concurrent callers queue up.
pub struct Shell {
    transport: Mutex<Box<dyn Transport>>,
    prompt: Regex,
    settings: ShellSettings,
    target: String,
    open: AtomicBool,
}

impl Shell {
    /// Bind an unopened transport to a new engine.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the prompt pattern is not a valid regex.
    pub fn new<T: Transport + 'static>(transport: T, settings: ShellSettings) -> Result<Self> {
        Self::from_boxed(Box::new(transport), settings)
    }

    /// Same as [`Shell::new`] for an already boxed transport.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the prompt pattern is not a valid regex.
    pub fn from_boxed(transport: Box<dyn Transport>, settings: ShellSettings) -> Result<Self> {
        let prompt = Regex::new(&settings.prompt).map_err(|e| DeviceError::ConfigInvalid {
            field: "prompt".to_string(),
            reason: format!("Invalid regex '{}': {e}", settings.prompt),
        })?;
        let target = transport.describe();

        Ok(Self {
            transport: Mutex::new(transport),
            prompt,
            settings,
            target,
            open: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub const fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    #[must_use]
    pub const fn prompt(&self) -> &Regex {
        &self.prompt
    }

    /// Whether `open` succeeded and `close` has not been called since.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock_transport().is_connected()
    }

    /// Open the transport, establish the session and run the self-test.
    ///
    /// On failure the transport is closed again before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened, the login
    /// handshake times out, or the self-test sees an unexpected identity.
    pub fn open(&self) -> Result<()> {
        let mut transport = self.lock_transport();
        if self.is_open() {
            debug!(peer = %self.target, "Connection already open");
            return Ok(());
        }

        info!(peer = %self.target, "Connecting to device");
        transport.open()?;

        let profile = transport.session_profile();
        let result = transport
            .set_read_timeout(self.settings.poll_interval())
            .and_then(|()| {
                let mut io = self.io(&mut transport);
                session::establish(&mut io, &profile)?;
                session::self_test(&mut io)
            });

        if let Err(e) = result {
            warn!(peer = %self.target, error = %e, "Connection setup failed");
            if let Err(close_err) = transport.close() {
                warn!(peer = %self.target, error = %close_err, "Failed to close transport");
            }
            return Err(e);
        }

        self.open.store(true, Ordering::SeqCst);
        info!(peer = %self.target, "Connection established");
        Ok(())
    }

    /// Settle the shell and close the transport. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only if the transport itself fails to close.
    pub fn close(&self) -> Result<()> {
        let mut transport = self.lock_transport();
        if !self.open.swap(false, Ordering::SeqCst) {
            debug!(peer = %self.target, "Connection already closed");
            return Ok(());
        }

        info!(peer = %self.target, "Closing connection to device");
        if transport.is_connected() {
            let profile = transport.session_profile();
            let mut io = self.io(&mut transport);
            session::wind_down(&mut io, &profile);
        }
        transport.close()?;
        info!(peer = %self.target, "Connection closed");
        Ok(())
    }

    /// Close and reopen, re-running session establishment and self-test.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Shell::close`] or [`Shell::open`].
    pub fn restart_connection(&self) -> Result<()> {
        self.close()?;
        self.open()
    }

    /// Send `command` and return its output, waiting for the prompt at most
    /// `timeout` per read.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the engine is not open, `ReadTimeout` if
    /// a prompt does not arrive in time, or a transport error.
    pub fn send_command(&self, command: &str, timeout: Duration, strip: bool) -> Result<String> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).send_command(command, timeout, strip)
    }

    /// [`Shell::send_command`] with the configured timeout and stripping.
    ///
    /// # Errors
    ///
    /// See [`Shell::send_command`].
    pub fn send(&self, command: &str) -> Result<String> {
        self.send_command(command, self.settings.command_timeout(), true)
    }

    /// Write a raw line without waiting for anything.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the engine is not open, or a transport error.
    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).writeln(line)
    }

    /// Read until `expected` appears in the output.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` with the partial output if it does not appear in time.
    pub fn read_until(&self, expected: &str, timeout: Duration) -> Result<String> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).read_until(expected, timeout)
    }

    /// Read until `pattern` matches the output.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` with the partial output if it does not match in time.
    pub fn read_until_regexp(&self, pattern: &Regex, timeout: Duration) -> Result<String> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).read_until_regexp(pattern, timeout)
    }

    /// Read until the configured prompt shows up.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` with the partial output if no prompt arrives in time.
    pub fn read_until_prompt(&self, timeout: Duration) -> Result<String> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).read_until_prompt(timeout)
    }

    /// Drain output until the link stays silent for `quiet_window`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the engine is not open, or a transport error.
    pub fn clear_output_buffer(&self, quiet_window: Duration) -> Result<()> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;
        self.io(&mut transport).clear_output_buffer(quiet_window)
    }

    /// Reboot a serial console device and log back in once it is up.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` on SSH shells, which lose the connection on
    /// reboot, and `ReadTimeout` if the login prompt does not come back.
    pub fn reboot(&self) -> Result<()> {
        let mut transport = self.lock_transport();
        self.ensure_open(&**transport)?;

        let profile = transport.session_profile();
        if !matches!(profile, SessionProfile::SerialConsole { .. }) {
            return Err(DeviceError::Unsupported {
                operation: "reboot".to_string(),
                target: self.target.clone(),
            });
        }

        info!(peer = %self.target, "Rebooting device");
        let mut io = self.io(&mut transport);
        io.writeln(&self.settings.reboot_command)?;
        io.read_until(&self.settings.login_prompt, self.settings.reboot_timeout())?;
        session::establish(&mut io, &profile)?;
        session::self_test(&mut io)?;
        info!(peer = %self.target, "Device back after reboot");
        Ok(())
    }

    fn lock_transport(&self) -> MutexGuard<'_, Box<dyn Transport>> {
        // A panic mid-exchange leaves stale bytes, which the next exchange drains
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn io<'a>(&'a self, transport: &'a mut Box<dyn Transport>) -> ShellIo<'a> {
        ShellIo::new(transport.as_mut(), &self.prompt, &self.settings)
    }

    fn ensure_open(&self, transport: &dyn Transport) -> Result<()> {
        if self.is_open() && transport.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::ConnectionClosed {
                target: self.target.clone(),
            })
        }
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("target", &self.target)
            .field("prompt", &self.prompt.as_str())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
