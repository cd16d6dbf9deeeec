//! Session establishment and wind-down
//!
//! Runs once per open on top of a freshly connected transport: a login
//! handshake on serial consoles, nothing on SSH shells. Both paths then go
//! through the same connectivity self-test.

use std::thread;

use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{DeviceError, Result};
use crate::ports::SessionProfile;

use super::io::ShellIo;

/// Bytes inspected when looking for a login prompt.
const LOGIN_PROBE_BYTES: usize = 200;

/// Bring the shell to a ready prompt.
///
/// # Errors
///
/// Returns an error if a prompt does not show up in time or the transport
/// fails.
pub fn establish(io: &mut ShellIo<'_>, profile: &SessionProfile) -> Result<()> {
    match profile {
        SessionProfile::SerialConsole { credentials } => serial_login(io, credentials),
        SessionProfile::SecureShell => {
            debug!("Shell authenticated by transport, no login needed");
            Ok(())
        }
    }
}

fn serial_login(io: &mut ShellIo<'_>, credentials: &Credentials) -> Result<()> {
    let quiet = io.settings().quiet_window();
    let read_timeout = io.settings().read_timeout();
    let login_prompt = io.settings().login_prompt.clone();
    let password_prompt = io.settings().password_prompt.clone();

    // A blank line makes the console print either a prompt or a login request
    io.writeln("")?;
    io.clear_output_buffer(quiet)?;
    io.writeln("")?;
    thread::sleep(quiet);

    let probe = io.read(LOGIN_PROBE_BYTES)?;
    let probe = String::from_utf8_lossy(&probe);

    if probe.contains(login_prompt.as_str()) {
        info!(user = %credentials.username, "Logging in on serial console");
        io.clear_output_buffer(quiet)?;
        io.writeln(&credentials.username)?;
        io.read_until(&password_prompt, read_timeout)?;
        io.writeln(&credentials.password)?;
    } else {
        debug!("Serial console already logged in");
        io.writeln("")?;
    }

    io.read_until_prompt(read_timeout)?;
    Ok(())
}

/// Check that the session talks to the expected device.
///
/// # Errors
///
/// Returns `ConnectionTest` carrying the observed response on mismatch.
pub fn self_test(io: &mut ShellIo<'_>) -> Result<()> {
    let test = io.settings().self_test.clone();
    let timeout = io.settings().command_timeout();

    io.send_command(&test.noop_command, timeout, true)?;
    let response = io.send_command(&test.identity_command, timeout, true)?;
    let response = response.as_str();

    let success = response == test.expected_identity;
    info!(success, "Initial test finished");
    if success {
        Ok(())
    } else {
        Err(DeviceError::ConnectionTest {
            response: response.to_string(),
        })
    }
}

/// Leave the shell in a clean state before the transport is closed.
///
/// Never fails: a quit command that gets no prompt back, or makes the
/// device hang up, is expected; any other problem is only logged so the
/// close can go ahead.
pub fn wind_down(io: &mut ShellIo<'_>, profile: &SessionProfile) {
    let result = match profile {
        SessionProfile::SerialConsole { .. } => {
            let quiet = io.settings().quiet_window();
            io.clear_output_buffer(quiet)
        }
        SessionProfile::SecureShell => {
            let quit = io.settings().quit_command.clone();
            let timeout = io.settings().quit_timeout();
            io.exchange(&quit, timeout).map(|_| ())
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if e.is_timeout() || matches!(e, DeviceError::ConnectionClosed { .. }) => {
            info!("Console is no longer accessible");
        }
        Err(e) => warn!(error = %e, "Failed to settle shell before closing"),
    }
}
