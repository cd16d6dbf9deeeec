//! Deadline-bounded read primitives over a locked transport.
//!
//! Every loop here re-checks an absolute deadline on each iteration, so a
//! call never outlives its timeout by more than one transport read.

use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, trace};

use crate::config::ShellSettings;
use crate::error::{DeviceError, Result};
use crate::ports::Transport;

use super::response::extract_response;
use super::{EXCHANGE_TARGET, RAW_TARGET};

/// Line terminator appended to everything written to the shell.
pub const LINE_END: &str = "\r\n";

/// Bytes pulled per read while flushing stale output.
const DRAIN_CHUNK: usize = 1024;

/// Pause between idle polls of `output_available`.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Exclusive view of a transport for the duration of one lock acquisition.
pub struct ShellIo<'a> {
    transport: &'a mut dyn Transport,
    prompt: &'a Regex,
    settings: &'a ShellSettings,
}

impl<'a> ShellIo<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        prompt: &'a Regex,
        settings: &'a ShellSettings,
    ) -> Self {
        Self {
            transport,
            prompt,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &ShellSettings {
        self.settings
    }

    pub fn transport(&mut self) -> &mut dyn Transport {
        &mut *self.transport
    }

    /// Write `data` followed by the line terminator.
    pub fn writeln(&mut self, data: &str) -> Result<()> {
        let line = format!("{data}{LINE_END}");
        self.transport.write(line.as_bytes())
    }

    pub fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        self.transport.read(max)
    }

    /// Read one byte at a time until `expected` appears in the accumulated
    /// output.
    pub fn read_until(&mut self, expected: &str, timeout: Duration) -> Result<String> {
        let deadline = deadline_after(timeout);
        let needle = expected.as_bytes();
        let mut output = Vec::new();

        while before(deadline) {
            let chunk = self.transport.read(1)?;
            if chunk.is_empty() {
                continue;
            }
            let appended = chunk.len();
            output.extend_from_slice(&chunk);
            if tail_contains(&output, needle, appended) {
                return Ok(String::from_utf8_lossy(&output).into_owned());
            }
        }

        Err(read_timeout(expected, &output, timeout))
    }

    /// Read one byte at a time until `pattern` matches the decoded output.
    ///
    /// An incomplete multi-byte sequence at the end of the buffer only means
    /// "not matched yet".
    pub fn read_until_regexp(&mut self, pattern: &Regex, timeout: Duration) -> Result<String> {
        let deadline = deadline_after(timeout);
        let mut output = Vec::new();

        while before(deadline) {
            let chunk = self.transport.read(1)?;
            if chunk.is_empty() {
                continue;
            }
            output.extend_from_slice(&chunk);
            match std::str::from_utf8(&output) {
                Ok(text) => {
                    if pattern.is_match(text) {
                        return Ok(text.to_string());
                    }
                }
                // Sequence cut short: wait for the remaining bytes
                Err(e) if e.error_len().is_none() => {}
                Err(_) => {
                    let text = String::from_utf8_lossy(&output);
                    if pattern.is_match(&text) {
                        return Ok(text.into_owned());
                    }
                }
            }
        }

        Err(read_timeout(pattern.as_str(), &output, timeout))
    }

    pub fn read_until_prompt(&mut self, timeout: Duration) -> Result<String> {
        let prompt = self.prompt;
        self.read_until_regexp(prompt, timeout)
    }

    /// Discard pending output until the link has been silent for
    /// `quiet_window`. The window restarts whenever data arrives.
    pub fn clear_output_buffer(&mut self, quiet_window: Duration) -> Result<()> {
        let mut deadline = deadline_after(quiet_window);
        let mut discarded = 0usize;

        while before(deadline) {
            if self.transport.output_available()? {
                discarded += self.transport.read(DRAIN_CHUNK)?.len();
                deadline = deadline_after(quiet_window);
            } else {
                let remaining = deadline.map_or(IDLE_BACKOFF, |d| {
                    d.saturating_duration_since(Instant::now())
                });
                thread::sleep(IDLE_BACKOFF.min(remaining));
            }
        }

        if discarded > 0 {
            trace!(bytes = discarded, "Discarded stale shell output");
        }
        Ok(())
    }

    /// One command/response exchange synchronized on the prompt.
    ///
    /// The first prompt match consumes the echo of the command, the second
    /// marks the end of its output.
    pub fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let quiet = self.settings.quiet_window();
        self.clear_output_buffer(quiet)?;

        info!(target: EXCHANGE_TARGET, "=> {command}");
        self.writeln(command)?;
        self.read_until_prompt(timeout)?;

        let data = self.read_until_prompt(timeout)?;
        debug!(target: RAW_TARGET, "Raw response: <{data}>");
        let response = extract_response(command, &data, self.prompt);

        self.clear_output_buffer(quiet)?;
        Ok(response)
    }

    /// [`ShellIo::exchange`], optionally trimmed, with the response logged
    /// on the exchange stream.
    pub fn send_command(&mut self, command: &str, timeout: Duration, strip: bool) -> Result<String> {
        let response = self.exchange(command, timeout)?;
        let response = if strip {
            response.trim().to_string()
        } else {
            response
        };
        info!(target: EXCHANGE_TARGET, "=< {response}");
        Ok(response)
    }
}

/// Absolute deadline `timeout` from now; `None` when it lies beyond what
/// `Instant` can represent, meaning the wait is unbounded.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn before(deadline: Option<Instant>) -> bool {
    deadline.is_none_or(|d| Instant::now() < d)
}

/// Whether `needle` occurs in the part of `haystack` that could contain a
/// match created by the last `appended` bytes.
fn tail_contains(haystack: &[u8], needle: &[u8], appended: usize) -> bool {
    if needle.is_empty() {
        return true;
    }
    let window = needle.len() + appended - 1;
    let start = haystack.len().saturating_sub(window);
    haystack[start..]
        .windows(needle.len())
        .any(|candidate| candidate == needle)
}

fn read_timeout(expected: &str, output: &[u8], timeout: Duration) -> DeviceError {
    DeviceError::ReadTimeout {
        expected: expected.to_string(),
        received: String::from_utf8_lossy(output).trim().to_string(),
        timeout,
    }
}
