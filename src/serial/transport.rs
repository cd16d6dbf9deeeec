//! Serial console transport
//!
//! Thin wrapper around a `serialport` handle. The console gives no
//! authentication on its own, so sessions on it log in through the shell's
//! login prompt.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use crate::error::{DeviceError, Result};
use crate::ports::{SerialParams, SessionProfile, Transport};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Settling delay after every write; consoles drop input sent back to back.
const WRITE_SETTLE: Duration = Duration::from_millis(50);

/// Login console on a serial port
pub struct SerialTransport {
    params: SerialParams,
    port: Option<Box<dyn SerialPort>>,
    read_timeout: Duration,
}

impl SerialTransport {
    #[must_use]
    pub const fn new(params: SerialParams) -> Self {
        Self {
            params,
            port: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    fn serial_error(&self, e: &impl std::fmt::Display) -> DeviceError {
        DeviceError::Serial {
            port: self.params.port.clone(),
            reason: e.to_string(),
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let target = self.params.port.clone();
        self.port
            .as_mut()
            .ok_or(DeviceError::ConnectionClosed { target })
    }
}

impl Transport for SerialTransport {
    fn describe(&self) -> String {
        format!("serial://{}@{}", self.params.port, self.params.baud_rate)
    }

    fn session_profile(&self) -> SessionProfile {
        SessionProfile::SerialConsole {
            credentials: self.params.credentials.clone(),
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        info!(port = %self.params.port, baud = self.params.baud_rate, "Opening serial port");
        let port = serialport::new(&self.params.port, self.params.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| self.serial_error(&e))?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle releases the device
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn output_available(&mut self) -> Result<bool> {
        let waiting = self.port()?.bytes_to_read();
        waiting
            .map(|n| n > 0)
            .map_err(|e| self.serial_error(&e))
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let result = self.port()?.read(&mut buf);
        match result {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(self.serial_error(&e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;
        let result = port.write_all(data).and_then(|()| port.flush());
        result.map_err(|e| self.serial_error(&e))?;
        thread::sleep(WRITE_SETTLE);
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            let result = port.set_timeout(timeout);
            result.map_err(|e| self.serial_error(&e))?;
        }
        Ok(())
    }
}
