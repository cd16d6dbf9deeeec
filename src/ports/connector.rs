//! Transport Connector Port
//!
//! This module defines how transports are created from resolved device
//! parameters, abstracting the concrete serial and SSH implementations so the
//! connection lifecycle can be tested without hardware.

use std::time::Duration;

use crate::config::Credentials;
use crate::error::Result;

use super::transport::Transport;

/// Parameters for an SSH shell transport
#[derive(Debug, Clone)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
}

/// Parameters for a serial console transport
#[derive(Debug, Clone)]
pub struct SerialParams {
    pub port: String,
    pub baud_rate: u32,
    pub credentials: Credentials,
}

/// Trait for creating (unopened) transports
pub trait TransportConnector: Send + Sync {
    fn ssh(&self, params: SshParams) -> Result<Box<dyn Transport>>;

    fn serial(&self, params: SerialParams) -> Result<Box<dyn Transport>>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;
    use crate::ports::SessionProfile;
    use crate::ports::transport::mock::MockShell;

    /// Connector handing out clones of one scripted shell
    pub struct MockConnector {
        pub shell: MockShell,
        pub ssh_calls: Mutex<Vec<SshParams>>,
        pub serial_calls: Mutex<Vec<SerialParams>>,
    }

    impl MockConnector {
        pub fn new(shell: MockShell) -> Self {
            Self {
                shell,
                ssh_calls: Mutex::new(Vec::new()),
                serial_calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.ssh_calls.lock().unwrap().len() + self.serial_calls.lock().unwrap().len()
        }
    }

    impl TransportConnector for MockConnector {
        fn ssh(&self, params: SshParams) -> Result<Box<dyn Transport>> {
            self.ssh_calls.lock().unwrap().push(params);
            Ok(Box::new(self.shell.clone()))
        }

        fn serial(&self, params: SerialParams) -> Result<Box<dyn Transport>> {
            let profile = SessionProfile::SerialConsole {
                credentials: params.credentials.clone(),
            };
            self.serial_calls.lock().unwrap().push(params);
            Ok(Box::new(self.shell.clone().with_profile(profile)))
        }
    }
}
