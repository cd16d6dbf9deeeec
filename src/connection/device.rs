use std::sync::Arc;

use tracing::{info, warn};

use crate::commands::{CommandNode, CommandTree};
use crate::config::{ConnectionKind, DeviceRecord};
use crate::error::Result;
use crate::ports::{SerialParams, SshParams, TransportConnector};
use crate::serial::DEFAULT_BAUD_RATE;
use crate::shell::Shell;

use super::context::DeviceContext;

const DEFAULT_SSH_PORT: u16 = 22;

/// An opened shell on one device with its command tree bound to it.
///
/// Call [`DeviceConnection::close`] to release the device; dropping the
/// connection closes it as well if that has not happened yet.
#[derive(Debug)]
pub struct DeviceConnection {
    kind: ConnectionKind,
    device: DeviceRecord,
    shell: Arc<Shell>,
    commands: CommandTree,
}

impl DeviceConnection {
    /// Resolve `device_name`, open its shell over `kind` and bind the
    /// command tree.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchDevice` before any transport is built if the device is
    /// not declared, `ConfigInvalid` if a field the connection kind needs is
    /// missing, or any error from opening the shell.
    pub fn open(
        kind: ConnectionKind,
        device_name: &str,
        context: &DeviceContext,
        connector: &dyn TransportConnector,
    ) -> Result<Self> {
        let device = context.devices.get(device_name)?.clone();
        let credentials = context.credentials.clone();

        let transport = match kind {
            ConnectionKind::Ssh => {
                let host = device.require("ip", device.ip.as_deref())?.to_string();
                let port = device.ssh_port.unwrap_or(DEFAULT_SSH_PORT);
                connector.ssh(SshParams {
                    host,
                    port,
                    credentials,
                    connect_timeout: context.settings.connect_timeout(),
                })?
            }
            ConnectionKind::Serial => {
                let port = device
                    .require("serial_port", device.serial_port.as_deref())?
                    .to_string();
                let baud_rate = device.baudrate.unwrap_or(DEFAULT_BAUD_RATE);
                connector.serial(SerialParams {
                    port,
                    baud_rate,
                    credentials,
                })?
            }
        };

        let shell = Arc::new(Shell::from_boxed(transport, context.settings.clone())?);
        info!(device = %device.name, kind = %kind, peer = %shell.target(), "Opening device connection");
        shell.open()?;

        let commands = CommandTree::build(&context.commands, Arc::clone(&shell));
        Ok(Self {
            kind,
            device,
            shell,
            commands,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ConnectionKind {
        self.kind
    }

    #[must_use]
    pub const fn device(&self) -> &DeviceRecord {
        &self.device
    }

    #[must_use]
    pub const fn shell(&self) -> &Arc<Shell> {
        &self.shell
    }

    #[must_use]
    pub const fn commands(&self) -> &CommandTree {
        &self.commands
    }

    /// Shortcut for [`CommandTree::command`].
    ///
    /// # Errors
    ///
    /// Returns `NoSuchCommand` if the command is not declared.
    pub fn command(&self, name: &str) -> Result<&CommandNode> {
        self.commands.command(name)
    }

    /// Close the shell. Later calls, and the drop, do nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close.
    pub fn close(&self) -> Result<()> {
        self.shell.close()
    }
}

impl Drop for DeviceConnection {
    fn drop(&mut self) {
        if let Err(e) = self.shell.close() {
            warn!(device = %self.device.name, error = %e, "Failed to close device connection");
        }
    }
}
