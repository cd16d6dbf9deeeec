use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config, Handle, Handler};
use russh::keys::PublicKey;
use tokio::time::timeout;

use crate::error::{DeviceError, Result};
use crate::ports::SshParams;

/// Terminal requested for the interactive shell; the width keeps long
/// device output from being wrapped.
const TERM: &str = "vt100";
const TERM_COLUMNS: u32 = 512;
const TERM_ROWS: u32 = 24;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sanitize SSH error messages to prevent credential leakage.
fn sanitize_ssh_error(error: &impl std::fmt::Display) -> String {
    let msg = error.to_string();
    if msg.len() > 500 {
        let mut end = 500;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &msg[..end])
    } else {
        msg
    }
}

/// Devices are reached on lab networks with freshly generated host keys,
/// so every server key is accepted.
pub struct ClientHandler {
    host: String,
}

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            host = %self.host,
            algorithm = %server_public_key.algorithm(),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// Authenticated SSH connection to one device
pub struct SshClient {
    handle: Handle<ClientHandler>,
    host: String,
}

impl SshClient {
    /// Connect and authenticate with username and password.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TCP/SSH connection cannot be established within the timeout
    /// - Password authentication is rejected
    pub async fn connect(params: &SshParams) -> Result<Self> {
        let host = format!("{}:{}", params.host, params.port);
        let config = Arc::new(Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            keepalive_max: 3,
            ..Default::default()
        });
        let handler = ClientHandler { host: host.clone() };
        let timeout_secs = params.connect_timeout.as_secs();

        let mut handle = timeout(
            params.connect_timeout,
            client::connect(config, (params.host.as_str(), params.port), handler),
        )
        .await
        .map_err(|_| {
            tracing::error!(host = %host, timeout_secs, "SSH connection timeout");
            DeviceError::SshConnection {
                host: host.clone(),
                reason: format!("Connection timeout after {timeout_secs}s"),
            }
        })?
        .map_err(|e| {
            tracing::error!(host = %host, error = %e, "SSH connection failed");
            DeviceError::SshConnection {
                host: host.clone(),
                reason: sanitize_ssh_error(&e),
            }
        })?;

        let user = &params.credentials.username;
        let auth_result = handle
            .authenticate_password(user, params.credentials.password.as_str())
            .await
            .map_err(|e| {
                tracing::error!(host = %host, user = %user, error = %sanitize_ssh_error(&e), "SSH password authentication error");
                DeviceError::SshAuth {
                    user: user.clone(),
                    host: format!("{host}: authentication failed"),
                }
            })?;

        if !auth_result.success() {
            tracing::error!(host = %host, user = %user, "SSH password authentication failed");
            return Err(DeviceError::SshAuth {
                user: user.clone(),
                host,
            });
        }

        Ok(Self { handle, host })
    }

    /// Open an interactive shell channel with a pseudo terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened or the pty/shell
    /// requests are rejected by the server.
    pub async fn open_shell(&self) -> Result<russh::Channel<client::Msg>> {
        let channel =
            self.handle
                .channel_open_session()
                .await
                .map_err(|e| DeviceError::SshChannel {
                    reason: format!("Failed to open channel for shell: {e}"),
                })?;

        channel
            .request_pty(false, TERM, TERM_COLUMNS, TERM_ROWS, 0, 0, &[])
            .await
            .map_err(|e| DeviceError::SshChannel {
                reason: format!("Failed to request pty: {e}"),
            })?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| DeviceError::SshChannel {
                reason: format!("Failed to request shell: {e}"),
            })?;

        Ok(channel)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Close the connection (with a timeout to avoid blocking)
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect message cannot be sent.
    pub async fn close(self) -> Result<()> {
        match timeout(
            DISCONNECT_TIMEOUT,
            self.handle
                .disconnect(russh::Disconnect::ByApplication, "", "en"),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeviceError::SshConnection {
                host: self.host,
                reason: e.to_string(),
            }),
            Err(_) => {
                // Timeout during close - connection was likely dead anyway
                tracing::warn!(host = %self.host, "Timeout closing SSH connection, forcing drop");
                Ok(())
            }
        }
    }
}
