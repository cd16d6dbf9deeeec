//! SSH shell transport
//!
//! Bridges the blocking [`Transport`] contract onto an async russh channel.
//! The transport owns a small tokio runtime; a pump task owns the channel,
//! forwards received data into a std channel and performs writes on request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use russh::ChannelMsg;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};
use crate::ports::{SessionProfile, SshParams, Transport};

use super::client::SshClient;

const PUMP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

enum PumpCommand {
    Write(Vec<u8>, oneshot::Sender<Result<()>>),
    Close,
}

struct ActiveShell {
    client: SshClient,
    commands: mpsc::UnboundedSender<PumpCommand>,
    output: std_mpsc::Receiver<Vec<u8>>,
    alive: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

/// Interactive shell on a device reached over SSH
pub struct SshTransport {
    params: SshParams,
    runtime: Runtime,
    shell: Option<ActiveShell>,
    pending: VecDeque<u8>,
    read_timeout: Duration,
}

impl SshTransport {
    /// Create an unopened transport.
    ///
    /// Must be called outside of any async runtime: the transport blocks on
    /// its own one.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be started.
    pub fn new(params: SshParams) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("device-shell-ssh")
            .enable_all()
            .build()?;

        Ok(Self {
            params,
            runtime,
            shell: None,
            pending: VecDeque::new(),
            read_timeout: Duration::from_secs(5),
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.params.host, self.params.port)
    }

    fn active(&mut self) -> Result<&mut ActiveShell> {
        let target = self.target();
        self.shell
            .as_mut()
            .ok_or(DeviceError::ConnectionClosed { target })
    }

    /// Move everything already received into the pending buffer.
    fn drain_received(&mut self) -> Result<()> {
        let shell = self.active()?;
        let mut received = Vec::new();
        while let Ok(chunk) = shell.output.try_recv() {
            received.extend(chunk);
        }
        self.pending.extend(received);
        Ok(())
    }

    fn take_pending(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.pending.len());
        self.pending.drain(..n).collect()
    }
}

async fn pump(
    mut channel: russh::Channel<russh::client::Msg>,
    mut commands: mpsc::UnboundedReceiver<PumpCommand>,
    output: std_mpsc::Sender<Vec<u8>>,
    alive: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(PumpCommand::Write(data, ack)) => {
                    let result = channel
                        .data(data.as_slice())
                        .await
                        .map_err(|e| DeviceError::SshChannel {
                            reason: format!("Failed to write to shell: {e}"),
                        });
                    let _ = ack.send(result);
                }
                Some(PumpCommand::Close) | None => {
                    let _ = channel.eof().await;
                    let _ = channel.close().await;
                    break;
                }
            },
            message = channel.wait() => match message {
                Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
                    if output.send(data.to_vec()).is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    debug!("Shell channel closed by device");
                    break;
                }
                Some(_) => {}
            },
        }
    }
    alive.store(false, Ordering::SeqCst);
}

impl Transport for SshTransport {
    fn describe(&self) -> String {
        format!("ssh://{}@{}", self.params.credentials.username, self.target())
    }

    fn session_profile(&self) -> SessionProfile {
        SessionProfile::SecureShell
    }

    fn open(&mut self) -> Result<()> {
        if self.shell.is_some() {
            return Ok(());
        }
        info!(peer = %self.target(), "Connecting to device over SSH");

        let params = self.params.clone();
        let (client, channel) = self.runtime.block_on(async move {
            let client = SshClient::connect(&params).await?;
            match client.open_shell().await {
                Ok(channel) => Ok::<_, DeviceError>((client, channel)),
                Err(e) => {
                    let _ = client.close().await;
                    Err(e)
                }
            }
        })?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (output_tx, output) = std_mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let pump = self
            .runtime
            .spawn(pump(channel, command_rx, output_tx, Arc::clone(&alive)));

        self.pending.clear();
        self.shell = Some(ActiveShell {
            client,
            commands,
            output,
            alive,
            pump,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(shell) = self.shell.take() else {
            return Ok(());
        };
        let target = self.target();
        self.pending.clear();

        let _ = shell.commands.send(PumpCommand::Close);
        self.runtime.block_on(async move {
            if tokio::time::timeout(PUMP_SHUTDOWN_TIMEOUT, shell.pump)
                .await
                .is_err()
            {
                warn!(peer = %target, "Shell pump did not stop in time");
            }
            shell.client.close().await
        })
    }

    fn is_connected(&self) -> bool {
        self.shell
            .as_ref()
            .is_some_and(|shell| shell.alive.load(Ordering::SeqCst) && !shell.client.is_closed())
    }

    fn output_available(&mut self) -> Result<bool> {
        self.drain_received()?;
        Ok(!self.pending.is_empty())
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        self.drain_received()?;
        if self.pending.is_empty() {
            let timeout = self.read_timeout;
            let target = self.target();
            let shell = self.active()?;
            match shell.output.recv_timeout(timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(DeviceError::ConnectionClosed { target });
                }
            }
        }
        Ok(self.take_pending(max))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let target = self.target();
        let shell = self.active()?;
        let (ack, done) = oneshot::channel();
        shell
            .commands
            .send(PumpCommand::Write(data.to_vec(), ack))
            .map_err(|_| DeviceError::ConnectionClosed {
                target: target.clone(),
            })?;
        done.blocking_recv()
            .map_err(|_| DeviceError::ConnectionClosed { target })?
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        if self.shell.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "Failed to close SSH transport on drop");
            }
        }
    }
}
