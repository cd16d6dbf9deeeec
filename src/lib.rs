//! Drive router-class devices through their interactive shell.
//!
//! A [`Shell`] turns a serial console or an SSH shell channel into
//! prompt-synchronized command/response exchanges; a [`CommandTree`] exposes
//! the device commands declared in configuration on top of it, and a
//! [`DeviceConnection`] ties both to a device from the [`DeviceDirectory`].

#[cfg(feature = "cli")]
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod ports;
pub mod serial;
pub mod shell;
pub mod ssh;

pub use commands::{CommandNode, CommandSpec, CommandTree};
pub use config::{ConfigPaths, ConnectionKind, Credentials, DeviceDirectory, ShellSettings};
pub use connection::{DeviceConnection, DeviceContext, RealTransportConnector};
pub use error::{DeviceError, Result};
pub use ports::{SessionProfile, Transport, TransportConnector};
pub use shell::Shell;
