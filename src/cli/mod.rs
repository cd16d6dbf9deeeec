//! CLI module for direct command-line usage
//!
//! Opens a device connection from the configuration tree and runs one
//! command through it.

mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConnectionKind;

pub use runner::{run_check, run_commands, run_devices, run_exec, run_raw};

/// Device Shell - drive router shells over serial or SSH
#[derive(Parser)]
#[command(name = "device-shell")]
#[command(about = "Run commands on router-class devices through their interactive shell")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # List the declared devices with inherited defaults applied
    device-shell devices

    # Open a connection and run the self-test
    device-shell --device lab-router check

    # Run a declared command with arguments
    device-shell --device lab-router exec system identity -- print

    # Send a raw line over the serial console
    device-shell --device lab-router --connection serial raw \"/interface print\"

ENVIRONMENT:
    DEVICE_SHELL_DIR   Root holding config/devices and config/commands
    DEVICE_USERNAME    Login user
    DEVICE_PASSWORD    Login password (empty when unset)")]
pub struct Cli {
    /// Framework root containing the `config/` directory
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Device name from the device directory
    #[arg(short, long, global = true)]
    pub device: Option<String>,

    /// How to reach the device shell
    #[arg(
        short,
        long,
        global = true,
        default_value = "ssh",
        value_parser = parse_connection_kind
    )]
    pub connection: ConnectionKind,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List devices with their resolved connection fields
    Devices,

    /// List every declared command path
    Commands,

    /// Open the connection, run the self-test and beep
    Check,

    /// Run a declared command
    Exec {
        /// Command path, e.g. `system identity`
        #[arg(required = true)]
        path: Vec<String>,

        /// Arguments appended after the path
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Send a raw line and print the response
    Raw {
        /// Line sent to the shell as is
        line: String,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

fn parse_connection_kind(value: &str) -> Result<ConnectionKind, String> {
    value.parse().map_err(|e: crate::error::DeviceError| e.to_string())
}
