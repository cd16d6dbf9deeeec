//! CLI runner functions
//!
//! Each function backs one subcommand and prints its result to stdout.

use std::time::Duration;

use tracing::info;

use crate::config::{
    ConfigPaths, ConnectionKind, Credentials, DeviceRecord, load_commands, load_devices,
};
use crate::connection::{DeviceConnection, DeviceContext, RealTransportConnector};
use crate::error::{DeviceError, Result};

fn display_field<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), ToString::to_string)
}

fn print_device(device: &DeviceRecord) {
    println!("\n  {}:", device.name);
    println!("    Address: {}", display_field(device.ip.as_ref()));
    println!("    SSH port: {}", display_field(device.ssh_port.as_ref()));
    println!("    Serial port: {}", display_field(device.serial_port.as_ref()));
    println!("    Baud rate: {}", display_field(device.baudrate.as_ref()));
    for (key, value) in &device.extra {
        println!("    {key}: {value}");
    }
}

/// Print every device of the directory after default inheritance
///
/// # Errors
///
/// Returns an error if the device declaration cannot be loaded.
pub fn run_devices(paths: &ConfigPaths) -> Result<()> {
    let devices = load_devices(&paths.devices_file())?;

    println!("Devices ({}):", devices.len());
    println!("{:-<60}", "");
    if devices.is_empty() {
        println!("  (no devices declared)");
    }
    for device in devices.iter() {
        print_device(device);
    }
    Ok(())
}

/// Print every declared command path
///
/// # Errors
///
/// Returns an error if the command declaration cannot be loaded.
pub fn run_commands(paths: &ConfigPaths) -> Result<()> {
    let commands = load_commands(&paths.commands_file())?;
    for path in commands.leaf_paths() {
        println!("{path}");
    }
    Ok(())
}

fn connect(
    paths: &ConfigPaths,
    kind: ConnectionKind,
    device: Option<&str>,
) -> Result<DeviceConnection> {
    let device = device.ok_or_else(|| DeviceError::Config(
        "a device name is required (--device)".to_string(),
    ))?;
    let context = DeviceContext::load(paths, Credentials::from_env()?)?;
    DeviceConnection::open(kind, device, &context, &RealTransportConnector::new())
}

/// Open the connection (login and self-test) and beep
///
/// # Errors
///
/// Returns an error if the connection cannot be opened or the self-test fails.
pub fn run_check(paths: &ConfigPaths, kind: ConnectionKind, device: Option<&str>) -> Result<()> {
    let connection = connect(paths, kind, device)?;
    let noop = connection.shell().settings().self_test.noop_command.clone();
    connection.shell().send(&noop)?;
    println!(
        "{} reachable over {kind} ({})",
        connection.device().name,
        connection.shell().target()
    );
    connection.close()
}

/// Resolve and run a declared command
///
/// # Errors
///
/// Returns an error if:
/// - The connection cannot be opened
/// - The command path does not resolve to a leaf
/// - The exchange times out
pub fn run_exec(
    paths: &ConfigPaths,
    kind: ConnectionKind,
    device: Option<&str>,
    path: &[String],
    args: &[String],
) -> Result<()> {
    let connection = connect(paths, kind, device)?;
    let path: Vec<&str> = path.iter().map(String::as_str).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    info!(command = %path.join(" "), "Executing device command");
    let output = connection.commands().invoke(&path, &args)?;
    println!("{output}");
    connection.close()
}

/// Send a raw line and print the response
///
/// # Errors
///
/// Returns an error if the connection cannot be opened or the exchange
/// times out.
pub fn run_raw(
    paths: &ConfigPaths,
    kind: ConnectionKind,
    device: Option<&str>,
    line: &str,
    timeout: Option<u64>,
) -> Result<()> {
    let connection = connect(paths, kind, device)?;
    let timeout = timeout.map_or_else(
        || connection.shell().settings().command_timeout(),
        Duration::from_secs,
    );
    let output = connection.shell().send_command(line, timeout, true)?;
    println!("{output}");
    connection.close()
}
