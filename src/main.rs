use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use device_shell::cli::{Cli, Commands, run_check, run_commands, run_devices, run_exec, run_raw};
use device_shell::config::ConfigPaths;

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Logs go to stderr, command output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = cli.root.map_or_else(ConfigPaths::from_env, ConfigPaths::new);
    info!(root = %paths.root().display(), "Using configuration root");

    let device = cli.device.as_deref();
    let kind = cli.connection;

    match cli.command {
        Commands::Devices => run_devices(&paths)
            .with_context(|| format!("Failed to list devices from {}", paths.devices_file().display()))?,
        Commands::Commands => run_commands(&paths).with_context(|| {
            format!("Failed to list commands from {}", paths.commands_file().display())
        })?,
        Commands::Check => run_check(&paths, kind, device)
            .with_context(|| format!("Connection check over {kind} failed"))?,
        Commands::Exec { path, args } => run_exec(&paths, kind, device, &path, &args)
            .with_context(|| format!("Failed to run '{}'", path.join(" ")))?,
        Commands::Raw { line, timeout } => run_raw(&paths, kind, device, &line, timeout)
            .with_context(|| format!("Failed to send '{line}'"))?,
    }

    Ok(())
}
