//! `beacon control` — drive a running daemon's lifecycle.

use anyhow::Result;
use clap::Subcommand;

use super::output::{print_output, OutputFormat};
use super::status::print_status;

#[derive(Subcommand)]
pub enum ControlCommands {
    /// Start the reporting worker
    Start,
    /// Stop the reporting worker after its current tick
    Stop,
    /// Stop, then start
    Restart,
    /// Re-read settings and consent before the next tick
    Reload,
}

pub fn run(
    url: Option<&str>,
    config_path: Option<&str>,
    format: OutputFormat,
    command: &ControlCommands,
) -> Result<()> {
    let client = super::client(url, config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(async {
        match command {
            ControlCommands::Start => client.start().await,
            ControlCommands::Stop => client.stop().await,
            ControlCommands::Restart => client.restart().await,
            ControlCommands::Reload => client.reload().await,
        }
    })?;

    match format {
        OutputFormat::Json => print_output(format, &status),
        OutputFormat::Table => {
            print_status(&status);
            Ok(())
        }
    }
}
