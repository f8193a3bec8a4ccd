use anyhow::Result;
use colored::Colorize;

use beacon::domain::types::{DaemonState, DaemonStatus};

use super::output::{print_output, OutputFormat};

pub fn run(url: Option<&str>, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let client = super::client(url, config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(client.status())?;

    match format {
        OutputFormat::Json => print_output(format, &status),
        OutputFormat::Table => {
            print_status(&status);
            Ok(())
        }
    }
}

pub fn print_status(status: &DaemonStatus) {
    println!("{}", "beacon status".bold());
    let state = match status.state {
        DaemonState::Running => "running".green(),
        DaemonState::Stopped => "stopped".yellow(),
    };
    println!("  daemon:     {}", state);
    println!(
        "  reporting:  {}",
        if status.reporting_active {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );
    if status.enabled_categories.is_empty() {
        println!("  categories: {}", "none".dimmed());
    } else {
        println!("  categories: {}", status.enabled_categories.join(", "));
    }
    match status.last_sent_at {
        Some(at) => println!("  last sent:  {}", at.with_timezone(&chrono::Local)),
        None => println!("  last sent:  {}", "never".dimmed()),
    }
    println!("  interval:   {}s", status.interval_secs);
    println!("  geoip:      {}", status.geoip_provider);
}
