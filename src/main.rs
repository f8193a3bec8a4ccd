mod commands;

use clap::{Parser, Subcommand};

use commands::consent::ConsentCommands;
use commands::control::ControlCommands;
use commands::output::OutputFormat;

#[derive(Parser)]
#[command(name = "beacon", version, about = "Consent-gated usage telemetry daemon")]
struct Cli {
    /// Path to config file (default: ~/.config/beacon/config.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Control API base URL (default: http://<http_addr> from config)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the beacon daemon (control API + reporting worker)
    Daemon {
        /// HTTP listen address (overrides config)
        #[arg(long)]
        http_addr: Option<String>,

        /// Log level (overrides config)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Show the daemon's state, consent summary and settings
    Status,

    /// Start, stop, restart or reload the reporting worker
    Control {
        #[command(subcommand)]
        command: ControlCommands,
    },

    /// Show or change reporting consent
    Consent {
        #[command(subcommand)]
        command: ConsentCommands,
    },

    /// Change the reporting interval
    Settings {
        /// Seconds between reporting ticks
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Collect facts locally and print them without sending
    Preview {
        /// Ignore consent and run every collector
        #[arg(long)]
        all: bool,
    },

    /// List GeoIP providers, optionally selecting one
    Providers {
        /// Provider to use for location facts
        #[arg(long)]
        select: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let url = cli.url.as_deref();

    match cli.command {
        Commands::Daemon {
            http_addr,
            log_level,
        } => commands::daemon::run(http_addr, log_level, cli.config.clone()),
        Commands::Status => commands::status::run(url, config, cli.format),
        Commands::Control { command } => commands::control::run(url, config, cli.format, &command),
        Commands::Consent { command } => commands::consent::run(url, config, cli.format, &command),
        Commands::Settings { interval } => {
            commands::settings::run(url, config, interval, cli.format)
        }
        Commands::Preview { all } => commands::preview::run(config, all, cli.format),
        Commands::Providers { select } => {
            commands::providers::run(url, config, select, cli.format)
        }
    }
}
