//! `beacon consent` — inspect and change what may be reported.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use beacon::domain::types::ConsentView;
use beacon::{ConsentMap, ConsentUpdate};

use super::output::{print_output, OutputFormat};

#[derive(Subcommand)]
pub enum ConsentCommands {
    /// Show the consent record and every category
    Show,
    /// Turn reporting on
    Enable {
        /// Categories to authorize (comma-separated); others are revoked.
        /// Keeps the current selection when omitted.
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Authorize every registered category
        #[arg(long, conflicts_with = "categories")]
        all: bool,
    },
    /// Turn reporting off; category choices are kept
    Disable,
}

pub fn run(
    url: Option<&str>,
    config_path: Option<&str>,
    format: OutputFormat,
    command: &ConsentCommands,
) -> Result<()> {
    let client = super::client(url, config_path)?;
    let rt = tokio::runtime::Runtime::new()?;

    let view = rt.block_on(async {
        match command {
            ConsentCommands::Show => client.consent().await,
            ConsentCommands::Enable { categories, all } => {
                let current = client.consent().await?;
                let update = ConsentUpdate {
                    active: Some(true),
                    categories: selection(&current, categories, *all)?,
                };
                client.update_consent(&update).await
            }
            ConsentCommands::Disable => {
                let update = ConsentUpdate {
                    active: Some(false),
                    categories: None,
                };
                client.update_consent(&update).await
            }
        }
    })?;

    match format {
        OutputFormat::Json => print_output(format, &view),
        OutputFormat::Table => {
            print_consent(&view);
            Ok(())
        }
    }
}

/// Full consent map for the requested categories, or `None` to keep the
/// current one.
fn selection(current: &ConsentView, requested: &[String], all: bool) -> Result<Option<ConsentMap>> {
    if !all && requested.is_empty() {
        return Ok(None);
    }

    let requested: Vec<String> = requested.iter().map(|c| c.trim().to_uppercase()).collect();
    for code in &requested {
        if !current.categories.iter().any(|c| &c.code == code) {
            bail!(
                "unknown category '{}'. Available: {}",
                code,
                current
                    .categories
                    .iter()
                    .map(|c| c.code.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    Ok(Some(
        current
            .categories
            .iter()
            .map(|c| (c.code.clone(), all || requested.contains(&c.code)))
            .collect(),
    ))
}

fn print_consent(view: &ConsentView) {
    let consent = &view.consent;
    println!("{}", "beacon consent".bold());
    println!(
        "  reporting: {}",
        if consent.is_reporting_active() {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );
    if let Some(at) = consent.opt_in_at {
        println!("  opted in:  {}", at.with_timezone(&chrono::Local));
    }
    if let Some(at) = consent.opt_out_at {
        println!("  opted out: {}", at.with_timezone(&chrono::Local));
    }
    println!();
    for category in &view.categories {
        let mark = if category.enabled {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {:<9} {}", mark, category.code, category.description.dimmed());
    }
}
