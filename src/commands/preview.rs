//! `beacon preview` — run the collectors locally and show what would be sent.

use anyhow::{Context, Result};
use colored::Colorize;

use beacon::{config, server, ConsentMap, SettingsStore};

use super::output::{print_facts, OutputFormat};

pub fn run(config_path: Option<&str>, all: bool, format: OutputFormat) -> Result<()> {
    let cfg = config::load(config_path)?;
    let components = server::build_components(&cfg)?;

    let consent: ConsentMap = if all {
        components
            .registry
            .categories()
            .into_iter()
            .map(|(code, _)| (code, true))
            .collect()
    } else {
        components
            .store
            .read_consent()
            .context("reading consent")?
            .categories
    };

    let facts = components.registry.collect_enabled(&consent);

    if format == OutputFormat::Table {
        println!("{}", "beacon preview".bold());
        if !all {
            let enabled: Vec<&str> = consent
                .iter()
                .filter(|(_, on)| **on)
                .map(|(code, _)| code.as_str())
                .collect();
            println!(
                "  categories: {}",
                if enabled.is_empty() {
                    "none".dimmed().to_string()
                } else {
                    enabled.join(", ")
                }
            );
        }
        println!();
    }
    print_facts(format, &facts)
}
