use anyhow::Result;
use colored::Colorize;

use beacon::SettingsUpdate;

use super::output::{print_output, OutputFormat};

pub fn run(
    url: Option<&str>,
    config_path: Option<&str>,
    select: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let client = super::client(url, config_path)?;
    let rt = tokio::runtime::Runtime::new()?;

    let providers = rt.block_on(async {
        if let Some(name) = select {
            client
                .update_settings(&SettingsUpdate {
                    interval_secs: None,
                    geoip_provider: Some(name),
                })
                .await?;
        }
        client.geoip().await
    })?;

    if format == OutputFormat::Json {
        return print_output(format, &providers);
    }

    println!("{}", "GeoIP providers".bold());
    for (name, url) in &providers.available {
        if *name == providers.selected {
            println!("  {} {:<14} {}", "*".green(), name.green(), url.dimmed());
        } else {
            println!("    {:<14} {}", name, url.dimmed());
        }
    }
    if !providers.available.contains_key(&providers.selected) {
        println!(
            "  {} selected provider '{}' is not installed; location facts are skipped",
            "!".yellow(),
            providers.selected
        );
    }
    Ok(())
}
