use anyhow::{bail, Result};

use beacon::SettingsUpdate;

use super::output::{print_output, OutputFormat};

pub fn run(
    url: Option<&str>,
    config_path: Option<&str>,
    interval_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let Some(secs) = interval_secs else {
        bail!("nothing to change; pass --interval <SECS>");
    };
    if secs == 0 {
        bail!("--interval must be at least 1 second");
    }

    let client = super::client(url, config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    let settings = rt.block_on(client.update_settings(&SettingsUpdate {
        interval_secs: Some(secs),
        geoip_provider: None,
    }))?;
    print_output(format, &settings)
}
