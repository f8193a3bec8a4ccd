use anyhow::Result;

use beacon::config;

pub fn run(
    http_addr: Option<String>,
    log_level: Option<String>,
    config_path: Option<String>,
) -> Result<()> {
    // Defaults → config file → BEACON_* env
    let mut daemon_config = config::load(config_path.as_deref())?;

    // CLI flags override everything else
    if let Some(addr) = http_addr {
        daemon_config.http_addr = addr;
    }
    if let Some(level) = log_level {
        daemon_config.log_level = level;
    }

    // Build tokio runtime explicitly (no #[tokio::main] on fn main)
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(beacon::server::run(daemon_config))
}
