pub mod consent;
pub mod control;
pub mod daemon;
pub mod output;
pub mod preview;
pub mod providers;
pub mod settings;
pub mod status;

use anyhow::Result;
use beacon::client::BeaconClient;
use beacon::config;

/// Client for `--url`, or for the configured `http_addr` when absent.
pub fn client(url: Option<&str>, config_path: Option<&str>) -> Result<BeaconClient> {
    match url {
        Some(url) => BeaconClient::new(url),
        None => {
            let cfg = config::load(config_path)?;
            BeaconClient::new(&format!("http://{}", cfg.http_addr))
        }
    }
}
