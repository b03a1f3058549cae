use crate::error::Result;
use prom_config::{Config, ScrapeConfig};
use sha2::{Digest, Sha256};

/// Render scrape configs as a Prometheus configuration document.
pub fn render(scrape_configs: &[ScrapeConfig]) -> Result<String> {
    let config = Config {
        scrape_configs: scrape_configs.to_vec(),
    };
    Ok(serde_yaml::to_string(&config)?)
}

/// Lowercase hex SHA-256 of the rendered document. Identical input always
/// yields the same fingerprint, so a caller can skip reloading the scrape
/// engine when nothing changed.
pub fn fingerprint(scrape_configs: &[ScrapeConfig]) -> Result<String> {
    let rendered = render(scrape_configs)?;
    Ok(hex::encode(Sha256::digest(rendered.as_bytes())))
}
