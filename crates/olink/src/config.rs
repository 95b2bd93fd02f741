//! Application configuration (`olink.toml`)
//!
//! ```toml
//! [tunnel]
//! base_url = "https://api.example.org"
//! request_timeout_secs = 15
//!
//! [geoip]
//! ipv4_table = "/var/lib/olink/IP2LOCATION-LITE-DB1.CSV"
//! ```
//!
//! Both sections are optional; missing keys take their defaults.

use anyhow::{Context, Result};
use olink_geoip::GeoConfig;
use olink_tunnel::TunnelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub geoip: GeoConfig,
}

impl AppConfig {
    /// Read `path`, or use defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.tunnel.validate()?;
        Ok(config)
    }
}
