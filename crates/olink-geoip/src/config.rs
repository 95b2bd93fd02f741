//! Resolver Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_ipv4_table() -> PathBuf {
    PathBuf::from("IP2LOCATION-LITE-DB1.CSV")
}

fn default_ipv6_table() -> PathBuf {
    PathBuf::from("IP2LOCATION-LITE-DB1.IPV6.CSV")
}

fn default_load_timeout() -> u64 {
    5
}

/// Range table locations and the bounded wait for the initial load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoConfig {
    /// IPv4 range file
    #[serde(default = "default_ipv4_table")]
    pub ipv4_table: PathBuf,
    /// IPv6 range file
    #[serde(default = "default_ipv6_table")]
    pub ipv6_table: PathBuf,
    /// Longest a lookup waits for the load (seconds)
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

impl GeoConfig {
    /// Tables under a data directory with their default file names
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ipv4_table: dir.join(default_ipv4_table()),
            ipv6_table: dir.join(default_ipv6_table()),
            load_timeout_secs: default_load_timeout(),
        }
    }

    /// Load from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, GeoError> {
        toml::from_str(content).map_err(|e| GeoError::Parse(e.to_string()))
    }

    /// Load from a JSON string
    pub fn from_json(content: &str) -> Result<Self, GeoError> {
        serde_json::from_str(content).map_err(|e| GeoError::Parse(e.to_string()))
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            ipv4_table: default_ipv4_table(),
            ipv6_table: default_ipv6_table(),
            load_timeout_secs: default_load_timeout(),
        }
    }
}

/// Resolver errors
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeoConfig::default();

        assert_eq!(config.load_timeout(), Duration::from_secs(5));
        assert_eq!(config.ipv4_table, PathBuf::from("IP2LOCATION-LITE-DB1.CSV"));
    }

    #[test]
    fn test_in_dir() {
        let config = GeoConfig::in_dir(Path::new("/data"));

        assert_eq!(config.ipv6_table, PathBuf::from("/data/IP2LOCATION-LITE-DB1.IPV6.CSV"));
    }

    #[test]
    fn test_toml() {
        let config = GeoConfig::from_toml(
            r#"
            ipv4_table = "/srv/v4.csv"
            load_timeout_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.ipv4_table, PathBuf::from("/srv/v4.csv"));
        assert_eq!(config.ipv6_table, default_ipv6_table());
        assert_eq!(config.load_timeout_secs, 2);
        assert!(GeoConfig::from_toml("load_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_json() {
        let config = GeoConfig::from_json(r#"{"load_timeout_secs": 1}"#).unwrap();

        assert_eq!(config.load_timeout_secs, 1);
    }
}
