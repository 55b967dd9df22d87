//! Application configuration loading from config.toml
//!
//! The TOML file declares the seed connections and allocation rules, the
//! replay feed script to drive a run, and the automatic-allocation switch.
//! Seeding is additive: entries already present in the database are left
//! untouched on later runs.

use crate::entities::DestinationKind;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Whether newly ingested inflows are allocated automatically
    #[serde(default = "default_auto_allocate")]
    pub auto_allocate: bool,
    /// Path to the replay feed script driving the sync loop
    pub feed_file: Option<String>,
    /// Connections to seed on startup
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    /// Allocation rules to seed on startup
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

const fn default_auto_allocate() -> bool {
    true
}

/// Seed configuration for a single connection
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// Connection id, as assigned by the link flow
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Opaque feed credential
    pub access_token: String,
}

/// Seed configuration for a single allocation rule
#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    /// Owning user
    pub user_id: String,
    /// Display name (e.g., "Taxes")
    pub name: String,
    /// Percentage of each income transaction (0-100, fractional allowed)
    pub percentage: f64,
    /// Destination kind; hold rules accumulate in an internal bucket
    #[serde(default = "default_destination")]
    pub destination: DestinationKind,
    /// Destination id for payout/external rules
    #[serde(default)]
    pub destination_id: Option<String>,
}

const fn default_destination() -> DestinationKind {
    DestinationKind::Hold
}

/// Loads application configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is
/// invalid, or required fields are missing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads application configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<AppConfig> {
    load_config("config.toml")
}
