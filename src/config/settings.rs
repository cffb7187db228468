//! Application configuration loaded from `config.toml`.
//!
//! The file carries the reward policy used by settlement and optional seed data for
//! demo users and their listings. Every section is optional; a missing file yields the
//! defaults.

use crate::core::settlement::RewardPolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Settlement reward constants
    #[serde(default)]
    pub rewards: RewardPolicy,
    /// Users created on first start
    #[serde(default)]
    pub users: Vec<SeedUser>,
    /// Listings created for seeded users
    #[serde(default)]
    pub listings: Vec<SeedListing>,
}

/// A user to seed
#[derive(Debug, Deserialize, Clone)]
pub struct SeedUser {
    /// User id
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Home location
    pub location: String,
    /// Opening balance, credited through the ledger
    #[serde(default)]
    pub wallet_balance: i64,
}

/// A listing to seed for one of the seeded users
#[derive(Debug, Deserialize, Clone)]
pub struct SeedListing {
    /// Id of the giver, must be one of the seeded users
    pub giver_id: String,
    /// Dish name
    pub title: String,
    /// Servings
    pub quantity: i32,
    /// Pickup location
    pub location: String,
    /// One-way distance, e.g. "0.5km"
    pub distance: String,
    /// kg CO2e saved
    pub carbon_saved: f64,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ingredients
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text and checks the reward policy.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.rewards.validate()?;
    Ok(config)
}

/// Loads configuration from `REPLATE_CONFIG`, or `./config.toml` when unset.
///
/// A missing file is not an error; the defaults are used instead.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("REPLATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        info!("No config file at {}, using defaults", path);
        return Ok(AppConfig::default());
    }
    load_config(&path)
}
