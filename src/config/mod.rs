/// Database configuration and connection management
pub mod database;

/// Reward policy and seed data from config.toml
pub mod settings;

pub use settings::{AppConfig, SeedListing, SeedUser};
