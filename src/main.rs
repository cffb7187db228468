use dotenvy::dotenv;
use replate_core::{
    config::{database, settings},
    core::{listing::get_available_listings, seed::seed_from_config},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        points_per_kg = app_config.rewards.points_per_kg,
        base_points = app_config.rewards.base_points,
        "Configuration loaded"
    );

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed demo data, if any is configured
    seed_from_config(&db, &app_config)
        .await
        .inspect_err(|e| error!("Failed to seed data: {}", e))?;

    let available = get_available_listings(&db, None).await?;
    info!(count = available.len(), "Listings open for claiming");

    Ok(())
}
