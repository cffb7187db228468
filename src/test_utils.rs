//! Shared test utilities for `replate-core`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        listing::{NewListing, claim_listing, post_listing},
        settlement::{RewardPolicy, complete_listing},
        session::Session,
        user::{NewUser, create_user},
    },
    entities::{self, TransportMode},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in a fresh temporary directory.
///
/// Unlike `sqlite::memory:`, which is limited to one pooled connection, this pool has
/// several connections, so concurrent futures really do race. Keep the returned
/// directory alive for as long as the connection is used.
pub async fn setup_file_test_db() -> Result<(DatabaseConnection, tempfile::TempDir)> {
    init_test_tracing();
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.sqlite").display());
    let db = sea_orm::Database::connect(&url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Creates a test user.
///
/// # Defaults
/// * `email`: `"{id}@example.com"`
/// * `location`: `"Brooklyn, NY"`
pub async fn create_test_user(
    db: &DatabaseConnection,
    id: &str,
    name: &str,
) -> Result<entities::user::Model> {
    create_user(
        db,
        NewUser {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{id}@example.com"),
            location: "Brooklyn, NY".to_string(),
        },
    )
    .await
}

/// Creates a test user and logs them in.
pub async fn create_test_session(
    db: &DatabaseConnection,
    id: &str,
    name: &str,
) -> Result<Session> {
    create_test_user(db, id, name).await?;
    Session::login(db, id).await
}

/// A valid listing payload.
///
/// # Defaults
/// * `title`: `"Vegetable Lasagna"`
/// * `quantity`: 4
/// * `distance`: `"0.5km"`
/// * `carbon_saved`: 2.4
#[must_use]
pub fn test_new_listing() -> NewListing {
    NewListing {
        title: "Vegetable Lasagna".to_string(),
        quantity: 4,
        location: "Brooklyn, NY".to_string(),
        distance: "0.5km".to_string(),
        tags: vec!["Free".to_string(), "Pickup".to_string()],
        carbon_saved: 2.4,
        ..NewListing::default()
    }
}

/// Posts a listing with [`test_new_listing`] defaults.
pub async fn create_test_listing(
    db: &DatabaseConnection,
    giver: &Session,
) -> Result<entities::listing::Model> {
    post_listing(db, giver, test_new_listing()).await
}

/// Posts a listing with a custom title, distance and carbon figure.
pub async fn create_custom_listing(
    db: &DatabaseConnection,
    giver: &Session,
    title: &str,
    distance: &str,
    carbon_saved: f64,
) -> Result<entities::listing::Model> {
    post_listing(
        db,
        giver,
        NewListing {
            title: title.to_string(),
            distance: distance.to_string(),
            carbon_saved,
            ..test_new_listing()
        },
    )
    .await
}

/// Posts a listing for `giver`, has `receiver` claim it on foot and settles it with the
/// default reward policy. Returns the completed listing.
pub async fn create_completed_listing(
    db: &DatabaseConnection,
    giver: &Session,
    receiver: &Session,
) -> Result<entities::listing::Model> {
    let posted = create_test_listing(db, giver).await?;
    let claimed = claim_listing(db, receiver, posted.id, TransportMode::Walk).await?;
    let code = claimed.claim_code.ok_or(Error::InvalidListingState {
        id: posted.id,
        status: claimed.status,
        expected: "claimed with a code",
    })?;
    let settlement =
        complete_listing(db, &RewardPolicy::default(), giver, posted.id, &code).await?;
    Ok(settlement.listing)
}

/// Sets up a database with a giver (`user_1`) and a receiver (`user_2`), both logged in.
/// Returns (db, giver, receiver) for common test scenarios.
pub async fn setup_with_users() -> Result<(DatabaseConnection, Session, Session)> {
    let db = setup_test_db().await?;
    let giver = create_test_session(&db, "user_1", "Sarah Jenkins").await?;
    let receiver = create_test_session(&db, "user_2", "Mike Chen").await?;
    Ok((db, giver, receiver))
}
