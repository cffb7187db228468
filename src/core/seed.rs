//! Seeds demo users and listings from configuration.
//!
//! Seeding is per user: a configured user that already exists is left alone together
//! with their configured listings, so running it on every start is safe. A user and
//! their opening balance are written in one transaction.

use crate::{
    config::AppConfig,
    core::{
        listing::{NewListing, post_listing},
        points::earn_points,
        session::Session,
        user::{NewUser, create_user, get_user_by_id},
    },
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// What a seeding run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Users inserted
    pub users_created: usize,
    /// Listings inserted
    pub listings_created: usize,
}

/// Creates configured users that do not exist yet, then their listings.
///
/// # Errors
/// * [`Error::Config`] if a listing names a giver that is not among the configured users
/// * [`Error::InvalidAmount`] for a negative opening balance; that user is not created
#[instrument(skip_all)]
pub async fn seed_from_config(db: &DatabaseConnection, config: &AppConfig) -> Result<SeedSummary> {
    let configured: HashSet<&str> = config.users.iter().map(|u| u.id.as_str()).collect();
    if let Some(orphan) = config
        .listings
        .iter()
        .find(|l| !configured.contains(l.giver_id.as_str()))
    {
        return Err(Error::Config {
            message: format!(
                "Seed listing {:?} references unknown giver {:?}",
                orphan.title, orphan.giver_id
            ),
        });
    }

    let mut summary = SeedSummary::default();
    let mut fresh: HashSet<&str> = HashSet::new();

    for seed in &config.users {
        if get_user_by_id(db, &seed.id).await?.is_some() {
            debug!(user_id = %seed.id, "Seed user already present");
            continue;
        }
        // The user and their opening balance land together or not at all.
        let txn = db.begin().await?;
        create_user(
            &txn,
            NewUser {
                id: seed.id.clone(),
                name: seed.name.clone(),
                email: seed.email.clone(),
                location: seed.location.clone(),
            },
        )
        .await?;
        if seed.wallet_balance != 0 {
            earn_points(&txn, &seed.id, seed.wallet_balance, "Opening balance").await?;
        }
        txn.commit().await?;
        fresh.insert(seed.id.as_str());
        summary.users_created += 1;
    }

    for seed in config
        .listings
        .iter()
        .filter(|l| fresh.contains(l.giver_id.as_str()))
    {
        let giver = Session::login(db, &seed.giver_id).await?;
        post_listing(
            db,
            &giver,
            NewListing {
                title: seed.title.clone(),
                quantity: seed.quantity,
                ingredients: seed.ingredients.clone(),
                location: seed.location.clone(),
                distance: seed.distance.clone(),
                tags: seed.tags.clone(),
                carbon_saved: seed.carbon_saved,
                ..NewListing::default()
            },
        )
        .await?;
        summary.listings_created += 1;
    }

    info!(
        users = summary.users_created,
        listings = summary.listings_created,
        "Seeding finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::parse_config;
    use crate::core::listing::get_available_listings;
    use crate::core::points::get_points_history;
    use crate::core::user::require_user;
    use crate::test_utils::*;

    const SEED: &str = r#"
        [[users]]
        id = "user_1"
        name = "Sarah Jenkins"
        email = "sarah@example.com"
        location = "Brooklyn, NY, USA"
        wallet_balance = 150

        [[users]]
        id = "user_2"
        name = "Mike Chen"
        email = "mike@example.com"
        location = "Austin, TX, USA"

        [[listings]]
        giver_id = "user_1"
        title = "Vegetable Lasagna"
        quantity = 4
        location = "Brooklyn, NY"
        distance = "0.5km"
        carbon_saved = 2.4
    "#;

    #[tokio::test]
    async fn test_seed_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(SEED)?;

        let first = seed_from_config(&db, &config).await?;
        assert_eq!(
            first,
            SeedSummary {
                users_created: 2,
                listings_created: 1
            }
        );
        assert_eq!(require_user(&db, "user_1").await?.wallet_balance, 150);

        let second = seed_from_config(&db, &config).await?;
        assert_eq!(second, SeedSummary::default());
        assert_eq!(get_available_listings(&db, None).await?.len(), 1);
        assert_eq!(require_user(&db, "user_1").await?.wallet_balance, 150);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_opening_balance_leaves_no_user() -> Result<()> {
        let db = setup_test_db().await?;
        let broken = parse_config(&SEED.replace("wallet_balance = 150", "wallet_balance = -150"))?;

        let result = seed_from_config(&db, &broken).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -150 })));
        assert!(get_user_by_id(&db, "user_1").await?.is_none());

        // Nothing half-written blocks the corrected run
        let summary = seed_from_config(&db, &parse_config(SEED)?).await?;
        assert_eq!(summary.listings_created, 1);
        assert_eq!(require_user(&db, "user_1").await?.wallet_balance, 150);
        assert_eq!(get_points_history(&db, "user_1").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_rejects_orphan_listing() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(&SEED.replace("giver_id = \"user_1\"", "giver_id = \"user_9\""))?;

        let result = seed_from_config(&db, &config).await;
        assert!(matches!(result, Err(Error::Config { .. })));
        Ok(())
    }
}
