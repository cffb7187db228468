//! Database configuration module for `replate-core`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! Creation is `IF NOT EXISTS`, which makes it safe to run on every start.

use crate::entities::{CreditListing, Listing, Message, PointTransaction, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/replate.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to
/// a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
///
/// When falling back to the default file, its `data/` directory is created first.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if database_url == DEFAULT_DATABASE_URL {
        std::fs::create_dir_all(DEFAULT_DATA_DIR)?;
    }
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates every table if it does not exist yet.
///
/// Users come first and messages after listings, following the foreign keys.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let user_table = schema.create_table_from_entity(User).if_not_exists().to_owned();
    let listing_table = schema
        .create_table_from_entity(Listing)
        .if_not_exists()
        .to_owned();
    let ledger_table = schema
        .create_table_from_entity(PointTransaction)
        .if_not_exists()
        .to_owned();
    let message_table = schema
        .create_table_from_entity(Message)
        .if_not_exists()
        .to_owned();
    let credit_table = schema
        .create_table_from_entity(CreditListing)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&user_table)).await?;
    db.execute(builder.build(&listing_table)).await?;
    db.execute(builder.build(&ledger_table)).await?;
    db.execute(builder.build(&message_table)).await?;
    db.execute(builder.build(&credit_table)).await?;

    info!("Database tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        CreditListingModel, ListingModel, MessageModel, PointTransactionModel, UserModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<ListingModel> = Listing::find().limit(1).all(&db).await?;
        let _: Vec<PointTransactionModel> = PointTransaction::find().limit(1).all(&db).await?;
        let _: Vec<MessageModel> = Message::find().limit(1).all(&db).await?;
        let _: Vec<CreditListingModel> = CreditListing::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_twice_is_harmless() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
