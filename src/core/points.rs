//! Points ledger - Wallet balance changes and their history.
//!
//! Every balance change goes through [`adjust_balance_atomic`] and is paired with one
//! [`append_entry`] call in the same database transaction. The ledger has no update or
//! delete path: history is append-only per user.

use crate::{
    core::user::require_user,
    entities::{PointTransaction, PointTransactionKind, User, point_transaction, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

/// A ledger entry about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Signed amount in points
    pub amount: i64,
    /// Human-readable description
    pub description: String,
    /// Entry type
    pub kind: PointTransactionKind,
    /// Listing that produced the entry
    pub listing_id: Option<i64>,
    /// Carbon standard
    pub standard: Option<String>,
    /// Vintage year
    pub vintage: Option<i32>,
    /// Registry serial number
    pub serial_number: Option<String>,
    /// Settlement verification token
    pub verification_hash: Option<String>,
}

impl LedgerEntry {
    /// Entry with no metadata.
    #[must_use]
    pub fn new(amount: i64, description: impl Into<String>, kind: PointTransactionKind) -> Self {
        Self {
            amount,
            description: description.into(),
            kind,
            listing_id: None,
            standard: None,
            vintage: None,
            serial_number: None,
            verification_hash: None,
        }
    }

    /// Links the entry to a listing.
    #[must_use]
    pub fn for_listing(mut self, listing_id: i64) -> Self {
        self.listing_id = Some(listing_id);
        self
    }

    /// Sets the carbon standard.
    #[must_use]
    pub fn with_standard(mut self, standard: impl Into<String>) -> Self {
        self.standard = Some(standard.into());
        self
    }

    /// Sets the settlement verification token.
    #[must_use]
    pub fn with_verification_hash(mut self, hash: impl Into<String>) -> Self {
        self.verification_hash = Some(hash.into());
        self
    }

    /// Sets the vintage year and registry serial.
    #[must_use]
    pub fn with_registry(mut self, vintage: i32, serial_number: impl Into<String>) -> Self {
        self.vintage = Some(vintage);
        self.serial_number = Some(serial_number.into());
        self
    }
}

/// Appends one entry to a user's history.
pub async fn append_entry<C>(
    db: &C,
    user_id: &str,
    entry: LedgerEntry,
) -> Result<point_transaction::Model>
where
    C: ConnectionTrait,
{
    let model = point_transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        listing_id: Set(entry.listing_id),
        amount: Set(entry.amount),
        description: Set(entry.description),
        transaction_type: Set(entry.kind),
        standard: Set(entry.standard),
        vintage: Set(entry.vintage),
        serial_number: Set(entry.serial_number),
        verification_hash: Set(entry.verification_hash),
        timestamp: Set(chrono::Utc::now()),
        ..Default::default()
    };

    model.insert(db).await.map_err(Into::into)
}

/// Adds `delta` to a wallet with a single `UPDATE ... SET wallet_balance = wallet_balance + ?`.
///
/// Never reads the balance first, so concurrent credits cannot lose updates.
/// Returns the updated user.
pub async fn adjust_balance_atomic<C>(db: &C, user_id: &str, delta: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let result = User::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).add(delta),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::UserNotFound {
            id: user_id.to_string(),
        });
    }

    require_user(db, user_id).await
}

/// Credits points to a user and records an `earned` entry.
///
/// Accepts an open transaction as well, in which case the credit runs in a savepoint.
pub async fn earn_points<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    description: &str,
) -> Result<point_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    adjust_balance_atomic(&txn, user_id, amount).await?;
    let entry = append_entry(
        &txn,
        user_id,
        LedgerEntry::new(amount, description, PointTransactionKind::Earned),
    )
    .await?;
    txn.commit().await?;

    info!(user_id, amount, "Points earned");
    Ok(entry)
}

/// Subtracts `amount` from a wallet only if the balance covers it, in one conditional
/// `UPDATE`. Returns the updated user.
///
/// # Errors
/// * [`Error::InsufficientPoints`] - the balance is below `amount`; nothing changes
/// * [`Error::UserNotFound`]
pub async fn debit_balance_atomic<C>(db: &C, user_id: &str, amount: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let result = User::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).sub(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::WalletBalance.gte(amount))
        .exec(db)
        .await?;

    let holder = require_user(db, user_id).await?;
    if result.rows_affected == 0 {
        warn!(user_id, amount, balance = holder.wallet_balance, "Debit refused");
        return Err(Error::InsufficientPoints {
            balance: holder.wallet_balance,
            required: amount,
        });
    }
    Ok(holder)
}

/// Spends points and records a `redeemed` entry with a negative amount.
///
/// The decrement is conditional on `wallet_balance >= amount`, so two concurrent
/// redemptions cannot overdraw the wallet.
pub async fn redeem_points(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    description: &str,
) -> Result<point_transaction::Model> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    debit_balance_atomic(&txn, user_id, amount).await?;
    let entry = append_entry(
        &txn,
        user_id,
        LedgerEntry::new(-amount, description, PointTransactionKind::Redeemed),
    )
    .await?;
    txn.commit().await?;

    info!(user_id, amount, "Points redeemed");
    Ok(entry)
}

/// Returns a user's ledger, newest first.
pub async fn get_points_history(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<point_transaction::Model>> {
    PointTransaction::find()
        .filter(point_transaction::Column::UserId.eq(user_id))
        .order_by_desc(point_transaction::Column::Timestamp)
        .order_by_desc(point_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_amount_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        assert!(matches!(
            earn_points(&db, "user_1", 0, "nothing").await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            redeem_points(&db, "user_1", -5, "negative").await,
            Err(Error::InvalidAmount { amount: -5 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_earn_then_redeem() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "user_1", "Sarah").await?;

        earn_points(&db, "user_1", 100, "Welcome bonus").await?;
        let redeemed = redeem_points(&db, "user_1", 30, "Coffee voucher").await?;
        assert_eq!(redeemed.amount, -30);
        assert_eq!(redeemed.transaction_type, PointTransactionKind::Redeemed);

        let holder = require_user(&db, "user_1").await?;
        assert_eq!(holder.wallet_balance, 70);

        let history = get_points_history(&db, "user_1").await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].description, "Coffee voucher");
        assert_eq!(history[1].amount, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_more_than_balance() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "user_1", "Sarah").await?;
        earn_points(&db, "user_1", 10, "Bonus").await?;

        let result = redeem_points(&db, "user_1", 11, "Too much").await;
        assert!(matches!(
            result,
            Err(Error::InsufficientPoints {
                balance: 10,
                required: 11
            })
        ));

        // Nothing was written
        assert_eq!(require_user(&db, "user_1").await?.wallet_balance, 10);
        assert_eq!(get_points_history(&db, "user_1").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_balance_unknown_user() -> Result<()> {
        let db = setup_test_db().await?;
        let result = adjust_balance_atomic(&db, "ghost", 5).await;
        assert!(matches!(result, Err(Error::UserNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_ledger_entry_metadata_persisted() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "user_1", "Sarah").await?;

        let entry = LedgerEntry::new(40, "Credits retired", PointTransactionKind::Retired)
            .with_standard("Gold Standard")
            .with_registry(2024, "GS-402-2024");
        let written = append_entry(&db, "user_1", entry).await?;

        let stored = get_points_history(&db, "user_1").await?;
        assert_eq!(stored, vec![written]);
        assert_eq!(stored[0].standard.as_deref(), Some("Gold Standard"));
        assert_eq!(stored[0].vintage, Some(2024));
        assert_eq!(stored[0].serial_number.as_deref(), Some("GS-402-2024"));
        Ok(())
    }
}
