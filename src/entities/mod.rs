//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod credit_listing;
pub mod listing;
pub mod message;
pub mod point_transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use credit_listing::{
    Column as CreditListingColumn, CreditListingStatus, Entity as CreditListing,
    Model as CreditListingModel,
};
pub use listing::{
    Column as ListingColumn, Entity as Listing, ListingStatus, Model as ListingModel,
    TransportMode,
};
pub use message::{Column as MessageColumn, Entity as Message, Model as MessageModel};
pub use point_transaction::{
    Column as PointTransactionColumn, Entity as PointTransaction,
    Model as PointTransactionModel, PointTransactionKind,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, SubscriptionTier};
