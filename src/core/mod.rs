/// Carbon scenario validation and `carbon_saved` derivation
pub mod carbon;
/// Four-digit hand-off codes
pub mod claim_code;
/// Carbon credit listings, purchases and retirements
pub mod credit_market;
/// Pickup trip carbon calculator
pub mod impact;
/// Listing state machine transition table
pub mod lifecycle;
/// Posting, browsing, claiming, unclaiming and deleting listings
pub mod listing;
/// Per-listing chat between giver and receiver
pub mod message;
/// Append-only points ledger and wallet balance changes
pub mod points;
/// Idempotent seeding from configuration
pub mod seed;
/// Authenticated session context
pub mod session;
/// Hand-off verification and reward settlement
pub mod settlement;
/// Subscription tiers and AI scan quota
pub mod subscription;
/// User accounts and ratings
pub mod user;
