//! Authenticated session context.
//!
//! A [`Session`] is created on successful login and consumed by [`Session::logout`].
//! Operations that act on behalf of a user take `&Session` so the acting user is always
//! explicit; there is no ambient "current user".

use crate::{core::user::require_user, entities::user, errors::Result};
use sea_orm::ConnectionTrait;
use tracing::info;

/// The logged-in user, as loaded at login or last refresh.
#[derive(Debug, Clone)]
pub struct Session {
    user: user::Model,
}

impl Session {
    /// Starts a session for an existing user.
    ///
    /// # Errors
    /// [`crate::errors::Error::UserNotFound`] if no such user exists.
    pub async fn login<C>(db: &C, user_id: &str) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let user = require_user(db, user_id).await?;
        info!(user_id = %user.id, "Session started");
        Ok(Self { user })
    }

    /// Id of the logged-in user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Display name of the logged-in user.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user.name
    }

    /// Snapshot of the user record. Balances may be stale; call [`Session::refresh`].
    #[must_use]
    pub const fn user(&self) -> &user::Model {
        &self.user
    }

    /// Reloads the user record.
    pub async fn refresh<C>(&mut self, db: &C) -> Result<()>
    where
        C: ConnectionTrait,
    {
        self.user = require_user(db, &self.user.id).await?;
        Ok(())
    }

    /// Ends the session.
    pub fn logout(self) {
        info!(user_id = %self.user.id, "Session ended");
    }
}
