//! User and session repositories.

use crate::error::MetadataResult;
use crate::models::{SessionRow, UserRow};
use async_trait::async_trait;
use time::OffsetDateTime;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `AlreadyExists` on a duplicate username.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>>;

    /// Replace a user's password digest. Fails with `NotFound` on an unknown user.
    async fn set_user_password(&self, username: &str, password_hash: &str) -> MetadataResult<()>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()>;

    /// Get a session by token digest.
    async fn get_session(&self, token_hash: &str) -> MetadataResult<Option<SessionRow>>;

    /// Remove sessions expired at `now`. Returns the number removed.
    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> MetadataResult<u64>;
}
