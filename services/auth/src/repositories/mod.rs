//! Credential store abstraction and its implementations

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    error::StoreError,
    models::{NewUser, User},
};

pub mod memory;
pub mod user;

pub use memory::MemoryUserStore;
pub use user::PgUserStore;

/// Failure modes of [`UserStore::create`]
#[derive(Error, Debug)]
pub enum CreateUserError {
    /// The username or email is already taken
    #[error("user already exists")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistent table of user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; uniqueness is enforced by the store itself
    async fn create(&self, new_user: &NewUser) -> Result<User, CreateUserError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Replace the stored hash, returning the updated user if it still exists
    async fn update_password(
        &self,
        id: i32,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
}
