use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::user::User;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Input for creating a user. The password arrives already hashed; the store
/// never sees a plaintext credential.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

/// Persistence contract for user records: exact-match lookups by id or email,
/// no deletion, no pagination. Handlers hold this as `Arc<dyn CredentialStore>`
/// and never know which backend is behind it.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert-if-absent on the email index. Of two concurrent creates with
    /// the same email exactly one wins; the other gets `DuplicateEmail`.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Replace the stored hash. Returns false if the id is absent.
    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<bool, StoreError>;

    /// Flip `is_active` off. Returns false if the id is absent. There is no
    /// reactivation operation.
    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError>;
}
