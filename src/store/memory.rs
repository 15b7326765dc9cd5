use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::user::User;

use super::{CredentialStore, NewUser, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    email_index: HashMap<String, Uuid>,
}

/// Non-durable store for development and tests. A single lock guards both
/// maps, which makes `create` atomic on the email uniqueness check.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.email_index.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            created_at: OffsetDateTime::now_utc(),
            is_active: true,
        };
        tables.email_index.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = new_hash.to_owned();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
