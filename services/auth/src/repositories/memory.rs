//! In-memory user repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{CreateUserError, UserStore};
use crate::{
    error::StoreError,
    models::{NewUser, User},
};

#[derive(Default)]
struct Table {
    next_id: i32,
    rows: HashMap<i32, User>,
}

/// User store held in process, with the same uniqueness rules as the SQL schema
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    table: Arc<Mutex<Table>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a user, as if removed out of band
    pub async fn remove(&self, id: i32) -> Option<User> {
        self.table.lock().await.rows.remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: &NewUser) -> Result<User, CreateUserError> {
        let mut table = self.table.lock().await;

        let taken = table
            .rows
            .values()
            .any(|u| u.username == new_user.username || u.email == new_user.email);
        if taken {
            return Err(CreateUserError::Conflict);
        }

        table.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: table.next_id,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password: new_user.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn update_password(
        &self,
        id: i32,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut table = self.table.lock().await;
        Ok(table.rows.get_mut(&id).map(|user| {
            user.password = password_hash.to_string();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}
