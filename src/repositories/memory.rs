//! In-process credential store used by tests and local runs without Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, UserRecord};

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records including soft-deleted ones.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn live<'a>(
    users: &'a HashMap<Uuid, UserRecord>,
    identity: &str,
) -> Option<&'a UserRecord> {
    users
        .values()
        .find(|u| !u.is_deleted() && u.identity == identity)
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        let mut users = self.users.write().await;
        if live(&users, &user.identity).is_some() {
            return Err(AppError::Conflict);
        }
        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            identity: user.identity,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(record.id, record.clone());
        debug!(user_id = %record.id, "user inserted");
        Ok(record)
    }

    async fn find_by_identity(&self, identity: &str) -> AppResult<UserRecord> {
        let users = self.users.read().await;
        live(&users, identity).cloned().ok_or(AppError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<UserRecord> {
        let users = self.users.read().await;
        users
            .get(&id)
            .filter(|u| !u.is_deleted())
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<UserRecord> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .filter(|u| !u.is_deleted())
            .ok_or(AppError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn upgrade_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> AppResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() && user.password_hash == expected_hash => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .filter(|u| !u.is_deleted())
            .ok_or(AppError::NotFound)?;
        let now = Utc::now();
        user.deleted_at = Some(now);
        user.updated_at = now;
        Ok(())
    }
}
