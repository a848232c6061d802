//! Credential store contract and its in-memory implementation.

mod memory;

pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewUser, UserRecord};

/// Durable owner of user records.
///
/// Identity uniqueness among live records is the store's job and must be atomic
/// with the insert: a duplicate fails with `AppError::Conflict`. Soft-deleted
/// records are invisible to every lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord>;

    async fn find_by_identity(&self, identity: &str) -> AppResult<UserRecord>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<UserRecord>;

    /// Replace the password hash and bump `updated_at`.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<UserRecord>;

    /// Compare-and-swap the password hash: only replaces it while the stored
    /// hash still equals `expected_hash`. Returns `false` when the record moved
    /// on (changed, deleted or gone) and nothing was written.
    async fn upgrade_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> AppResult<bool>;

    async fn soft_delete(&self, id: Uuid) -> AppResult<()>;
}
