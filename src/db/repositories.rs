//! Postgres-backed credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, Role, UserRecord};
use crate::repositories::CredentialStore;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at, deleted_at";

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("users.role")))?;
        Ok(UserRecord {
            id: row.id,
            identity: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    /// No existence pre-check: the partial unique index decides, and its
    /// violation surfaces as `AppError::Conflict` through `From<sqlx::Error>`.
    #[instrument(skip(self, user), fields(role = %user.role))]
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.identity)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        debug!(user_id = %row.id, "user inserted");
        row.try_into()
    }

    async fn find_by_identity(&self, identity: &str) -> AppResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(AppError::NotFound)?.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(AppError::NotFound)?.try_into()
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET password_hash = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(AppError::NotFound)?.try_into()
    }

    #[instrument(skip(self, expected_hash, password_hash))]
    async fn upgrade_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> AppResult<bool> {
        let r = sqlx::query(
            r#"
            UPDATE users SET password_hash = $1, updated_at = NOW()
            WHERE id = $2 AND password_hash = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let r = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
