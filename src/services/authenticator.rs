//! Registration, login and credential lifecycle on top of a credential store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{CredentialPolicy, SecretHasher, TokenIssuer};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, Role, SessionToken, UserRecord};
use crate::repositories::CredentialStore;

/// Stateless apart from immutable collaborators; clone freely across requests.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: SecretHasher,
    issuer: TokenIssuer,
    policy: CredentialPolicy,
    store_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: SecretHasher,
        issuer: TokenIssuer,
        policy: CredentialPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            policy,
            store_timeout,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Create a `user`-role record. The caller never chooses the role.
    pub async fn register(&self, identity: &str, secret: &str) -> AppResult<UserRecord> {
        self.register_with_name(identity, secret, None).await
    }

    #[instrument(skip(self, identity, secret, name))]
    pub async fn register_with_name(
        &self,
        identity: &str,
        secret: &str,
        name: Option<&str>,
    ) -> AppResult<UserRecord> {
        let identity = self.policy.normalize_identity(identity)?;
        self.policy.check_secret(secret)?;
        let name = self.policy.normalize_name(name)?;

        let password_hash = self.hash(secret).await?;
        let new_user = NewUser {
            identity,
            name,
            password_hash,
            role: Role::default(),
        };
        let user = match self.bounded("insert", self.store.insert(new_user)).await {
            Ok(user) => user,
            Err(AppError::Conflict) => {
                warn!("identity already registered");
                return Err(AppError::Conflict);
            }
            Err(e) => return Err(e),
        };

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Unknown identity and wrong secret are indistinguishable to the caller,
    /// in both the error returned and the hashing work performed.
    ///
    /// One gap remains: a record whose hash predates a change of Argon2 costs
    /// is verified at its old cost, while the decoy runs at the current one.
    /// The first successful login upgrades such a hash and closes the gap for
    /// that record; records that never log in again keep it.
    #[instrument(skip(self, identity, secret))]
    pub async fn login(&self, identity: &str, secret: &str) -> AppResult<SessionToken> {
        // Nothing longer than MAX_SECRET_LEN can be a stored secret, but it
        // still pays for one bounded decoy verification.
        let (bounded_secret, cut) = self.policy.bound_secret(secret);
        if cut {
            self.verify_decoy(bounded_secret).await?;
            warn!("login with over-long secret");
            return Err(AppError::InvalidCredentials);
        }

        let identity = match self.policy.normalize_identity(identity) {
            Ok(identity) => identity,
            Err(_) => {
                self.verify_decoy(secret).await?;
                return Err(AppError::InvalidCredentials);
            }
        };

        let user = match self
            .bounded("find_by_identity", self.store.find_by_identity(&identity))
            .await
        {
            Ok(user) => user,
            Err(AppError::NotFound) => {
                self.verify_decoy(secret).await?;
                warn!("login for unknown identity");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !self.verify(secret, &user.password_hash).await? {
            warn!(user_id = %user.id, "login with wrong secret");
            return Err(AppError::InvalidCredentials);
        }

        if self.hasher.needs_rehash(&user.password_hash) {
            self.upgrade_hash(&user, secret).await;
        }

        let token = self.issuer.mint(user.id, user.role)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Requires the current secret even for an authenticated caller.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(&self, subject_id: Uuid, current: &str, new: &str) -> AppResult<()> {
        let user = self
            .bounded("find_by_id", self.store.find_by_id(subject_id))
            .await?;
        if !self.verify(current, &user.password_hash).await? {
            warn!(user_id = %subject_id, "password change with wrong secret");
            return Err(AppError::InvalidCredentials);
        }
        self.policy.check_secret(new)?;

        let password_hash = self.hash(new).await?;
        self.bounded(
            "update_password",
            self.store.update_password(subject_id, &password_hash),
        )
        .await?;
        info!(user_id = %subject_id, "password changed");
        Ok(())
    }

    pub async fn profile(&self, subject_id: Uuid) -> AppResult<UserRecord> {
        self.bounded("find_by_id", self.store.find_by_id(subject_id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, subject_id: Uuid) -> AppResult<()> {
        self.bounded("soft_delete", self.store.soft_delete(subject_id))
            .await?;
        info!(user_id = %subject_id, "user deactivated");
        Ok(())
    }

    /// Abandon a store call after `store_timeout`. The core never retries.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(op, timeout_ms = self.store_timeout.as_millis() as u64, "store call timed out");
                Err(AppError::StoreUnavailable(format!("{} timed out", op)))
            }
        }
    }

    /// Swap in a hash at the current costs, but only over the exact hash this
    /// login verified. A password change that lands in between wins.
    async fn upgrade_hash(&self, user: &UserRecord, secret: &str) {
        let result = match self.hash(secret).await {
            Ok(hash) => {
                self.bounded(
                    "upgrade_password",
                    self.store
                        .upgrade_password(user.id, &user.password_hash, &hash),
                )
                .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => info!(user_id = %user.id, "password hash upgraded"),
            Ok(false) => debug!(user_id = %user.id, "password hash changed concurrently, upgrade skipped"),
            Err(e) => warn!(user_id = %user.id, error = %e, "password rehash failed"),
        }
    }

    // Argon2 runs on the blocking pool, never on async workers.

    async fn hash(&self, secret: &str) -> AppResult<String> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        blocking(move || hasher.hash(&secret)).await
    }

    async fn verify(&self, secret: &str, hash: &str) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        let hash = hash.to_owned();
        blocking(move || hasher.verify(&secret, &hash)).await
    }

    async fn verify_decoy(&self, secret: &str) -> AppResult<()> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        blocking(move || {
            hasher.verify_decoy(&secret);
            Ok(())
        })
        .await
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("blocking task: {}", e)))?
}
