//! Argon2id password hashing with a start-up decoy for timing-equalised misses.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::{debug, error};

use crate::error::{AppError, AppResult};

/// Argon2id work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes and verifies secrets. Cheap to clone; all clones share the decoy hash.
#[derive(Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
    params: HashParams,
    decoy: Arc<str>,
}

impl SecretHasher {
    /// Build a hasher and derive the decoy hash used when an identity is unknown.
    pub fn new(params: HashParams) -> AppResult<Self> {
        let argon_params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut hasher = Self {
            argon2,
            params,
            decoy: Arc::from(""),
        };
        let filler = SaltString::generate(&mut OsRng);
        hasher.decoy = Arc::from(hasher.hash(filler.as_str())?);
        debug!(?params, "secret hasher ready");
        Ok(hasher)
    }

    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Hash a secret with a fresh random salt, returning a PHC string.
    pub fn hash(&self, secret: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AppError::Internal(anyhow::anyhow!("hash: {}", e))
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check of `secret` against a stored PHC string.
    pub fn verify(&self, secret: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AppError::Internal(anyhow::anyhow!("parse hash: {}", e))
        })?;
        Ok(self
            .argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burn the same work as a real verification. The outcome is irrelevant.
    pub fn verify_decoy(&self, secret: &str) {
        let _ = self.verify(secret, &self.decoy);
    }

    /// Whether a stored hash was produced with different algorithm or work factors.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(p) => {
                p.m_cost() != self.params.memory_kib
                    || p.t_cost() != self.params.iterations
                    || p.p_cost() != self.params.parallelism
            }
            Err(_) => true,
        }
    }
}
