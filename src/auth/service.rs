//! Credential policy: identity normalisation and secret strength.

use validator::ValidateEmail;

use crate::error::{AppError, AppResult};

pub const MAX_IDENTITY_LEN: usize = 255;
pub const MAX_NAME_LEN: usize = 255;
/// Applies to every secret that reaches the hasher: register, change and login.
pub const MAX_SECRET_LEN: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct CredentialPolicy {
    pub min_secret_len: usize,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self { min_secret_len: 8 }
    }
}

impl CredentialPolicy {
    pub fn new(min_secret_len: usize) -> Self {
        Self { min_secret_len }
    }

    /// Trim and lowercase an identity, then require a plausible email.
    pub fn normalize_identity(&self, identity: &str) -> AppResult<String> {
        let identity = identity.trim().to_lowercase();
        if identity.is_empty() {
            return Err(AppError::InvalidIdentity("email is required".to_string()));
        }
        if identity.chars().count() > MAX_IDENTITY_LEN {
            return Err(AppError::InvalidIdentity("email is too long".to_string()));
        }
        if !identity.validate_email() {
            return Err(AppError::InvalidIdentity("Invalid email".to_string()));
        }
        Ok(identity)
    }

    /// Trim a display name; blank means no name.
    pub fn normalize_name(&self, name: Option<&str>) -> AppResult<Option<String>> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::InvalidBody(format!(
                "name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        Ok(Some(name.to_string()))
    }

    /// Cut a presented secret down to `MAX_SECRET_LEN` characters. Returns the
    /// slice to hash and whether anything was cut off.
    pub fn bound_secret<'a>(&self, secret: &'a str) -> (&'a str, bool) {
        match secret.char_indices().nth(MAX_SECRET_LEN) {
            Some((cut, _)) => (&secret[..cut], true),
            None => (secret, false),
        }
    }

    pub fn check_secret(&self, secret: &str) -> AppResult<()> {
        let len = secret.chars().count();
        if len < self.min_secret_len {
            return Err(AppError::WeakSecret(format!(
                "password must be at least {} characters",
                self.min_secret_len
            )));
        }
        if len > MAX_SECRET_LEN {
            return Err(AppError::WeakSecret(format!(
                "password must be at most {} characters",
                MAX_SECRET_LEN
            )));
        }
        Ok(())
    }
}
