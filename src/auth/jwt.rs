//! Session token minting and verification (HS256 JWT).

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Principal, Role, SessionToken};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

/// Mints and verifies session tokens with the process-wide signing key.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mint(&self, subject_id: Uuid, role: Role) -> AppResult<SessionToken> {
        self.mint_at(subject_id, role, Utc::now())
    }

    pub fn mint_at(&self, subject_id: Uuid, role: Role, now: DateTime<Utc>) -> AppResult<SessionToken> {
        let iat = now.timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token ttl out of range: {:?}", self.ttl)))?;
        let claims = Claims {
            sub: subject_id,
            role,
            iat,
            nbf: iat,
            exp,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt encode: {}", e)))?;
        debug!(user_id = %subject_id, %role, "session token minted");
        Ok(SessionToken {
            token,
            subject_id,
            role,
            issued_at: timestamp(iat)?,
            expires_at: timestamp(exp)?,
        })
    }

    pub fn verify(&self, token: &str) -> AppResult<Principal> {
        self.verify_at(token, Utc::now())
    }

    /// Valid iff `nbf <= now < exp`. Signature and issuer are checked first.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time bounds are checked below against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                ErrorKind::InvalidSignature => AppError::BadSignature,
                ErrorKind::ExpiredSignature => AppError::Expired,
                _ => AppError::Malformed,
            }
        })?;
        let claims = data.claims;

        let now = now.timestamp();
        if now < claims.nbf {
            debug!(user_id = %claims.sub, "token not yet valid");
            return Err(AppError::Malformed);
        }
        if now >= claims.exp {
            debug!(user_id = %claims.sub, "token expired");
            return Err(AppError::Expired);
        }

        Ok(Principal {
            subject_id: claims.sub,
            role: claims.role,
        })
    }
}

fn timestamp(secs: i64) -> AppResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("timestamp out of range: {}", secs)))
}
