//! Session tokens and the principal they assert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::user::Role;

/// A signed, time-bounded credential handed to the client after login.
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// Compact JWS string.
    pub token: String,
    pub subject_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Identity asserted by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Uuid,
    pub role: Role,
}
