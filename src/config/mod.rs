//! Application configuration loaded from environment.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::HashParams;

/// Minimum length in bytes of the token signing key.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Longest accepted `TOKEN_TTL_SECONDS`: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration loaded from `.env` and environment variables.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:8000`).
    pub server_addr: SocketAddr,
    /// PostgreSQL connection URL. Required.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub db_max_connections: u32,
    /// HS256 signing key for session tokens. Required, at least 32 bytes.
    pub signing_key: String,
    /// `iss` claim written to and required on every token.
    pub token_issuer: String,
    pub token_ttl: Duration,
    /// Upper bound on a single credential store call.
    pub store_timeout: Duration,
    /// Upper bound on a whole HTTP request.
    pub request_timeout: Duration,
    pub password_min_length: usize,
    pub hash_params: HashParams,
    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
    /// Emit JSON log lines instead of the human format.
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let database_url = required(&lookup, "DATABASE_URL")?;
        let signing_key = required(&lookup, "JWT_SECRET")?;
        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigLoadError::WeakSigningKey);
        }

        let token_issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "user-service".to_string());
        let token_ttl_secs: u64 = parsed(&lookup, "TOKEN_TTL_SECONDS", 24 * 60 * 60)?;
        if token_ttl_secs == 0 || token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigLoadError::Invalid {
                key: "TOKEN_TTL_SECONDS",
                value: token_ttl_secs.to_string(),
            });
        }
        let token_ttl = Duration::from_secs(token_ttl_secs);
        let store_timeout = Duration::from_millis(parsed(&lookup, "STORE_TIMEOUT_MS", 5_000)?);
        let request_timeout = Duration::from_millis(parsed(&lookup, "REQUEST_TIMEOUT_MS", 15_000)?);
        let db_max_connections = parsed(&lookup, "DB_MAX_CONNECTIONS", 10)?;
        let password_min_length = parsed(&lookup, "PASSWORD_MIN_LENGTH", 8)?;

        let defaults = HashParams::default();
        let hash_params = HashParams {
            memory_kib: parsed(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parsed(&lookup, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parsed(&lookup, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let run_migrations = parsed(&lookup, "RUN_MIGRATIONS", true)?;
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = lookup("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

        Ok(Self {
            server_addr,
            database_url,
            db_max_connections,
            signing_key,
            token_issuer,
            token_ttl,
            store_timeout,
            request_timeout,
            password_min_length,
            hash_params,
            run_migrations,
            log_level,
            log_json,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("signing_key", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("password_min_length", &self.password_min_length)
            .field("hash_params", &self.hash_params)
            .field("run_migrations", &self.run_migrations)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigLoadError::Missing(key))
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigLoadError::Invalid { key, value: raw.clone() }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("JWT_SECRET must be at least 32 bytes")]
    WeakSigningKey,
}
