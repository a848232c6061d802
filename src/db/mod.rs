//! Database layer: pool, migrations and the Postgres credential store.

mod pool;
mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::*;

/// Versioned schema migrations embedded from `./migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
