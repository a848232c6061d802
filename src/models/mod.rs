//! Data models: user records, roles and session tokens.

pub mod token;
pub mod user;

pub use token::*;
pub use user::*;
