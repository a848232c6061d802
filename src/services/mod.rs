//! Business logic: registration, login and credential lifecycle.

pub mod authenticator;

pub use authenticator::Authenticator;
