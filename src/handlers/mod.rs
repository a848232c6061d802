//! HTTP request handlers outside the auth module.

pub mod http;
pub mod users;

pub use http::*;
pub use users::*;
