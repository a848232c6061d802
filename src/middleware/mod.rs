//! Middleware: the interceptor chain guarding protected routes and the extractor it feeds.

pub mod auth;
pub mod chain;
pub mod timeout;

pub use auth::AuthUser;
pub use chain::{intercept, AssignRequestId, Interceptor, InterceptorChain, RequireBearer};
pub use timeout::timeout_body;
