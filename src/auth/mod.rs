//! Authentication: password hashing, credential policy, session tokens and the signup/signin handlers.

mod handlers;
mod jwt;
mod password;
mod service;

pub use handlers::{signin, signup};
pub use jwt::{Claims, TokenIssuer};
pub use password::{HashParams, SecretHasher};
pub use service::{CredentialPolicy, MAX_IDENTITY_LEN, MAX_NAME_LEN, MAX_SECRET_LEN};
