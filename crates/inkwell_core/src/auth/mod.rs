//! Credential and token service.
//!
//! # Responsibility
//! - Hash and verify passwords with bcrypt.
//! - Issue and validate HS256 bearer tokens carrying `(user id, role, expiry)`.
//! - Resolve an inbound `Authorization` header into an [`Identity`].
//!
//! # Invariants
//! - Touches no store; tokens are self-contained and never refreshed.
//! - Plaintext passwords, hashes and token strings are never logged.

mod identity;
mod password;
mod token;

pub use identity::{bearer_token, Identity};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenService};
