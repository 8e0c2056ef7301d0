//! `cashnote-auth` — token issuance and credential hashing.
//!
//! Stateless building blocks: an HS256 JWT manager for access/refresh
//! tokens and a bcrypt password hasher. Persistence of credentials lives
//! in the storage layer; HTTP extraction lives in the API crate.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtManager, TokenError, TOKEN_ISSUER};
pub use password::PasswordHasher;
