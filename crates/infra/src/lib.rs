//! `cashnote-infra` — storage layer.
//!
//! Repository traits with two implementations: Postgres (sqlx) for
//! production and an in-memory store for tests/dev. Both enforce the same
//! contract: version-gated conditional updates, soft deletion filtered on
//! every read path, and a transactional unit-of-work whose handle travels
//! in an [`OpContext`].

pub mod context;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use context::{BoxFuture, OpContext};
pub use repository::{
    AuthProviderRepository, MoneyFlowRepository, TxError, TxFn, TxManager, UserAuthRepository,
    UserRepository,
};

#[cfg(test)]
mod store_tests;
