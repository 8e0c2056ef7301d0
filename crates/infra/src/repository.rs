//! Repository and unit-of-work interfaces.
//!
//! Business logic depends only on these traits, never on a concrete
//! engine's client types. Every method takes an [`OpContext`]; when the
//! context carries a transaction handle the implementation must execute
//! against it transparently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use cashnote_core::{
    AuthProvider, AuthProviderId, FlowId, MoneyFlow, StoreResult, User, UserAuth, UserAuthId,
    UserId,
};

use crate::context::{BoxFuture, OpContext};

/// User data access.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user (version 0). Fails with `Duplicate` if an active
    /// row already holds the phone number. Server-assigned fields are
    /// written back onto `user`.
    async fn create(&self, ctx: &OpContext, user: &mut User) -> StoreResult<()>;

    /// Fails with `NotFound` if absent or soft-deleted.
    async fn find_by_id(&self, ctx: &OpContext, id: UserId) -> StoreResult<User>;

    /// Lookup by natural key among active rows.
    async fn find_by_phone_number(&self, ctx: &OpContext, phone_number: &str)
    -> StoreResult<User>;

    /// Version-gated conditional write: matches `id` and `version - 1`.
    /// Zero rows affected fails with `Conflict`, whether the cause was a
    /// concurrent writer or a missing id.
    async fn update(&self, ctx: &OpContext, user: &User) -> StoreResult<()>;

    /// Soft delete. Fails with `NotFound` when no active row matches.
    /// Not version-gated.
    async fn delete(&self, ctx: &OpContext, id: UserId) -> StoreResult<()>;

    /// Active users, newest first. Stable order for pagination.
    async fn list(&self, ctx: &OpContext, limit: i64, offset: i64) -> StoreResult<Vec<User>>;
}

/// Money-flow data access.
#[async_trait]
pub trait MoneyFlowRepository: Send + Sync {
    async fn create(&self, ctx: &OpContext, flow: &mut MoneyFlow) -> StoreResult<()>;

    async fn find_by_id(&self, ctx: &OpContext, id: FlowId) -> StoreResult<MoneyFlow>;

    async fn find_by_user(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MoneyFlow>>;

    async fn find_by_user_and_date_range(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<MoneyFlow>>;

    async fn update(&self, ctx: &OpContext, flow: &MoneyFlow) -> StoreResult<()>;

    async fn delete(&self, ctx: &OpContext, id: FlowId) -> StoreResult<()>;

    /// Total spent by a user. Returns 0 (not an error) when no rows match.
    async fn total_by_user(&self, ctx: &OpContext, user_id: UserId) -> StoreResult<f64>;

    async fn total_by_user_and_category(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        category: &str,
    ) -> StoreResult<f64>;
}

/// Credential-link data access.
#[async_trait]
pub trait UserAuthRepository: Send + Sync {
    async fn create(&self, ctx: &OpContext, user_auth: &mut UserAuth) -> StoreResult<()>;

    /// Lookup by `(credential_id, provider)` among active rows.
    async fn find_by_credential(
        &self,
        ctx: &OpContext,
        credential_id: &str,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth>;

    async fn find_by_user_and_provider(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth>;

    async fn update(&self, ctx: &OpContext, user_auth: &UserAuth) -> StoreResult<()>;

    async fn delete(&self, ctx: &OpContext, id: UserAuthId) -> StoreResult<()>;
}

/// Auth-provider configuration access.
#[async_trait]
pub trait AuthProviderRepository: Send + Sync {
    async fn create(&self, ctx: &OpContext, provider: &mut AuthProvider) -> StoreResult<()>;

    async fn find_by_name(&self, ctx: &OpContext, name: &str) -> StoreResult<AuthProvider>;

    async fn find_by_id(&self, ctx: &OpContext, id: AuthProviderId) -> StoreResult<AuthProvider>;
}

/// Misuse of the manual transaction API. These are programmer errors, not
/// domain outcomes, and are kept apart from [`cashnote_core::StoreError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("no active transaction in context")]
    NoActiveTransaction,

    #[error("transaction handle belongs to a different backend")]
    WrongBackend,

    #[error("transaction already committed or rolled back")]
    AlreadyCompleted,

    #[error("transaction i/o failed: {0}")]
    Io(String),
}

/// Transaction body. Boxed because trait methods cannot take generic async
/// closures; the context passed in carries the active transaction handle.
pub type TxFn<'a, T> =
    Box<dyn FnOnce(OpContext) -> BoxFuture<'a, StoreResult<T>> + Send + 'a>;

/// Transactional unit-of-work.
///
/// `run_in_transaction` is the primary API; `begin`/`commit`/`rollback`
/// exist for advanced flows that need explicit lifecycle control.
pub trait TxManager: Send + Sync {
    /// Run `f` atomically.
    ///
    /// If `ctx` already carries an active transaction, `f` is invoked
    /// directly against it and commit/rollback stay with the outermost
    /// caller. Otherwise a new transaction is opened and passed to `f`
    /// through a derived context; `Ok` commits, `Err` rolls back and the
    /// error is propagated unchanged. If `f` panics or is cancelled, the
    /// handle's drop path rolls back.
    fn run_in_transaction<'a, T>(
        &'a self,
        ctx: OpContext,
        f: TxFn<'a, T>,
    ) -> BoxFuture<'a, StoreResult<T>>
    where
        T: Send + 'a;

    /// Open a transaction and return a context carrying it. Returns the
    /// context unchanged if one is already active.
    fn begin<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<OpContext, TxError>>;

    fn commit<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>>;

    fn rollback<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>>;

    fn in_transaction(&self, ctx: &OpContext) -> bool {
        ctx.in_transaction()
    }
}
