//! Postgres-backed record store (sqlx).
//!
//! ## Error mapping
//!
//! SQLx errors are classified into `StoreError` as follows:
//!
//! | SQLx outcome | PostgreSQL code | StoreError | Scenario |
//! |--------------|-----------------|------------|----------|
//! | `RowNotFound` | N/A | `NotFound` | lookup matched no active row |
//! | zero rows affected (conditional UPDATE) | N/A | `Conflict` | stale version or missing id |
//! | Database (unique violation) | `23505` | `Duplicate` | natural-key collision among active rows |
//! | anything else | any | `Unknown` | wrapped message, logged, never shown to clients |
//!
//! ## Thread safety
//!
//! Repositories hold a `PgPool` clone and are `Send + Sync`. A transaction
//! handle, by contrast, is exclusively owned by one logical operation
//! sequence via [`PgTxSlot`].

mod auth_providers;
mod money_flows;
mod user_auths;
mod users;

pub use auth_providers::PgAuthProviderRepository;
pub use money_flows::PgMoneyFlowRepository;
pub use user_auths::PgUserAuthRepository;
pub use users::PgUserRepository;

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use cashnote_core::{StoreError, StoreResult};

use crate::context::{BoxFuture, OpContext, bounded};
use crate::repository::{TxError, TxFn, TxManager};

/// Embedded schema migrations (`migrations/` at the workspace root).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Open a connection pool.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Classify a sqlx failure into the store taxonomy.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: natural-key collision.
                Some("23505") => StoreError::Duplicate,
                _ => StoreError::unknown(msg),
            }
        }
        other => StoreError::unknown(format!("{operation}: {other}")),
    }
}

/// Holds the live transaction for the duration of one unit of work.
///
/// The slot is shared through the `OpContext` as a type-erased handle;
/// repositories lock it to borrow the transaction connection. Once the
/// unit-of-work commits or rolls back the slot is empty and any further use
/// is an error. If the slot is dropped while still holding the transaction
/// (panic or cancellation), sqlx rolls the transaction back on drop.
pub struct PgTxSlot {
    inner: tokio::sync::Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgTxSlot {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(Some(tx)),
        }
    }

    async fn take(&self) -> Option<Transaction<'static, Postgres>> {
        self.inner.lock().await.take()
    }
}

impl core::fmt::Debug for PgTxSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PgTxSlot")
    }
}

/// Connection source resolved from a context: the carried transaction when
/// one is active, otherwise a pooled connection.
pub(crate) enum PgConn<'a> {
    Pool(PoolConnection<Postgres>),
    Tx(tokio::sync::MutexGuard<'a, Option<Transaction<'static, Postgres>>>),
}

impl PgConn<'_> {
    pub(crate) fn executor(&mut self) -> StoreResult<&mut PgConnection> {
        match self {
            PgConn::Pool(conn) => Ok(&mut *conn),
            PgConn::Tx(guard) => guard
                .as_mut()
                .map(|tx| &mut **tx)
                .ok_or_else(|| StoreError::unknown("transaction already completed")),
        }
    }
}

/// Resolve the connection for this operation. Dispatch is the store's
/// responsibility: callers never pass a transaction explicitly.
pub(crate) async fn acquire<'a>(ctx: &'a OpContext, pool: &PgPool) -> StoreResult<PgConn<'a>> {
    ctx.ensure_active()?;

    if let Some(any) = ctx.tx_any() {
        let slot = any
            .downcast_ref::<PgTxSlot>()
            .ok_or_else(|| StoreError::unknown("foreign transaction handle in context"))?;
        return Ok(PgConn::Tx(slot.inner.lock().await));
    }

    let conn = bounded(ctx, pool.acquire())
        .await?
        .map_err(|e| map_sqlx_error("acquire", e))?;
    Ok(PgConn::Pool(conn))
}

/// Postgres unit-of-work.
#[derive(Debug, Clone)]
pub struct PgTxManager {
    pool: PgPool,
}

impl PgTxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TxManager for PgTxManager {
    fn run_in_transaction<'a, T>(
        &'a self,
        ctx: OpContext,
        f: TxFn<'a, T>,
    ) -> BoxFuture<'a, StoreResult<T>>
    where
        T: Send + 'a,
    {
        Box::pin(async move {
            ctx.ensure_active()?;

            // Already inside a transaction: the outermost caller owns
            // commit/rollback.
            if ctx.in_transaction() {
                return f(ctx).await;
            }

            let tx = bounded(&ctx, self.pool.begin())
                .await?
                .map_err(|e| map_sqlx_error("begin", e))?;
            let slot = Arc::new(PgTxSlot::new(tx));
            let tx_ctx = ctx.with_tx(slot.clone());

            match f(tx_ctx).await {
                Ok(value) => {
                    let tx = slot
                        .take()
                        .await
                        .ok_or_else(|| StoreError::unknown("transaction handle escaped"))?;
                    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
                    Ok(value)
                }
                Err(err) => {
                    if let Some(tx) = slot.take().await {
                        if let Err(e) = tx.rollback().await {
                            tracing::warn!(error = %e, "transaction rollback failed");
                        }
                    }
                    Err(err)
                }
            }
        })
    }

    fn begin<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<OpContext, TxError>> {
        Box::pin(async move {
            if ctx.in_transaction() {
                return Ok(ctx.clone());
            }
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| TxError::Io(e.to_string()))?;
            Ok(ctx.with_tx(Arc::new(PgTxSlot::new(tx))))
        })
    }

    fn commit<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        Box::pin(async move {
            let slot = resolve_slot(ctx)?;
            let tx = slot.take().await.ok_or(TxError::AlreadyCompleted)?;
            tx.commit().await.map_err(|e| TxError::Io(e.to_string()))
        })
    }

    fn rollback<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        Box::pin(async move {
            let slot = resolve_slot(ctx)?;
            let tx = slot.take().await.ok_or(TxError::AlreadyCompleted)?;
            tx.rollback().await.map_err(|e| TxError::Io(e.to_string()))
        })
    }
}

fn resolve_slot(ctx: &OpContext) -> Result<Arc<PgTxSlot>, TxError> {
    match ctx.tx_any() {
        None => Err(TxError::NoActiveTransaction),
        Some(_) => ctx.tx_handle::<PgTxSlot>().ok_or(TxError::WrongBackend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(
            map_sqlx_error("users.find", sqlx::Error::RowNotFound),
            StoreError::NotFound
        );
    }

    #[test]
    fn unclassified_errors_map_to_unknown() {
        let err = map_sqlx_error("users.find", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unknown(_)));
    }
}
