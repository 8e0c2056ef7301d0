//! Operation context threaded through every store call.
//!
//! Rather than passing a transaction object explicitly through every call
//! chain, an `OpContext` value carries an optional transaction handle and an
//! optional deadline. Repositories inspect the context: if a handle is
//! present they execute against it, otherwise against the ambient connection
//! pool. The handle is stored type-erased so the context stays
//! backend-agnostic; each backend downcasts to its own slot type.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cashnote_core::{StoreError, StoreResult};

/// Boxed future used for callback-style APIs (transaction bodies).
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-operation context: optional transaction handle + optional deadline.
///
/// Cheap to clone; derived contexts share the same handle. The handle is
/// exclusively owned by the unit-of-work that created it and must not be
/// used from concurrently running tasks.
#[derive(Clone, Default)]
pub struct OpContext {
    tx: Option<Arc<dyn Any + Send + Sync>>,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context with no transaction and no deadline.
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a context that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            tx: self.tx.clone(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a context carrying a backend transaction handle.
    pub fn with_tx(&self, handle: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            tx: Some(handle),
            deadline: self.deadline,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// The raw transaction handle, if any.
    pub fn tx_any(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.tx.as_ref()
    }

    /// Downcast the transaction handle to a backend slot type.
    pub fn tx_handle<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.tx.clone()?.downcast::<T>().ok()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast with [`StoreError::Cancelled`] if the deadline has passed.
    pub fn ensure_active(&self) -> StoreResult<()> {
        match self.remaining() {
            Some(rem) if rem.is_zero() => Err(StoreError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl core::fmt::Debug for OpContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpContext")
            .field("in_transaction", &self.in_transaction())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Run an I/O future under the context's deadline.
///
/// Without a deadline the future runs to completion. With one, the future is
/// aborted (dropped) when the deadline passes and [`StoreError::Cancelled`]
/// is returned; an aborted transaction handle rolls back on drop.
pub async fn bounded<F, T>(ctx: &OpContext, fut: F) -> StoreResult<T>
where
    F: Future<Output = T>,
{
    match ctx.remaining() {
        None => Ok(fut.await),
        Some(rem) if rem.is_zero() => Err(StoreError::Cancelled),
        Some(rem) => tokio::time::timeout(rem, fut)
            .await
            .map_err(|_| StoreError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_context_has_no_tx_and_no_deadline() {
        let ctx = OpContext::root();
        assert!(!ctx.in_transaction());
        assert!(ctx.remaining().is_none());
        assert!(ctx.ensure_active().is_ok());
    }

    #[test]
    fn expired_deadline_fails_fast() {
        let ctx = OpContext::root().with_timeout(Duration::ZERO);
        assert_eq!(ctx.ensure_active(), Err(StoreError::Cancelled));
    }

    #[test]
    fn tx_handle_downcasts_to_the_stored_type() {
        struct Slot(u32);
        let ctx = OpContext::root().with_tx(Arc::new(Slot(7)));
        assert!(ctx.in_transaction());
        assert_eq!(ctx.tx_handle::<Slot>().unwrap().0, 7);
        assert!(ctx.tx_handle::<String>().is_none());
    }

    #[tokio::test]
    async fn bounded_cancels_slow_io() {
        let ctx = OpContext::root().with_timeout(Duration::from_millis(5));
        let res = bounded(&ctx, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            1
        })
        .await;
        assert_eq!(res, Err(StoreError::Cancelled));
    }
}
