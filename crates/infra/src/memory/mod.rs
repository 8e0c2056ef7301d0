//! In-memory record store.
//!
//! Intended for tests/dev. Implements the same contract as the Postgres
//! backend: version-gated conditional updates, soft-delete filtering on
//! every read, natural-key uniqueness among active rows, and a snapshot
//! based unit-of-work. All writes are serialized through the transaction
//! gate: while a transaction is open, non-transactional writers queue
//! behind it, so the snapshot restored on rollback can never erase a
//! write committed in between. Reads take no gate and may observe
//! uncommitted transactional state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use cashnote_core::{
    AuthProvider, AuthProviderId, FlowId, MoneyFlow, StoreError, StoreResult, User, UserAuth,
    UserAuthId, UserId,
};

use crate::context::{BoxFuture, OpContext};
use crate::repository::{
    AuthProviderRepository, MoneyFlowRepository, TxError, TxFn, TxManager, UserAuthRepository,
    UserRepository,
};

#[derive(Debug, Default, Clone)]
struct State {
    users: HashMap<UserId, User>,
    flows: HashMap<FlowId, MoneyFlow>,
    user_auths: HashMap<UserAuthId, UserAuth>,
    providers: HashMap<AuthProviderId, AuthProvider>,
}

/// Shared backing state for the in-memory repositories.
#[derive(Debug)]
pub struct InMemoryDatabase {
    state: RwLock<State>,
    tx_gate: Arc<tokio::sync::Mutex<()>>,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self {
            state: RwLock::new(State::default()),
            tx_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::unknown("state lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::unknown("state lock poisoned"))
    }

    /// Serialize a non-transactional write behind any open transaction.
    /// Writes running inside a transaction already own the gate.
    async fn write_gate(&self, ctx: &OpContext) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        if ctx.tx_handle::<MemTxSlot>().is_some() {
            return None;
        }
        Some(self.tx_gate.lock().await)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work
// ─────────────────────────────────────────────────────────────────────────────

/// One live in-memory transaction: a snapshot of the whole state plus the
/// gate guard that serializes transactions.
struct MemTx {
    db: Arc<InMemoryDatabase>,
    snapshot: Option<State>,
    _gate: OwnedMutexGuard<()>,
}

impl MemTx {
    fn commit(mut self) {
        // Discard the snapshot; writes performed through the repositories
        // are already in place.
        self.snapshot = None;
    }

    fn rollback(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            if let Ok(mut state) = self.db.state.write() {
                *state = snapshot;
            }
        }
    }
}

impl Drop for MemTx {
    fn drop(&mut self) {
        // Abandoned handle (panic or cancellation): roll back.
        self.restore();
    }
}

/// Type-erased transaction slot carried by the context.
pub struct MemTxSlot {
    inner: Mutex<Option<MemTx>>,
}

impl MemTxSlot {
    fn new(tx: MemTx) -> Self {
        Self {
            inner: Mutex::new(Some(tx)),
        }
    }

    fn take(&self) -> Option<MemTx> {
        self.inner.lock().ok()?.take()
    }
}

/// In-memory unit-of-work: snapshot on begin, restore on rollback.
#[derive(Clone)]
pub struct MemTxManager {
    db: Arc<InMemoryDatabase>,
}

impl MemTxManager {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }

    async fn open(&self) -> StoreResult<MemTx> {
        let gate = self.db.tx_gate.clone().lock_owned().await;
        let snapshot = self.db.read()?.clone();
        Ok(MemTx {
            db: self.db.clone(),
            snapshot: Some(snapshot),
            _gate: gate,
        })
    }
}

impl TxManager for MemTxManager {
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

            if ctx.in_transaction() {
                return f(ctx).await;
            }

            let tx = self.open().await?;
            let slot = Arc::new(MemTxSlot::new(tx));
            let tx_ctx = ctx.with_tx(slot.clone());

            match f(tx_ctx).await {
                Ok(value) => {
                    if let Some(tx) = slot.take() {
                        tx.commit();
                    }
                    Ok(value)
                }
                Err(err) => {
                    if let Some(tx) = slot.take() {
                        tx.rollback();
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
            let tx = self.open().await.map_err(|e| TxError::Io(e.to_string()))?;
            Ok(ctx.with_tx(Arc::new(MemTxSlot::new(tx))))
        })
    }

    fn commit<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        Box::pin(async move {
            let slot = resolve_slot(ctx)?;
            let tx = slot.take().ok_or(TxError::AlreadyCompleted)?;
            tx.commit();
            Ok(())
        })
    }

    fn rollback<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        Box::pin(async move {
            let slot = resolve_slot(ctx)?;
            let tx = slot.take().ok_or(TxError::AlreadyCompleted)?;
            tx.rollback();
            Ok(())
        })
    }
}

fn resolve_slot(ctx: &OpContext) -> Result<Arc<MemTxSlot>, TxError> {
    match ctx.tx_any() {
        None => Err(TxError::NoActiveTransaction),
        Some(_) => ctx.tx_handle::<MemTxSlot>().ok_or(TxError::WrongBackend),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repositories
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InMemoryUserRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryUserRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, ctx: &OpContext, user: &mut User) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;

        let taken = state
            .users
            .values()
            .any(|u| u.deleted_at.is_none() && u.phone_number == user.phone_number);
        if taken || state.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate);
        }

        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, ctx: &OpContext, id: UserId) -> StoreResult<User> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_phone_number(
        &self,
        ctx: &OpContext,
        phone_number: &str,
    ) -> StoreResult<User> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .users
            .values()
            .find(|u| u.deleted_at.is_none() && u.phone_number == phone_number)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, ctx: &OpContext, user: &User) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;

        let taken = state
            .users
            .values()
            .any(|u| u.id != user.id && u.deleted_at.is_none() && u.phone_number == user.phone_number);
        if taken {
            return Err(StoreError::Duplicate);
        }

        // Stale version and missing id are indistinguishable here, matching
        // the conditional-UPDATE contract.
        let current = matches!(
            state.users.get(&user.id),
            Some(existing) if existing.deleted_at.is_none() && existing.version == user.version - 1
        );
        if !current {
            return Err(StoreError::Conflict);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: UserId) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        match state.users.get_mut(&id) {
            Some(user) if user.deleted_at.is_none() => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn list(&self, ctx: &OpContext, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.as_uuid().cmp(a.id.as_uuid())));
        Ok(paginate(users, limit, offset))
    }
}

#[derive(Clone)]
pub struct InMemoryMoneyFlowRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryMoneyFlowRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }

    fn sorted_flows<P>(&self, predicate: P) -> StoreResult<Vec<MoneyFlow>>
    where
        P: Fn(&MoneyFlow) -> bool,
    {
        let state = self.db.read()?;
        let mut flows: Vec<MoneyFlow> = state
            .flows
            .values()
            .filter(|f| f.deleted_at.is_none() && predicate(f))
            .cloned()
            .collect();
        flows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.as_uuid().cmp(a.id.as_uuid())));
        Ok(flows)
    }
}

#[async_trait]
impl MoneyFlowRepository for InMemoryMoneyFlowRepository {
    async fn create(&self, ctx: &OpContext, flow: &mut MoneyFlow) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        if state.flows.contains_key(&flow.id) {
            return Err(StoreError::Duplicate);
        }
        state.flows.insert(flow.id, flow.clone());
        Ok(())
    }

    async fn find_by_id(&self, ctx: &OpContext, id: FlowId) -> StoreResult<MoneyFlow> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .flows
            .get(&id)
            .filter(|f| f.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_user(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MoneyFlow>> {
        ctx.ensure_active()?;
        let flows = self.sorted_flows(|f| f.user_id == user_id)?;
        Ok(paginate(flows, limit, offset))
    }

    async fn find_by_user_and_date_range(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<MoneyFlow>> {
        ctx.ensure_active()?;
        self.sorted_flows(|f| f.user_id == user_id && f.created_at >= start && f.created_at <= end)
    }

    async fn update(&self, ctx: &OpContext, flow: &MoneyFlow) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        let current = matches!(
            state.flows.get(&flow.id),
            Some(existing) if existing.deleted_at.is_none() && existing.version == flow.version - 1
        );
        if !current {
            return Err(StoreError::Conflict);
        }
        state.flows.insert(flow.id, flow.clone());
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: FlowId) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        match state.flows.get_mut(&id) {
            Some(flow) if flow.deleted_at.is_none() => {
                let now = Utc::now();
                flow.deleted_at = Some(now);
                flow.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn total_by_user(&self, ctx: &OpContext, user_id: UserId) -> StoreResult<f64> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        Ok(state
            .flows
            .values()
            .filter(|f| f.deleted_at.is_none() && f.user_id == user_id)
            .map(|f| f.amount)
            .sum())
    }

    async fn total_by_user_and_category(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        category: &str,
    ) -> StoreResult<f64> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        Ok(state
            .flows
            .values()
            .filter(|f| {
                f.deleted_at.is_none()
                    && f.user_id == user_id
                    && f.category.as_deref() == Some(category)
            })
            .map(|f| f.amount)
            .sum())
    }
}

#[derive(Clone)]
pub struct InMemoryUserAuthRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryUserAuthRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserAuthRepository for InMemoryUserAuthRepository {
    async fn create(&self, ctx: &OpContext, user_auth: &mut UserAuth) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;

        let taken = state.user_auths.values().any(|a| {
            a.deleted_at.is_none()
                && a.credential_id == user_auth.credential_id
                && a.auth_provider_id == user_auth.auth_provider_id
        });
        if taken || state.user_auths.contains_key(&user_auth.id) {
            return Err(StoreError::Duplicate);
        }

        state.user_auths.insert(user_auth.id, user_auth.clone());
        Ok(())
    }

    async fn find_by_credential(
        &self,
        ctx: &OpContext,
        credential_id: &str,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .user_auths
            .values()
            .find(|a| {
                a.deleted_at.is_none()
                    && a.credential_id == credential_id
                    && a.auth_provider_id == provider_id
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_user_and_provider(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .user_auths
            .values()
            .find(|a| {
                a.deleted_at.is_none()
                    && a.user_id == user_id
                    && a.auth_provider_id == provider_id
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, ctx: &OpContext, user_auth: &UserAuth) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        let current = matches!(
            state.user_auths.get(&user_auth.id),
            Some(existing)
                if existing.deleted_at.is_none() && existing.version == user_auth.version - 1
        );
        if !current {
            return Err(StoreError::Conflict);
        }
        state.user_auths.insert(user_auth.id, user_auth.clone());
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: UserAuthId) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;
        match state.user_auths.get_mut(&id) {
            Some(user_auth) if user_auth.deleted_at.is_none() => {
                let now = Utc::now();
                user_auth.deleted_at = Some(now);
                user_auth.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

#[derive(Clone)]
pub struct InMemoryAuthProviderRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryAuthProviderRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthProviderRepository for InMemoryAuthProviderRepository {
    async fn create(&self, ctx: &OpContext, provider: &mut AuthProvider) -> StoreResult<()> {
        ctx.ensure_active()?;
        let _gate = self.db.write_gate(ctx).await;
        let mut state = self.db.write()?;

        let taken = state
            .providers
            .values()
            .any(|p| p.deleted_at.is_none() && p.name.is_some() && p.name == provider.name);
        if taken || state.providers.contains_key(&provider.id) {
            return Err(StoreError::Duplicate);
        }

        state.providers.insert(provider.id, provider.clone());
        Ok(())
    }

    async fn find_by_name(&self, ctx: &OpContext, name: &str) -> StoreResult<AuthProvider> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .providers
            .values()
            .find(|p| p.deleted_at.is_none() && p.name.as_deref() == Some(name))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, ctx: &OpContext, id: AuthProviderId) -> StoreResult<AuthProvider> {
        ctx.ensure_active()?;
        let state = self.db.read()?;
        state
            .providers
            .get(&id)
            .filter(|p| p.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    items.into_iter().skip(offset).take(limit).collect()
}
