//! Store backend selection and service construction.

use std::sync::Arc;

use cashnote_auth::{JwtManager, PasswordHasher};
use cashnote_core::StoreResult;
use cashnote_infra::context::{BoxFuture, OpContext};
use cashnote_infra::memory::{
    InMemoryAuthProviderRepository, InMemoryDatabase, InMemoryMoneyFlowRepository,
    InMemoryUserAuthRepository, InMemoryUserRepository, MemTxManager,
};
use cashnote_infra::postgres::{
    connect_pool, PgAuthProviderRepository, PgMoneyFlowRepository, PgTxManager,
    PgUserAuthRepository, PgUserRepository, MIGRATOR,
};
use cashnote_infra::{TxError, TxFn, TxManager};

use crate::config::Config;
use crate::services::{AuthService, MoneyFlowService};

/// Unit-of-work over whichever backend the deployment selected.
pub enum AnyTxManager {
    InMemory(MemTxManager),
    Postgres(PgTxManager),
}

impl TxManager for AnyTxManager {
    fn run_in_transaction<'a, T>(
        &'a self,
        ctx: OpContext,
        f: TxFn<'a, T>,
    ) -> BoxFuture<'a, StoreResult<T>>
    where
        T: Send + 'a,
    {
        match self {
            AnyTxManager::InMemory(tm) => tm.run_in_transaction(ctx, f),
            AnyTxManager::Postgres(tm) => tm.run_in_transaction(ctx, f),
        }
    }

    fn begin<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<OpContext, TxError>> {
        match self {
            AnyTxManager::InMemory(tm) => tm.begin(ctx),
            AnyTxManager::Postgres(tm) => tm.begin(ctx),
        }
    }

    fn commit<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        match self {
            AnyTxManager::InMemory(tm) => tm.commit(ctx),
            AnyTxManager::Postgres(tm) => tm.commit(ctx),
        }
    }

    fn rollback<'a>(&'a self, ctx: &'a OpContext) -> BoxFuture<'a, Result<(), TxError>> {
        match self {
            AnyTxManager::InMemory(tm) => tm.rollback(ctx),
            AnyTxManager::Postgres(tm) => tm.rollback(ctx),
        }
    }
}

/// Everything the handlers need, behind one `Arc`.
pub struct AppServices {
    pub auth: AuthService<AnyTxManager>,
    pub money_flows: MoneyFlowService,
}

/// Wire repositories, unit-of-work and services onto the configured
/// backend. `DATABASE_URL`/`DB_*` select Postgres (running pending
/// migrations); otherwise the in-memory store is used.
pub async fn build_services(config: &Config, jwt: JwtManager) -> anyhow::Result<AppServices> {
    let services = match &config.database_url {
        Some(url) => {
            let pool = connect_pool(url, config.max_db_connections).await?;
            MIGRATOR.run(&pool).await?;
            tracing::info!("using postgres store");

            AppServices {
                auth: AuthService::new(
                    Arc::new(PgUserRepository::new(pool.clone())),
                    Arc::new(PgUserAuthRepository::new(pool.clone())),
                    Arc::new(PgAuthProviderRepository::new(pool.clone())),
                    PasswordHasher::new(),
                    jwt,
                    AnyTxManager::Postgres(PgTxManager::new(pool.clone())),
                ),
                money_flows: MoneyFlowService::new(Arc::new(PgMoneyFlowRepository::new(pool))),
            }
        }
        None => {
            tracing::info!("no database configured; using in-memory store");
            let db = InMemoryDatabase::new();

            AppServices {
                auth: AuthService::new(
                    Arc::new(InMemoryUserRepository::new(db.clone())),
                    Arc::new(InMemoryUserAuthRepository::new(db.clone())),
                    Arc::new(InMemoryAuthProviderRepository::new(db.clone())),
                    PasswordHasher::new(),
                    jwt,
                    AnyTxManager::InMemory(MemTxManager::new(db.clone())),
                ),
                money_flows: MoneyFlowService::new(Arc::new(InMemoryMoneyFlowRepository::new(db))),
            }
        }
    };

    services
        .auth
        .ensure_email_password_provider(&OpContext::root())
        .await
        .map_err(|e| anyhow::anyhow!("seeding auth provider: {e}"))?;

    Ok(services)
}
