//! Postgres auth-provider repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cashnote_core::{AuthProvider, AuthProviderId, StoreError, StoreResult};

use crate::context::{OpContext, bounded};
use crate::repository::AuthProviderRepository;

use super::{acquire, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgAuthProviderRepository {
    pool: PgPool,
}

impl PgAuthProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AuthProviderRow {
    id: Uuid,
    display_name: String,
    name: Option<String>,
    image: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<AuthProviderRow> for AuthProvider {
    fn from(row: AuthProviderRow) -> Self {
        AuthProvider {
            id: AuthProviderId::from_uuid(row.id),
            display_name: row.display_name,
            name: row.name,
            image: row.image,
            client_id: row.client_id,
            client_secret: row.client_secret,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, display_name, name, image, client_id, client_secret, \
                              version, created_at, updated_at, deleted_at";

#[async_trait]
impl AuthProviderRepository for PgAuthProviderRepository {
    async fn create(&self, ctx: &OpContext, provider: &mut AuthProvider) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: AuthProviderRow = bounded(
            ctx,
            sqlx::query_as(
                r#"
                INSERT INTO auth_providers
                    (id, display_name, name, image, client_id, client_secret, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, display_name, name, image, client_id, client_secret,
                          version, created_at, updated_at, deleted_at
                "#,
            )
            .bind(provider.id.as_uuid())
            .bind(&provider.display_name)
            .bind(&provider.name)
            .bind(&provider.image)
            .bind(&provider.client_id)
            .bind(&provider.client_secret)
            .bind(provider.version)
            .bind(provider.created_at)
            .bind(provider.updated_at)
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("auth_providers.create", e))?;

        provider.id = AuthProviderId::from_uuid(row.id);
        provider.created_at = row.created_at;
        provider.updated_at = row.updated_at;
        Ok(())
    }

    async fn find_by_name(&self, ctx: &OpContext, name: &str) -> StoreResult<AuthProvider> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<AuthProviderRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM auth_providers WHERE name = $1 AND deleted_at IS NULL"
            ))
            .bind(name)
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("auth_providers.find_by_name", e))?;

        row.map(AuthProvider::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, ctx: &OpContext, id: AuthProviderId) -> StoreResult<AuthProvider> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<AuthProviderRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM auth_providers WHERE id = $1 AND deleted_at IS NULL"
            ))
            .bind(id.as_uuid())
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("auth_providers.find_by_id", e))?;

        row.map(AuthProvider::from).ok_or(StoreError::NotFound)
    }
}
