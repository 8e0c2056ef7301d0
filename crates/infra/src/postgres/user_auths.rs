//! Postgres credential-link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use cashnote_core::{AuthProviderId, StoreError, StoreResult, UserAuth, UserAuthId, UserId};

use crate::context::{OpContext, bounded};
use crate::repository::UserAuthRepository;

use super::{acquire, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgUserAuthRepository {
    pool: PgPool,
}

impl PgUserAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserAuthRow {
    id: Uuid,
    user_id: Uuid,
    auth_provider_id: Uuid,
    credential_id: String,
    credential_secret: String,
    credential_refresh: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserAuthRow> for UserAuth {
    fn from(row: UserAuthRow) -> Self {
        UserAuth {
            id: UserAuthId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            auth_provider_id: AuthProviderId::from_uuid(row.auth_provider_id),
            credential_id: row.credential_id,
            credential_secret: row.credential_secret,
            credential_refresh: row.credential_refresh,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, auth_provider_id, credential_id, credential_secret, \
                              credential_refresh, version, created_at, updated_at, deleted_at";

#[async_trait]
impl UserAuthRepository for PgUserAuthRepository {
    #[instrument(skip(self, ctx, user_auth), fields(user_id = %user_auth.user_id), err)]
    async fn create(&self, ctx: &OpContext, user_auth: &mut UserAuth) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: UserAuthRow = bounded(
            ctx,
            sqlx::query_as(
                r#"
                INSERT INTO user_auths
                    (id, user_id, auth_provider_id, credential_id, credential_secret,
                     credential_refresh, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, user_id, auth_provider_id, credential_id, credential_secret,
                          credential_refresh, version, created_at, updated_at, deleted_at
                "#,
            )
            .bind(user_auth.id.as_uuid())
            .bind(user_auth.user_id.as_uuid())
            .bind(user_auth.auth_provider_id.as_uuid())
            .bind(&user_auth.credential_id)
            .bind(&user_auth.credential_secret)
            .bind(&user_auth.credential_refresh)
            .bind(user_auth.version)
            .bind(user_auth.created_at)
            .bind(user_auth.updated_at)
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("user_auths.create", e))?;

        user_auth.id = UserAuthId::from_uuid(row.id);
        user_auth.created_at = row.created_at;
        user_auth.updated_at = row.updated_at;
        Ok(())
    }

    async fn find_by_credential(
        &self,
        ctx: &OpContext,
        credential_id: &str,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<UserAuthRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM user_auths
                WHERE credential_id = $1 AND auth_provider_id = $2 AND deleted_at IS NULL
                "#
            ))
            .bind(credential_id)
            .bind(provider_id.as_uuid())
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("user_auths.find_by_credential", e))?;

        row.map(UserAuth::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_user_and_provider(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        provider_id: AuthProviderId,
    ) -> StoreResult<UserAuth> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<UserAuthRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM user_auths
                WHERE user_id = $1 AND auth_provider_id = $2 AND deleted_at IS NULL
                "#
            ))
            .bind(user_id.as_uuid())
            .bind(provider_id.as_uuid())
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("user_auths.find_by_user_and_provider", e))?;

        row.map(UserAuth::from).ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, ctx, user_auth), fields(user_id = %user_auth.user_id, version = user_auth.version), err)]
    async fn update(&self, ctx: &OpContext, user_auth: &UserAuth) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let result = bounded(
            ctx,
            sqlx::query(
                r#"
                UPDATE user_auths
                SET credential_secret = $1, credential_refresh = $2, version = $3, updated_at = $4
                WHERE id = $5 AND version = $6 AND deleted_at IS NULL
                "#,
            )
            .bind(&user_auth.credential_secret)
            .bind(&user_auth.credential_refresh)
            .bind(user_auth.version)
            .bind(user_auth.updated_at)
            .bind(user_auth.id.as_uuid())
            .bind(user_auth.version - 1)
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("user_auths.update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: UserAuthId) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let now = Utc::now();
        let result = bounded(
            ctx,
            sqlx::query(
                "UPDATE user_auths SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
            )
            .bind(now)
            .bind(id.as_uuid())
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("user_auths.delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
