//! Postgres user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use cashnote_core::{StoreError, StoreResult, User, UserId};

use crate::context::{OpContext, bounded};
use crate::repository::UserRepository;

use super::{acquire, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    phone_number: String,
    image: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            full_name: row.full_name,
            phone_number: row.phone_number,
            image: row.image,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, full_name, phone_number, image, version, created_at, updated_at, deleted_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, ctx, user), fields(user_id = %user.id), err)]
    async fn create(&self, ctx: &OpContext, user: &mut User) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: UserRow = bounded(
            ctx,
            sqlx::query_as(
                r#"
                INSERT INTO users (id, full_name, phone_number, image, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, full_name, phone_number, image, version, created_at, updated_at, deleted_at
                "#,
            )
            .bind(user.id.as_uuid())
            .bind(&user.full_name)
            .bind(&user.phone_number)
            .bind(&user.image)
            .bind(user.version)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.create", e))?;

        user.id = UserId::from_uuid(row.id);
        user.created_at = row.created_at;
        user.updated_at = row.updated_at;
        Ok(())
    }

    async fn find_by_id(&self, ctx: &OpContext, id: UserId) -> StoreResult<User> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<UserRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
            ))
            .bind(id.as_uuid())
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.find_by_id", e))?;

        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_phone_number(
        &self,
        ctx: &OpContext,
        phone_number: &str,
    ) -> StoreResult<User> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<UserRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM users WHERE phone_number = $1 AND deleted_at IS NULL"
            ))
            .bind(phone_number)
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.find_by_phone_number", e))?;

        row.map(User::from).ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, ctx, user), fields(user_id = %user.id, version = user.version), err)]
    async fn update(&self, ctx: &OpContext, user: &User) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let result = bounded(
            ctx,
            sqlx::query(
                r#"
                UPDATE users
                SET full_name = $1, phone_number = $2, image = $3, version = $4, updated_at = $5
                WHERE id = $6 AND version = $7 AND deleted_at IS NULL
                "#,
            )
            .bind(&user.full_name)
            .bind(&user.phone_number)
            .bind(&user.image)
            .bind(user.version)
            .bind(user.updated_at)
            .bind(user.id.as_uuid())
            .bind(user.version - 1)
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: UserId) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let now = Utc::now();
        let result = bounded(
            ctx,
            sqlx::query(
                "UPDATE users SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
            )
            .bind(now)
            .bind(id.as_uuid())
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, ctx: &OpContext, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let rows: Vec<UserRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM users
                WHERE deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT $1 OFFSET $2
                "#
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("users.list", e))?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}
