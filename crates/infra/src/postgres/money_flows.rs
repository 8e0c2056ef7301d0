//! Postgres money-flow repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use cashnote_core::{FlowId, MoneyFlow, StoreError, StoreResult, UserId};

use crate::context::{OpContext, bounded};
use crate::repository::MoneyFlowRepository;

use super::{acquire, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgMoneyFlowRepository {
    pool: PgPool,
}

impl PgMoneyFlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MoneyFlowRow {
    id: Uuid,
    user_id: Uuid,
    category: Option<String>,
    amount: f64,
    currency: String,
    description: Option<String>,
    tags: Json<Vec<String>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<MoneyFlowRow> for MoneyFlow {
    fn from(row: MoneyFlowRow) -> Self {
        MoneyFlow {
            id: FlowId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            category: row.category,
            amount: row.amount,
            currency: row.currency,
            description: row.description,
            tags: row.tags.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, category, amount, currency, description, tags, \
                              version, created_at, updated_at, deleted_at";

#[async_trait]
impl MoneyFlowRepository for PgMoneyFlowRepository {
    #[instrument(skip(self, ctx, flow), fields(flow_id = %flow.id, user_id = %flow.user_id), err)]
    async fn create(&self, ctx: &OpContext, flow: &mut MoneyFlow) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: MoneyFlowRow = bounded(
            ctx,
            sqlx::query_as(
                r#"
                INSERT INTO money_flows
                    (id, user_id, category, amount, currency, description, tags, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING id, user_id, category, amount, currency, description, tags,
                          version, created_at, updated_at, deleted_at
                "#,
            )
            .bind(flow.id.as_uuid())
            .bind(flow.user_id.as_uuid())
            .bind(&flow.category)
            .bind(flow.amount)
            .bind(&flow.currency)
            .bind(&flow.description)
            .bind(Json(&flow.tags))
            .bind(flow.version)
            .bind(flow.created_at)
            .bind(flow.updated_at)
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.create", e))?;

        flow.id = FlowId::from_uuid(row.id);
        flow.created_at = row.created_at;
        flow.updated_at = row.updated_at;
        Ok(())
    }

    async fn find_by_id(&self, ctx: &OpContext, id: FlowId) -> StoreResult<MoneyFlow> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let row: Option<MoneyFlowRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM money_flows WHERE id = $1 AND deleted_at IS NULL"
            ))
            .bind(id.as_uuid())
            .fetch_optional(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.find_by_id", e))?;

        row.map(MoneyFlow::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_user(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MoneyFlow>> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let rows: Vec<MoneyFlowRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM money_flows
                WHERE user_id = $1 AND deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT $2 OFFSET $3
                "#
            ))
            .bind(user_id.as_uuid())
            .bind(limit)
            .bind(offset)
            .fetch_all(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.find_by_user", e))?;

        Ok(rows.into_iter().map(MoneyFlow::from).collect())
    }

    async fn find_by_user_and_date_range(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<MoneyFlow>> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let rows: Vec<MoneyFlowRow> = bounded(
            ctx,
            sqlx::query_as(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM money_flows
                WHERE user_id = $1 AND created_at BETWEEN $2 AND $3 AND deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                "#
            ))
            .bind(user_id.as_uuid())
            .bind(start)
            .bind(end)
            .fetch_all(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.find_by_user_and_date_range", e))?;

        Ok(rows.into_iter().map(MoneyFlow::from).collect())
    }

    #[instrument(skip(self, ctx, flow), fields(flow_id = %flow.id, version = flow.version), err)]
    async fn update(&self, ctx: &OpContext, flow: &MoneyFlow) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let result = bounded(
            ctx,
            sqlx::query(
                r#"
                UPDATE money_flows
                SET category = $1, amount = $2, currency = $3, description = $4,
                    tags = $5, version = $6, updated_at = $7
                WHERE id = $8 AND version = $9 AND deleted_at IS NULL
                "#,
            )
            .bind(&flow.category)
            .bind(flow.amount)
            .bind(&flow.currency)
            .bind(&flow.description)
            .bind(Json(&flow.tags))
            .bind(flow.version)
            .bind(flow.updated_at)
            .bind(flow.id.as_uuid())
            .bind(flow.version - 1)
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, id: FlowId) -> StoreResult<()> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let now = Utc::now();
        let result = bounded(
            ctx,
            sqlx::query(
                "UPDATE money_flows SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
            )
            .bind(now)
            .bind(id.as_uuid())
            .execute(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn total_by_user(&self, ctx: &OpContext, user_id: UserId) -> StoreResult<f64> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let total: f64 = bounded(
            ctx,
            sqlx::query_scalar(
                "SELECT COALESCE(SUM(amount), 0) FROM money_flows WHERE user_id = $1 AND deleted_at IS NULL",
            )
            .bind(user_id.as_uuid())
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.total_by_user", e))?;

        Ok(total)
    }

    async fn total_by_user_and_category(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        category: &str,
    ) -> StoreResult<f64> {
        let mut conn = acquire(ctx, &self.pool).await?;
        let total: f64 = bounded(
            ctx,
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(amount), 0) FROM money_flows
                WHERE user_id = $1 AND category = $2 AND deleted_at IS NULL
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(category)
            .fetch_one(conn.executor()?),
        )
        .await?
        .map_err(|e| map_sqlx_error("money_flows.total_by_user_and_category", e))?;

        Ok(total)
    }
}
