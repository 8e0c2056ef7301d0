//! Money-flow CRUD and summary orchestration, scoped to the caller.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use cashnote_core::{FlowId, MoneyFlow, StoreError, UserId, Versioned};
use cashnote_infra::{MoneyFlowRepository, OpContext};

use crate::services::error::ServiceError;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Fields accepted when creating a flow.
#[derive(Debug, Clone)]
pub struct NewFlow {
    pub amount: f64,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Partial update; absent fields keep their stored value. `version` is the
/// version the client read; omitting it updates against the current one.
#[derive(Debug, Clone, Default)]
pub struct FlowPatch {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowSummary {
    pub total: f64,
    pub category: Option<String>,
}

/// Money-flow operations for one authenticated user.
///
/// Ownership checks collapse "someone else's record" into `NotFound` so
/// ids cannot be enumerated across accounts.
pub struct MoneyFlowService {
    flows: Arc<dyn MoneyFlowRepository>,
}

impl MoneyFlowService {
    pub fn new(flows: Arc<dyn MoneyFlowRepository>) -> Self {
        Self { flows }
    }

    #[instrument(skip(self, ctx, input), fields(user_id = %user_id), err)]
    pub async fn create(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        input: NewFlow,
    ) -> Result<MoneyFlow, ServiceError> {
        let mut flow = MoneyFlow::new(user_id, input.amount, input.currency.unwrap_or_default())?;
        if let Some(category) = input.category {
            flow.set_category(category);
        }
        if let Some(description) = input.description {
            flow.set_description(description);
        }
        if let Some(tags) = input.tags {
            flow.set_tags(tags);
        }

        self.flows.create(ctx, &mut flow).await?;
        Ok(flow)
    }

    pub async fn get(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        id: FlowId,
    ) -> Result<MoneyFlow, ServiceError> {
        let flow = self.flows.find_by_id(ctx, id).await?;
        owned_by(&flow, user_id)?;
        Ok(flow)
    }

    pub async fn list(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<MoneyFlow>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        Ok(self.flows.find_by_user(ctx, user_id, limit, offset).await?)
    }

    #[instrument(skip(self, ctx, patch), fields(user_id = %user_id, flow_id = %id), err)]
    pub async fn update(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        id: FlowId,
        patch: FlowPatch,
    ) -> Result<MoneyFlow, ServiceError> {
        let mut flow = self.flows.find_by_id(ctx, id).await?;
        owned_by(&flow, user_id)?;

        // The client's version becomes the gate: if someone wrote in
        // between, the conditional update below matches zero rows.
        if let Some(version) = patch.version {
            flow.version = version;
        }

        if let Some(amount) = patch.amount {
            flow.set_amount(amount)?;
        }
        if let Some(category) = patch.category {
            flow.set_category(category);
        }
        if let Some(description) = patch.description {
            flow.set_description(description);
        }
        if let Some(tags) = patch.tags {
            flow.set_tags(tags);
        }

        flow.touch();
        self.flows.update(ctx, &flow).await?;
        Ok(flow)
    }

    #[instrument(skip(self, ctx), fields(user_id = %user_id, flow_id = %id), err)]
    pub async fn delete(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        id: FlowId,
    ) -> Result<(), ServiceError> {
        let flow = self.flows.find_by_id(ctx, id).await?;
        owned_by(&flow, user_id)?;
        Ok(self.flows.delete(ctx, id).await?)
    }

    pub async fn summary(
        &self,
        ctx: &OpContext,
        user_id: UserId,
        category: Option<String>,
    ) -> Result<FlowSummary, ServiceError> {
        let total = match &category {
            Some(cat) => {
                self.flows
                    .total_by_user_and_category(ctx, user_id, cat)
                    .await?
            }
            None => self.flows.total_by_user(ctx, user_id).await?,
        };
        Ok(FlowSummary { total, category })
    }
}

fn owned_by(flow: &MoneyFlow, user_id: UserId) -> Result<(), ServiceError> {
    if flow.user_id != user_id {
        return Err(StoreError::NotFound.into());
    }
    Ok(())
}

impl core::fmt::Debug for MoneyFlowService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("MoneyFlowService")
    }
}
