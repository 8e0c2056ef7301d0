//! Request/response DTOs and the response envelope.
//!
//! Every response body is wrapped as `{status, message, data}` on success
//! and `{status, message, errors: {code}}` on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cashnote_core::{FlowId, MoneyFlow, User, UserId};

use crate::services::{FlowPatch, NewFlow, TokenPair};

pub fn success(status: StatusCode, message: &str, data: impl Serialize) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": status.as_u16(),
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub full_name: String,
    pub phone_number: String,
    pub image: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            phone_number: user.phone_number.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserInfo,
}

impl AuthResponse {
    pub fn new(user: &User, tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer",
            expires_in: tokens.expires_in,
            user: user.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFlowRequest {
    pub amount: f64,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl From<CreateFlowRequest> for NewFlow {
    fn from(req: CreateFlowRequest) -> Self {
        Self {
            amount: req.amount,
            currency: req.currency,
            category: req.category,
            description: req.description,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFlowRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub version: Option<i32>,
}

impl From<UpdateFlowRequest> for FlowPatch {
    fn from(req: UpdateFlowRequest) -> Self {
        Self {
            amount: req.amount,
            category: req.category,
            description: req.description,
            tags: req.tags,
            version: req.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub id: FlowId,
    pub user_id: UserId,
    pub category: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MoneyFlow> for FlowResponse {
    fn from(flow: &MoneyFlow) -> Self {
        Self {
            id: flow.id,
            user_id: flow.user_id,
            category: flow.category.clone(),
            amount: flow.amount,
            currency: flow.currency.clone(),
            description: flow.description.clone(),
            tags: flow.tags.clone(),
            version: flow.version,
            created_at: flow.created_at,
            updated_at: flow.updated_at,
        }
    }
}
