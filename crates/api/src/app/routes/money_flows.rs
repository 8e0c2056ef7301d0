use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use cashnote_core::FlowId;
use cashnote_infra::OpContext;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_flows).post(create_flow))
        .route("/summary", get(summary))
        .route("/:id", get(get_flow).patch(update_flow).delete(delete_flow))
}

pub async fn create_flow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<dto::CreateFlowRequest>,
) -> axum::response::Response {
    let ctx = OpContext::root();
    match services
        .money_flows
        .create(&ctx, user.user_id(), body.into())
        .await
    {
        Ok(flow) => dto::success(StatusCode::CREATED, "created", dto::FlowResponse::from(&flow)),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_flows(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<dto::PageQuery>,
) -> axum::response::Response {
    let ctx = OpContext::root();
    match services
        .money_flows
        .list(&ctx, user.user_id(), page.limit, page.offset)
        .await
    {
        Ok(flows) => {
            let items: Vec<_> = flows.iter().map(dto::FlowResponse::from).collect();
            dto::success(StatusCode::OK, "ok", serde_json::json!({ "items": items }))
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_flow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_flow_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let ctx = OpContext::root();
    match services.money_flows.get(&ctx, user.user_id(), id).await {
        Ok(flow) => dto::success(StatusCode::OK, "ok", dto::FlowResponse::from(&flow)),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_flow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateFlowRequest>,
) -> axum::response::Response {
    let id = match parse_flow_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let ctx = OpContext::root();
    match services
        .money_flows
        .update(&ctx, user.user_id(), id, body.into())
        .await
    {
        Ok(flow) => dto::success(StatusCode::OK, "updated", dto::FlowResponse::from(&flow)),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_flow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_flow_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let ctx = OpContext::root();
    match services.money_flows.delete(&ctx, user.user_id(), id).await {
        Ok(()) => dto::success(StatusCode::OK, "deleted", serde_json::json!({})),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<dto::SummaryQuery>,
) -> axum::response::Response {
    let ctx = OpContext::root();
    match services
        .money_flows
        .summary(&ctx, user.user_id(), query.category)
        .await
    {
        Ok(summary) => dto::success(StatusCode::OK, "ok", summary),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn parse_flow_id(raw: &str) -> Result<FlowId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid money-flow id")
    })
}
