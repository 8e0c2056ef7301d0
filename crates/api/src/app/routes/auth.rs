use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};

use cashnote_infra::OpContext;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let ctx = OpContext::root();
    match services
        .auth
        .register(&ctx, &body.full_name, &body.email, &body.phone_number, &body.password)
        .await
    {
        Ok((user, tokens)) => dto::success(
            StatusCode::CREATED,
            "registered",
            dto::AuthResponse::new(&user, tokens),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let ctx = OpContext::root();
    match services.auth.login(&ctx, &body.email, &body.password).await {
        Ok((user, tokens)) => dto::success(
            StatusCode::OK,
            "logged in",
            dto::AuthResponse::new(&user, tokens),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
