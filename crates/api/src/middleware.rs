use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use cashnote_auth::JwtManager;

use crate::app::errors::json_error;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtManager>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(response) => return response,
    };

    let claims = match state.jwt.validate(token) {
        Ok(claims) => claims,
        Err(err) => {
            return json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string());
        }
    };

    req.extensions_mut()
        .insert(CurrentUser::new(claims.sub, claims.email));

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthorized =
        || json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthorized)?;

    let header = header.to_str().map_err(|_| unauthorized())?;

    let token = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?.trim();
    if token.is_empty() {
        return Err(unauthorized());
    }

    Ok(token)
}
