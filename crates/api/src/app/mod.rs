//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (store backend, unit-of-work, services)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and the response envelope
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use cashnote_auth::JwtManager;

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    let jwt = JwtManager::new(
        &config.jwt_secret,
        config.access_token_ttl,
        config.refresh_token_ttl,
    );
    let auth_state = middleware::AuthState {
        jwt: Arc::new(jwt.clone()),
    };

    let services = Arc::new(services::build_services(config, jwt).await?);

    let authentications = routes::auth::router().layer(Extension(services.clone()));

    // Money-flow routes require a valid bearer token.
    let money_flows = routes::money_flows::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1/authentications", authentications)
        .nest("/api/v1/money-flows", money_flows))
}
