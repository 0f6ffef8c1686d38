// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use doppel_config::model::GatewayConfig;
use doppel_core::DoppelError;
use doppel_orchestrator::Orchestrator;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub auth: AuthConfig,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>, bearer_token: Option<String>) -> Self {
        Self {
            orchestrator,
            auth: AuthConfig::new(bearer_token),
            started_at: Instant::now(),
        }
    }
}

/// Builds the gateway router.
///
/// - `GET /health` (public)
/// - `GET /v1/status`
/// - `POST /v1/channels/{channel}/messages`
/// - `POST /v1/channels/{channel}/samples`
/// - `GET /v1/channels/{channel}/profile`
/// - `GET /v1/review`
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/status", get(handlers::get_status))
        .route(
            "/v1/channels/{channel}/messages",
            post(handlers::post_message),
        )
        .route("/v1/channels/{channel}/samples", post(handlers::post_sample))
        .route("/v1/channels/{channel}/profile", get(handlers::get_profile))
        .route("/v1/review", get(handlers::get_review))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), DoppelError> {
    if state.auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set; every /v1 request will be refused");
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DoppelError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| DoppelError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
