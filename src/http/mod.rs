// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The HTTP API (SPEC_FULL.md §2 C8) — the concrete realization of
//! spec.md §4.7's intake contract, plus the registration/login/balance
//! routes spec.md §6 names but treats as external.

mod auth;
mod handlers;
mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the router. Gzip negotiation is handled by a `CompressionLayer`
/// wrapping the whole router (SPEC_FULL.md §1, §4.7).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/user/register", post(handlers::register))
        .route("/api/user/login", post(handlers::login))
        .route(
            "/api/user/orders",
            post(handlers::submit_order).get(handlers::list_orders),
        )
        .route("/api/user/balance", get(handlers::balance))
        .route(
            "/api/user/balance/withdraw",
            post(handlers::withdraw),
        )
        .route(
            "/api/user/balance/withdrawals",
            get(handlers::list_withdrawals),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
