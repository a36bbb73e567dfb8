//! Route definitions for the bridge.

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get
};
use metrics::histogram;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub const REQUEST_DURATION_METRIC: &str = "gitlab_crucible_bridge_request_duration_seconds";

/// Request duration buckets: exponential, start 0.1, factor 3, 4 buckets.
pub const REQUEST_DURATION_BUCKETS: [f64; 4] = [0.1, 0.3, 0.9, 2.7];

/// Creates the Axum router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::liveness).post(handlers::webhook))
        .route_layer(middleware::from_fn(track_request_duration))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_request_duration(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    histogram!(
        REQUEST_DURATION_METRIC,
        "code" => response.status().as_u16().to_string()
    )
    .record(start.elapsed().as_secs_f64());

    response
}
