//! API routes.

pub mod consumers;
pub mod health;
pub mod usage;

use axum::{
    routing::{get, patch},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/consumers",
            get(consumers::list_consumers).post(consumers::create_consumer),
        )
        .route(
            "/api/consumers/:consumer_name",
            patch(consumers::update_consumer).delete(consumers::delete_consumer),
        )
        .route("/api/usage", get(usage::usage_handler))
        .route("/api/model-usage", get(usage::model_usage_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
