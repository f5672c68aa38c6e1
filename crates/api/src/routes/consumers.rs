//! Consumer management endpoints.
//!
//! Each handler normalizes the loosely-typed console body, forwards it to the
//! gateway, and relays the outcome. Upstream rejections keep their status.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use console_core::{
    normalize_name, Consumer, ConsumerList, CreateConsumerRequest, CreatedConsumer,
    DeleteResponse, UpdateConsumerRequest,
};
use serde::de::DeserializeOwned;
use telemetry::metrics;
use tracing::{debug, info};

use crate::response::ApiError;
use crate::state::AppState;

/// Parse a JSON body. An empty body parses as `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        ApiError::bad_request(format!("Invalid request body: {e}"))
    })
}

/// GET /api/consumers
pub async fn list_consumers(
    State(state): State<AppState>,
) -> Result<Json<ConsumerList>, ApiError> {
    let list = state.gateway.list_consumers().await?;
    metrics().consumers_listed.inc();
    Ok(Json(list))
}

/// POST /api/consumers
pub async fn create_consumer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreatedConsumer>, ApiError> {
    let request: CreateConsumerRequest = parse_body(&body)?;
    let new_consumer = request.into_upstream()?;

    let created = state.gateway.create_consumer(&new_consumer).await?;
    metrics().consumers_created.inc();

    info!(
        name = %created.consumer.name,
        key_issued = created.api_key.is_some(),
        "Consumer created"
    );
    Ok(Json(created))
}

/// PATCH /api/consumers/:consumer_name
///
/// The path carries the consumer's name, not its id. A name in the body wins
/// and becomes both the upstream path segment and the patch's `name`.
pub async fn update_consumer(
    State(state): State<AppState>,
    Path(consumer_name): Path<String>,
    body: Bytes,
) -> Result<Json<Consumer>, ApiError> {
    let request: UpdateConsumerRequest = parse_body(&body)?;
    let patch = request.into_upstream(&consumer_name)?;

    let updated = state.gateway.update_consumer(&patch).await?;
    metrics().consumers_updated.inc();

    info!(name = %patch.name, "Consumer updated");
    Ok(Json(updated))
}

/// DELETE /api/consumers/:consumer_name
pub async fn delete_consumer(
    State(state): State<AppState>,
    Path(consumer_name): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let name = normalize_name(&consumer_name);
    state.gateway.delete_consumer(&name).await?;
    metrics().consumers_deleted.inc();

    info!(name = %name, "Consumer deleted");
    Ok(Json(DeleteResponse::deleted(&name)))
}
