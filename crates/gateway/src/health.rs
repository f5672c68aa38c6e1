//! Gateway health checks.

use crate::client::GatewayClient;
use tracing::{debug, error, warn};

/// Probe the gateway with a one-item consumer list.
pub async fn check_connection(client: &GatewayClient) -> bool {
    if !client.config().is_configured() {
        warn!("Gateway API key not configured, skipping probe");
        return false;
    }

    match client.list_page(1, 0).await {
        Ok(list) => {
            debug!(sampled = list.data.len(), "Gateway connection healthy");
            true
        }
        Err(e) => {
            error!("Gateway health check failed: {}", e);
            false
        }
    }
}
