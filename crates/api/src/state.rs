//! Application state shared across handlers.

use gateway_client::ConsumerGateway;
use metering_client::UsageMeter;
use std::sync::Arc;

/// Shared application state.
///
/// Handlers hold no state of their own; every request is an independent
/// transform-and-forward against these two upstreams.
#[derive(Clone)]
pub struct AppState {
    /// Consumer gateway (reqwest client in production, mock in tests)
    pub gateway: Arc<dyn ConsumerGateway>,
    /// Metering API
    pub metering: Arc<dyn UsageMeter>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ConsumerGateway>, metering: Arc<dyn UsageMeter>) -> Self {
        Self { gateway, metering }
    }
}
