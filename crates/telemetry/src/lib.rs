//! Internal telemetry for the consumer console: tracing setup, upstream
//! health, and in-process metrics.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
