//! HTTP proxy layer for the consumer console.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
