//! Typed client for the console API with a stale-while-revalidate query cache.

pub mod api;
pub mod cache;
pub mod error;
mod retry;
pub mod store;

pub use api::{ConsoleApi, HttpConsoleApi};
pub use cache::{CachePolicy, CachedData, QueryKey};
pub use error::{ClientError, Result};
pub use store::{ConsoleStore, ConsumerForm};
