//! Upstream gateway client for consumer and API key resources.

pub mod client;
pub mod config;
pub mod health;

pub use client::*;
pub use config::*;
