//! Shared harness for the console's integration tests.

pub mod fixtures;
pub mod mocks;
