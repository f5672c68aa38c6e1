//! Core types, normalization, and validation for the consumer console.

pub mod consumer;
pub mod error;
pub mod limits;
pub mod name;
pub mod usage;

pub use consumer::*;
pub use error::{Error, Result, ValidationErrorCode};
pub use limits::*;
pub use name::*;
pub use usage::*;
