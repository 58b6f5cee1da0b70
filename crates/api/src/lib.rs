//! Boundary to the remote lessons and judge service.

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::{AttemptRecord, LearnApi};
pub use error::ApiError;
pub use http::{DEFAULT_API_BASE, HttpApi};
pub use memory::InMemoryApi;
