//! API client module.
//!
//! Provides the HTTP client with token header injection, duplicate-request
//! cancellation, response envelope classification and status mapping.

pub mod cancel;
pub mod client;
pub mod error;
pub mod status;
pub mod types;
#[cfg(test)]
mod tests;

pub use client::{ApiClient, ApiClientBuilder, RequestOptions};
pub use error::ApiError;
pub use types::{ResultCode, ResultData};
