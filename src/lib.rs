//! HTTP request wrapper and session store for a backend API.
//!
//! [`api::ApiClient`] configures a `reqwest` client with token injection,
//! duplicate-request cancellation and response envelope handling.
//! [`state::SessionStore`] holds the auth token and user info and persists
//! them through a pluggable [`state::StateStorage`] backend.

pub mod api;
pub mod config;
pub mod hooks;
pub mod state;

pub use api::{ApiClient, ApiError, RequestOptions, ResultCode, ResultData};
pub use config::ClientConfig;
pub use hooks::{Navigator, Notifier};
pub use state::{SessionStore, UserInfo};
