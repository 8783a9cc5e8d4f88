//! Minimal request builder with Zoho OAuth header injection.

pub mod client;
pub mod request;

pub use client::{build_client, shared_client, DEFAULT_TIMEOUT};
pub use request::{ApiResponse, HttpMethod, NetworkRequest, DEFAULT_API_BASE_URL};
