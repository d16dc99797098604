#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod client;
mod config;
mod error;
mod http;
mod parsing;
mod port;
mod url;

// ============================================================================
// Public API
// ============================================================================

// Client
pub use client::{DefaultRestClient, RestClient};

// Backend seam for custom transports
pub use http::{HttpBackend, ReqwestBackend};

// Configuration
pub use config::RestClientConfig;

// Errors
pub use error::{HttpError, HttpResult};

