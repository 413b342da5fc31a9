//! HTTP client plumbing for the ewma-probe harness
//!
//! One pooled `reqwest::Client` per harness run, with JSON helpers and
//! per-request timeout overrides for probes that must not stall a loop.

pub mod client;
pub mod config;
pub mod errors;

pub use client::{HttpManager, PlainResponse};
pub use config::HttpConfig;
pub use errors::HttpError;
