//! Logging initialization for the ewma-probe harness
//!
//! All crates log through `tracing` macros; this crate installs the global
//! subscriber once, driven by [`probe_config::LoggingConfig`].

pub mod init;

pub use init::{build_env_filter, init_logging_from_config};
