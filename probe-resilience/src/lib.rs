//! Resilience patterns for the ewma-probe harness
//!
//! Bounded retry with pluggable backoff. The readiness gate polls the
//! balancer through [`RetryExecutor`] with a fixed interval and a deadline.

pub mod backoff;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
