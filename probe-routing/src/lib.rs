//! Routing verification for an EWMA load balancer
//!
//! Starts a fast and a slow ephemeral backend, registers them with service
//! discovery, sends a fixed number of sequential probes through the balancer
//! and attributes each probe to a backend by reading the balancer's debug
//! counters. The observed share of the slow backend is compared against the
//! EWMA prediction and a configurable threshold.

pub mod backend;
pub mod errors;
pub mod harness;
pub mod predictor;
pub mod readiness;
pub mod registrar;
pub mod report;
pub mod sampler;
pub mod telemetry;

pub use backend::{EphemeralBackend, PING_PATH};
pub use errors::RoutingError;
pub use harness::RoutingHarness;
pub use predictor::{ewma_weight, predict_ratios, WeightPrediction};
pub use readiness::wait_until_ready;
pub use registrar::{HealthCheck, ServiceRegistrar, ServiceRegistration};
pub use report::{RoutingReport, Verdict};
pub use sampler::{RoutingSampler, RoutingTally};
pub use telemetry::{attribute, DebugSnapshot, InstanceMap, InstanceTelemetry, TelemetryClient};

pub use probe_config::{BackendClass, BackendConfig};
