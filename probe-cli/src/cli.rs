//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify that the balancer steers traffic away from a slow backend
    Routing {
        /// Number of probes to send (overrides configuration)
        #[arg(long, value_name = "N")]
        requests: Option<u32>,

        /// Maximum tolerated slow share, 0.0 to 1.0 (overrides configuration)
        #[arg(long, value_name = "RATIO")]
        threshold: Option<f64>,
    },

    /// Print the traffic split an EWMA balancer is expected to produce
    Predict {
        /// Fast backend latency in milliseconds
        #[arg(long, value_name = "MS")]
        fast_latency_ms: Option<f64>,

        /// Slow backend latency in milliseconds
        #[arg(long, value_name = "MS")]
        slow_latency_ms: Option<f64>,
    },

    /// Start the webhook receiver and wait for one delivery
    Listen {
        /// Port to listen on (overrides configuration, 0 picks a free port)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Correlation key to wait for
        #[arg(long, value_name = "KEY", default_value = "last")]
        key: String,

        /// How long to wait before giving up
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Submit an asynchronous search and wait for its webhook delivery
    Search {
        /// Search criteria (example: --criteria-json='{"name":"Ada"}')
        #[arg(long, value_name = "JSON")]
        criteria_json: String,

        /// How long to wait for the delivery
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Print the effective configuration as YAML
    PrintConfig,
}
