//! CLI command implementations

pub mod listen;
pub mod predict;
pub mod print_config;
pub mod routing;
pub mod search;

pub use listen::listen_command;
pub use predict::predict_command;
pub use print_config::print_config_command;
pub use routing::routing_command;
pub use search::search_command;
