pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;

pub use config::{AppConfig, LoggingConfig};
pub use observability::init_tracing_with_level;
