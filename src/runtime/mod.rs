//! Runtime configuration for the mongolap binary

pub mod config;
pub mod loader;

pub use self::config::{AppConfig, DemoConfig};
pub use loader::load_config;
