pub mod app_config;

pub use app_config::{parse_pool_hints, AppConfig, ConfigError};
