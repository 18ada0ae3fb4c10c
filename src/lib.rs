pub mod config;
pub mod monitoring;
pub mod shutdown;
pub mod utils;
