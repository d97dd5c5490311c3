//! Driver construction and configuration

pub mod config;
pub mod graph_driver;
pub mod uri;

pub use config::{Config, ConfigBuilder};
pub use graph_driver::Driver;
pub use uri::BoltUri;
