pub mod data;
pub mod defaults;
pub mod io;

pub use data::{Config, LifespanConfig, TransportConfig};
pub use io::ConfigError;
