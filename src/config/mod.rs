//! TOML configuration of the relay server.

mod error;
mod load;
mod types;

pub use error::ConfigError;
pub use load::{default_config_file, default_data_dir, load_config, LoadedConfig};
pub use types::{LoggingConfig, RelayConfig, ServerConfig, StoreConfig};

#[cfg(test)]
mod tests;
