use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{ConfigError, RelayConfig};

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: RelayConfig,
    pub path: PathBuf,
    pub config_exists: bool,
}

/// Loads the config from `path_override`, or from the default location.
///
/// A missing file yields the default config.
pub fn load_config(path_override: Option<PathBuf>) -> Result<LoadedConfig, ConfigError> {
    let path = match path_override {
        Some(path) => path,
        None => default_config_file()?,
    };
    let (config, config_exists) = read_config(&path)?;
    Ok(LoadedConfig {
        config,
        path,
        config_exists,
    })
}

fn read_config(path: &Path) -> Result<(RelayConfig, bool), ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok((toml::from_str(&contents)?, true)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no config at {}, using defaults", path.display());
            Ok((RelayConfig::default(), false))
        }
        Err(err) => Err(ConfigError::Io(err)),
    }
}

pub fn default_config_file() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
    Ok(home.join(".config").join("llm-relay").join("config.toml"))
}

pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
    Ok(home.join(".local").join("share").join("llm-relay"))
}
