use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    memory::{ConversationStore, InMemoryStore, JsonlStore, StoreKind},
    stream::EmitterConfig,
};

use super::{load::default_data_dir, ConfigError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub emitter: EmitterConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// `host:port`, suitable for binding a listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory of the JSONL store; defaults to the user data directory
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Builds the conversation store this section describes.
    pub fn build(&self) -> Result<Arc<dyn ConversationStore>, ConfigError> {
        match self.kind {
            StoreKind::Memory => Ok(Arc::new(InMemoryStore::new())),
            StoreKind::Jsonl => {
                let dir = match &self.dir {
                    Some(dir) => dir.clone(),
                    None => default_data_dir()?.join("conversations"),
                };
                log::info!("storing conversations in {}", dir.display());
                Ok(Arc::new(JsonlStore::new(dir)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
