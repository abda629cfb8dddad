use serde::Deserialize;

use crate::infra::config::{AppConfig, LogConfig, ReconnectConfig, ServerConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub server: Option<FileServerConfig>,
    pub reconnect: Option<FileReconnectConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(server) = self.server {
            server.merge_into(&mut config.server);
        }

        if let Some(reconnect) = self.reconnect {
            reconnect.merge_into(&mut config.reconnect);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileServerConfig {
    pub ws_url: Option<String>,
}

impl FileServerConfig {
    fn merge_into(self, config: &mut ServerConfig) {
        if let Some(ws_url) = self.ws_url {
            config.ws_url = ws_url;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileReconnectConfig {
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl FileReconnectConfig {
    fn merge_into(self, config: &mut ReconnectConfig) {
        if let Some(initial_delay_ms) = self.initial_delay_ms {
            config.initial_delay_ms = initial_delay_ms;
        }

        if let Some(max_delay_ms) = self.max_delay_ms {
            config.max_delay_ms = max_delay_ms;
        }
    }
}
