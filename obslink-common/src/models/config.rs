// File: src/models/config.rs

use serde::{Deserialize, Serialize};

/// Connection settings supplied by the host runtime's config surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4455,
            password: None,
        }
    }
}

impl ModuleConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}
