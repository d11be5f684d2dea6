use crate::core::config::data::{Config, LifespanConfig, TransportConfig};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SSE_PATH: &str = "/sse";
pub const DEFAULT_MESSAGES_PATH: &str = "/messages/";
pub const DEFAULT_MCP_PATH: &str = "/mcp";
pub const DEFAULT_CREDENTIAL_HEADER: &str = "x-auth-data";
pub const HEALTH_PATH: &str = "/healthz";

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_filter: None,
            transport: TransportConfig::default(),
            lifespan: LifespanConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sse_path: DEFAULT_SSE_PATH.to_string(),
            messages_path: DEFAULT_MESSAGES_PATH.to_string(),
            mcp_path: DEFAULT_MCP_PATH.to_string(),
            json_response: false,
            credential_header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            keep_alive_secs: 15,
            session_queue_depth: 32,
        }
    }
}

impl Default for LifespanConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks invariants serde cannot express. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let transport = &self.transport;
        let paths = [
            ("sse_path", &transport.sse_path),
            ("messages_path", &transport.messages_path),
            ("mcp_path", &transport.mcp_path),
        ];
        for (key, path) in paths {
            if !path.starts_with('/') {
                return Err(format!("transport.{key} must start with '/': {path}"));
            }
            if path.as_str() == HEALTH_PATH {
                return Err(format!("transport.{key} collides with the health check: {path}"));
            }
        }
        for (index, (key, path)) in paths.iter().enumerate() {
            if let Some((other, _)) = paths.iter().skip(index + 1).find(|(_, p)| p == path) {
                return Err(format!(
                    "transport.{key} and transport.{other} must differ: {path}"
                ));
            }
        }
        if transport.credential_header.trim().is_empty() {
            return Err("transport.credential_header must not be empty".to_string());
        }
        if axum::http::HeaderName::from_bytes(transport.credential_header.as_bytes()).is_err() {
            return Err(format!(
                "transport.credential_header is not a valid header name: {}",
                transport.credential_header
            ));
        }
        if transport.session_queue_depth == 0 {
            return Err("transport.session_queue_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

impl TransportConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

impl LifespanConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
