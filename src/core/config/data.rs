use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level gateway configuration, read from `config.toml`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Interface to bind, e.g. "127.0.0.1" or "0.0.0.0"
    pub host: String,
    pub port: u16,
    /// `tracing` filter directive used when RUST_LOG is unset
    pub log_filter: Option<String>,
    pub transport: TransportConfig,
    pub lifespan: LifespanConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Path accepting the long-lived event-stream connection
    pub sse_path: String,
    /// Path accepting side-channel call submissions for an open event stream
    pub messages_path: String,
    /// Path accepting self-contained stateless calls
    pub mcp_path: String,
    /// Stateless responses as one buffered JSON body instead of an event stream
    pub json_response: bool,
    /// Header carrying the base64-encoded JSON credential object
    pub credential_header: String,
    pub keep_alive_secs: u64,
    /// Calls an event-stream session may queue before submissions wait
    pub session_queue_depth: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LifespanConfig {
    /// Upper bound on how long shutdown waits for in-flight calls
    pub shutdown_grace_secs: u64,
    /// Request timeout for the shared outbound HTTP client
    pub http_timeout_secs: u64,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
