//! Configuration schema definitions.
//!
//! This module defines the configuration structure for a service built on
//! this crate. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::envelope::EnvelopeStyle;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub log: LogConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host part of the bind address.
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Time allowed to receive the request body, in seconds.
    pub read_timeout_secs: u64,

    /// Time allowed for the whole request/response cycle, in seconds.
    pub write_timeout_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Largest request body buffered by the request context.
    pub max_body_bytes: usize,

    /// Shape of the JSON response envelope.
    pub envelope: EnvelopeStyle,

    /// Cross-origin settings.
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            shutdown_timeout_secs: 5,
            max_body_bytes: 4 * 1024 * 1024,
            envelope: EnvelopeStyle::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Install the CORS layer.
    pub enable_cors: bool,

    /// Request headers allowed cross-origin.
    pub allowed_headers: Vec<String>,

    /// Methods allowed cross-origin.
    pub allowed_methods: Vec<String>,

    /// Allowed origins; `*` allows any.
    pub allowed_domains: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub cookies_allowed: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (e.g. `info` or `api_component=debug,tower_http=info`).
    pub level: String,

    /// Directory for log files. Empty logs to stdout only.
    pub dir: String,

    /// File rotation period.
    pub rotation: LogRotation,

    /// Rotated files to keep; 0 keeps all of them.
    pub max_files: usize,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: String::new(),
            rotation: LogRotation::Daily,
            max_files: 5,
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}
