// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Served directories and listing/upload limits
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Directory whose contents are listed and downloaded
    pub root: String,
    /// Directory holding the `/css/`, `/js/` and `/images/` page assets
    pub assets_dir: String,
    /// Entries per listing page
    pub page_size: usize,
    /// Largest accepted upload in bytes
    pub upload_limit: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds an idle keep-alive connection is held; 0 disables keep-alive
    pub keep_alive_timeout: u64,
    /// Seconds allowed to receive request headers
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
}
