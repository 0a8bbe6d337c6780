// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, FilesConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Environment variable prefix, e.g. `FILESERVER_SERVER__PORT=9000`
const ENV_PREFIX: &str = "FILESERVER";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; environment variables override it and built-in
    /// defaults fill whatever is left.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("files.root", ".")?
            .set_default("files.assets_dir", "static")?
            .set_default("files.page_size", 10)?
            .set_default("files.upload_limit", 1_073_741_824)? // 1GB
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Apply a `host:port` override from the command line
    pub fn set_listen(&mut self, listen: &str) -> Result<(), String> {
        let addr: SocketAddr = listen
            .parse()
            .map_err(|e| format!("Invalid listen address '{listen}': {e}"))?;
        self.server.host = addr.ip().to_string();
        self.server.port = addr.port();
        Ok(())
    }
}
