//! Application configuration
//!
//! Layered with the `config` crate: defaults, then an optional TOML file,
//! then `DMS__`-prefixed environment variables
//! (e.g. `DMS__DMS__EAR_THRESHOLD=0.22`, `DMS__SERVER__BIND=127.0.0.1:9000`).

use alerting::AlertConfig;
use camera_capture::CameraConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Config file looked up when no path is given (any supported extension)
pub const DEFAULT_CONFIG_FILE: &str = "drowsiness-monitor";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Encoded frames buffered per streaming client before it starts skipping
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            stream_buffer: 4,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub dms: DmsConfig,
    pub audio: AlertConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&str>) -> Result<Self, ServerError> {
        let file = ::config::File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE))
            .required(path.is_some());

        let config: AppConfig = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix("DMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.dms.validate()?;
        Ok(config)
    }
}
