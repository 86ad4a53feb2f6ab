//! Server configuration.
//!
//! Configuration comes from three layers, highest priority first: a YAML file
//! (when `--config` is given), environment variables (including a `.env` file
//! loaded in `main`), and built-in defaults.
//!
//! # Example
//! ```rust,no_run
//! use voice_relay::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use crate::core::dialog::DialogConfig;

mod yaml;

/// Default client-idle timeout before the relay closes a session.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Security settings
    /// `*`, a comma-separated origin list, or unset for same-origin only.
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,

    // Relay limits
    pub idle_timeout_secs: u64,
    pub max_call_duration_ms: u64,
    pub max_concurrent_calls: u32,

    // Dialogue service settings
    pub dialog: DialogConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid(
                    "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
                ));
            }
        };

        let dialog = DialogConfig {
            url: env_var("DIALOG_WS_URL")
                .unwrap_or_else(|| DialogConfig::default().url),
            app_id: env_var("DIALOG_APP_ID").unwrap_or_default(),
            access_key: env_var("DIALOG_ACCESS_KEY").unwrap_or_default(),
            resource_id: env_var("DIALOG_RESOURCE_ID")
                .unwrap_or_else(|| DialogConfig::default().resource_id),
            app_key: env_var("DIALOG_APP_KEY").unwrap_or_default(),
            bot_name: env_var("DIALOG_BOT_NAME")
                .unwrap_or_else(|| DialogConfig::default().bot_name),
            output_sample_rate: env_parse(
                "DIALOG_OUTPUT_SAMPLE_RATE",
                DialogConfig::default().output_sample_rate,
            ),
            handshake_delay_ms: env_parse(
                "DIALOG_HANDSHAKE_DELAY_MS",
                DialogConfig::default().handshake_delay_ms,
            ),
            teardown_step_delay_ms: env_parse(
                "DIALOG_TEARDOWN_STEP_DELAY_MS",
                DialogConfig::default().teardown_step_delay_ms,
            ),
            connect_timeout_secs: env_parse(
                "DIALOG_CONNECT_TIMEOUT_SECS",
                DialogConfig::default().connect_timeout_secs,
            ),
        };

        let config = Self {
            host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            tls,
            cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: env_parse("RATE_LIMIT_RPS", 100),
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST", 50),
            idle_timeout_secs: env_parse("IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS),
            max_call_duration_ms: env_parse("MAX_CALL_DURATION_MS", 300_000),
            max_concurrent_calls: env_parse("MAX_CONCURRENT_CALLS", 64),
            dialog,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables
    /// filling anything the file leaves unset.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        let file = yaml::load(path)?;

        if let Some(host) = file.server.host {
            config.host = host;
        }
        if let Some(port) = file.server.port {
            config.port = port;
        }
        match (file.server.tls_cert_path, file.server.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                config.tls = Some(TlsConfig {
                    cert_path,
                    key_path,
                });
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "tls_cert_path and tls_key_path must be set together".to_string(),
                ));
            }
        }

        if let Some(origins) = file.security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = file.security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = file.security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }

        if let Some(idle) = file.limits.idle_timeout_secs {
            config.idle_timeout_secs = idle;
        }
        if let Some(max_duration) = file.limits.max_call_duration_ms {
            config.max_call_duration_ms = max_duration;
        }
        if let Some(max_calls) = file.limits.max_concurrent_calls {
            config.max_concurrent_calls = max_calls;
        }

        if let Some(dialog) = file.dialog {
            config.dialog = dialog;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether the dialogue service credentials are present. The relay still
    /// starts without them (useful against local mock services), but the
    /// capabilities endpoint reports voice calls as unavailable.
    pub fn dialog_configured(&self) -> bool {
        !self.dialog.app_id.is_empty() && !self.dialog.access_key.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.rate_limit_burst_size == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_burst_size must be at least 1".to_string(),
            ));
        }
        if self.dialog.url.is_empty() {
            return Err(ConfigError::Invalid(
                "dialogue service url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Parse an environment variable, falling back to the default (with a
/// warning) when the value does not parse.
fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env_var(key) {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("ignoring unparseable {key}={value}");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_format() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tls: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 100,
            rate_limit_burst_size: 50,
            idle_timeout_secs: 300,
            max_call_duration_ms: 300_000,
            max_concurrent_calls: 64,
            dialog: DialogConfig::default(),
        };
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert!(!config.is_tls_enabled());
        assert!(!config.dialog_configured());
    }

    #[test]
    fn test_validate_rejects_zero_burst() {
        let mut config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 100,
            rate_limit_burst_size: 0,
            idle_timeout_secs: 300,
            max_call_duration_ms: 300_000,
            max_concurrent_calls: 64,
            dialog: DialogConfig::default(),
        };
        assert!(config.validate().is_err());
        config.rate_limit_burst_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dialog_configured_requires_credentials() {
        let mut dialog = DialogConfig::default();
        dialog.app_id = "app".to_string();
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 100,
            rate_limit_burst_size: 50,
            idle_timeout_secs: 300,
            max_call_duration_ms: 300_000,
            max_concurrent_calls: 64,
            dialog,
        };
        // Access key still missing.
        assert!(!config.dialog_configured());
    }
}
