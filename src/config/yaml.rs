//! YAML configuration file loading.
//!
//! Optional file-based configuration. Every field is optional; anything not
//! set in the file falls back to the environment-derived value.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ConfigError;
use crate::core::dialog::DialogConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlConfig {
    pub server: YamlServer,
    pub security: YamlSecurity,
    pub limits: YamlLimits,
    /// Dialogue service section. When present it replaces the
    /// environment-derived dialog configuration wholesale; unset fields take
    /// the dialog defaults.
    pub dialog: Option<DialogConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlServer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlSecurity {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YamlLimits {
    pub idle_timeout_secs: Option<u64>,
    pub max_call_duration_ms: Option<u64>,
    pub max_concurrent_calls: Option<u32>,
}

/// Load and parse a YAML configuration file.
pub fn load(path: &Path) -> Result<YamlConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_parses() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.host.is_none());
        assert!(config.dialog.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: YamlConfig = serde_yaml::from_str(
            r#"
server:
  port: 8443
security:
  cors_allowed_origins: "*"
dialog:
  app_id: "app-1"
  bot_name: "helper"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, Some(8443));
        assert!(config.server.host.is_none());
        assert_eq!(config.security.cors_allowed_origins.as_deref(), Some("*"));

        let dialog = config.dialog.unwrap();
        assert_eq!(dialog.app_id, "app-1");
        assert_eq!(dialog.bot_name, "helper");
        // Unset dialog fields take the dialog defaults.
        assert_eq!(dialog.handshake_delay_ms, 500);
    }
}
