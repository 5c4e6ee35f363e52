use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::files::FilesConfig;
use crate::pipeline::PipelineConfig;
use crate::scheduler::SchedulerConfig;
use crate::store::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Status/metrics HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    9464
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub files: FilesConfig,
    pub pipeline: PipelineConfig,
    pub scheduler: SchedulerConfig,
    pub storage: SanitizedStorageConfig,
    pub http: HttpConfig,
}

/// Storage section without tuning internals
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    pub path: PathBuf,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            files: config.files.clone(),
            pipeline: config.pipeline.clone(),
            scheduler: config.scheduler.clone(),
            storage: SanitizedStorageConfig {
                backend: "sqlite".to_string(),
                path: config.storage.path.clone(),
            },
            http: config.http.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.files.source_dir, PathBuf::from("data/cdr"));
        assert_eq!(config.pipeline.batch_size, 1000);
        assert_eq!(config.scheduler.interval_secs, 120);
        assert_eq!(config.storage.path, PathBuf::from("cdr.db"));
        assert!(!config.http.enabled);
        assert_eq!(config.http.port, 9464);
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let toml = r#"
[files]
source_dir = "/var/spool/cdr"
min_file_size_bytes = 512

[http]
enabled = true
host = "0.0.0.0"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.files.source_dir, PathBuf::from("/var/spool/cdr"));
        assert_eq!(config.files.min_file_size_bytes, 512);
        assert_eq!(config.files.locked_suffix, ".processing");
        assert!(config.http.enabled);
        assert_eq!(config.http.host.to_string(), "0.0.0.0");
        assert_eq!(config.http.port, 9464);
    }

    #[test]
    fn test_sanitized_config() {
        let config = Config::default();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.storage.backend, "sqlite");

        let json = serde_json::to_value(&sanitized).unwrap();
        assert_eq!(json["storage"]["path"], "cdr.db");
        assert!(json["storage"].get("busy_timeout_ms").is_none());
    }
}
