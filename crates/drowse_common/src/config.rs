//! Drowse configuration
//!
//! Read-only for the telemetry core. Lives in /etc/drowse/config.toml unless
//! another path is given on the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/drowse";
const CONFIG_FILE: &str = "config.toml";

/// Default collector endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.drowse.dev/v2/report";

/// Identity of this drowse instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Stable instance identifier, generated on first run when empty
    #[serde(default)]
    pub id: String,

    /// Whether the managed server may be suspended instead of stopped
    #[serde(default)]
    pub allow_suspend: bool,
}

/// Facts about the managed server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_version")]
    pub version: String,

    #[serde(default)]
    pub protocol: i32,

    /// Java runtime version used to launch the server
    #[serde(default)]
    pub java_version: String,
}

fn default_server_version() -> String {
    "unknown".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: default_server_version(),
            protocol: 0,
            java_version: String::new(),
        }
    }
}

/// Telemetry reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// How often to sample the process tree (seconds, valid: 1-60)
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// How often to send a report (seconds, valid: 60-86400)
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_sample_interval() -> u64 {
    1
}

fn default_report_interval() -> u64 {
    3600 // 1 hour
}

impl TelemetrySettings {
    /// Validate and clamp sample_interval_secs to valid range (1-60)
    pub fn effective_sample_interval(&self) -> u64 {
        self.sample_interval_secs.clamp(1, 60)
    }

    /// Validate and clamp report_interval_secs to valid range (60-86400)
    pub fn effective_report_interval(&self) -> u64 {
        self.report_interval_secs.clamp(60, 86_400)
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            endpoint: default_endpoint(),
            sample_interval_secs: default_sample_interval(),
            report_interval_secs: default_report_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete drowse configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DrowseConfig {
    #[serde(default)]
    pub instance: InstanceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub log: LogConfig,
}

impl DrowseConfig {
    /// Load config from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("[CONFIG] Invalid {}: {} - using defaults", path.display(), e),
            },
            Err(e) => debug!("[CONFIG] Cannot read {}: {} - using defaults", path.display(), e),
        }
        Self::default()
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Generate an instance id if none is configured. Returns true when one was generated.
    pub fn ensure_instance_id(&mut self) -> bool {
        if !self.instance.id.trim().is_empty() {
            return false;
        }
        self.instance.id = uuid::Uuid::new_v4().simple().to_string();
        true
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DrowseConfig::default();
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.telemetry.sample_interval_secs, 1);
        assert_eq!(config.telemetry.report_interval_secs, 3600);
        assert_eq!(config.log.level, "info");
        assert!(config.instance.id.is_empty());
        assert!(!config.instance.allow_suspend);
    }

    #[test]
    fn test_interval_clamping() {
        let settings = TelemetrySettings {
            sample_interval_secs: 0,
            report_interval_secs: 5,
            ..Default::default()
        };
        assert_eq!(settings.effective_sample_interval(), 1);
        assert_eq!(settings.effective_report_interval(), 60);

        let settings = TelemetrySettings {
            sample_interval_secs: 600,
            report_interval_secs: 1_000_000,
            ..Default::default()
        };
        assert_eq!(settings.effective_sample_interval(), 60);
        assert_eq!(settings.effective_report_interval(), 86_400);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DrowseConfig = toml::from_str(
            r#"
            [instance]
            id = "abc"

            [server]
            protocol = 763
            "#,
        )
        .unwrap();
        assert_eq!(config.instance.id, "abc");
        assert_eq!(config.server.protocol, 763);
        assert_eq!(config.server.version, "unknown");
        assert_eq!(config.telemetry.report_interval_secs, 3600);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DrowseConfig::default();
        config.instance.allow_suspend = true;
        config.server.version = "1.20.1".to_string();
        config.save(&path).unwrap();

        let loaded = DrowseConfig::load(&path);
        assert!(loaded.instance.allow_suspend);
        assert_eq!(loaded.server.version, "1.20.1");
    }

    #[test]
    fn test_load_missing_or_invalid_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DrowseConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(missing.telemetry.endpoint, DEFAULT_ENDPOINT);

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "this is = = not toml").unwrap();
        let loaded = DrowseConfig::load(&bad);
        assert_eq!(loaded.log.level, "info");
    }

    #[test]
    fn test_ensure_instance_id() {
        let mut config = DrowseConfig::default();
        assert!(config.ensure_instance_id());
        let id = config.instance.id.clone();
        assert_eq!(id.len(), 32);
        assert!(!config.ensure_instance_id());
        assert_eq!(config.instance.id, id);
    }
}
