use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub baselines: BaselinesConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselinesConfig {
    #[serde(default = "default_baselines_file")]
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub drift_detected: bool,
    #[serde(default = "default_true")]
    pub drift_resolved: bool,
    #[serde(default = "default_true")]
    pub critical_drift: bool,
    #[serde(default = "default_true")]
    pub scan_failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub projects: Option<Vec<String>>,
    pub baselines_file: Option<String>,
    pub access_token: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/drift-sentinel/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(projects) = overrides.projects {
            self.scan.projects = projects;
        }
        if let Some(file) = overrides.baselines_file {
            self.baselines.file = file;
        }
        if let Some(token) = overrides.access_token {
            self.auth.access_token = token;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_baselines_path(&self) -> PathBuf {
        expand_tilde(&self.baselines.file)
    }

    pub fn default_template() -> String {
        let template = r#"[scan]
projects = ["your-project-id"]
max_concurrent_scans = 4
request_timeout_secs = 30

[auth]
# Leave empty to read GCP_ACCESS_TOKEN from the environment.
access_token = ""

[storage]
db_path = "~/.local/share/drift-sentinel/sentinel.db"

[baselines]
file = "~/.config/drift-sentinel/baselines.yaml"

[server]
host = "127.0.0.1"
port = 4400

[alerts]
webhook_url = ""
enable_stdout = true

[alerts.rules]
drift_detected = true
drift_resolved = true
critical_drift = true
scan_failed = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            baselines: BaselinesConfig::default(),
            server: ServerConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            max_concurrent_scans: default_max_concurrent_scans(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for BaselinesConfig {
    fn default() -> Self {
        Self {
            file: default_baselines_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            enable_stdout: default_enable_stdout(),
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            drift_detected: true,
            drift_resolved: true,
            critical_drift: true,
            scan_failed: true,
        }
    }
}

fn default_max_concurrent_scans() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_db_path() -> String {
    "~/.local/share/drift-sentinel/sentinel.db".to_string()
}

fn default_baselines_file() -> String {
    "~/.config/drift-sentinel/baselines.yaml".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    4400
}

fn default_enable_stdout() -> bool {
    true
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_into_a_config() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("parse template");
        assert_eq!(parsed.scan.projects, vec!["your-project-id".to_string()]);
        assert_eq!(parsed.scan.max_concurrent_scans, 4);
        assert_eq!(parsed.server.port, 4400);
        assert!(parsed.alerts.rules.critical_drift);
    }

    #[test]
    fn overrides_replace_only_what_they_set() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            projects: Some(vec!["other-project".to_string()]),
            baselines_file: None,
            access_token: Some("token-123".to_string()),
        });
        assert_eq!(config.scan.projects, vec!["other-project".to_string()]);
        assert_eq!(config.baselines.file, default_baselines_file());
        assert_eq!(config.auth.access_token, "token-123");
    }
}
