use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::process::NameRules;

/// Environment variable that forces the health check into test mode.
pub const TESTING_ENV: &str = "TESTING";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    /// Health check always reports healthy with no devices.
    pub test_mode: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_ms: u64,
    pub smi_path: PathBuf,
    /// Substring searched for in `/proc/<pid>/maps` by the fallback scan.
    pub driver_marker: String,
    pub interpreters: Vec<String>,
    pub script_extensions: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let names = NameRules::default();
        CollectorConfig {
            interval_ms: 1000,
            smi_path: PathBuf::from("nvidia-smi"),
            driver_marker: "nvidia".to_string(),
            interpreters: names.interpreters,
            script_extensions: names.script_extensions,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn name_rules(&self) -> NameRules {
        NameRules {
            interpreters: self.interpreters.clone(),
            script_extensions: self.script_extensions.clone(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("gpu-monitor").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "cannot read config, using defaults");
            Config::default()
        }
    }
}

/// `TESTING=true` enables test mode; any other value leaves it off.
pub fn testing_flag(value: Option<&str>) -> bool {
    value == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.collector.interval(), Duration::from_secs(1));
        assert_eq!(config.collector.smi_path, PathBuf::from("nvidia-smi"));
        assert_eq!(config.collector.driver_marker, "nvidia");
        assert_eq!(config.collector.name_rules(), NameRules::default());
        assert!(!config.test_mode);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[server]
port = 8080
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        // Other fields should be defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.collector.interval_ms, 1000);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
test_mode = true

[server]
host = "127.0.0.1"
port = 9400

[collector]
interval_ms = 250
smi_path = "/usr/local/bin/nvidia-smi"
driver_marker = "libcuda"
interpreters = ["python3", "julia"]
script_extensions = [".py", ".jl"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.test_mode);
        assert_eq!(config.server.bind_address(), "127.0.0.1:9400");
        assert_eq!(config.collector.interval(), Duration::from_millis(250));
        assert_eq!(
            config.collector.smi_path,
            PathBuf::from("/usr/local/bin/nvidia-smi")
        );
        assert_eq!(config.collector.driver_marker, "libcuda");
        assert_eq!(
            config.collector.name_rules().interpreters,
            vec!["python3", "julia"]
        );
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("gpu_monitor_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.collector.interval_ms, 1000);
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn testing_flag_requires_exact_true() {
        assert!(testing_flag(Some("true")));
        assert!(!testing_flag(Some("1")));
        assert!(!testing_flag(Some("TRUE")));
        assert!(!testing_flag(None));
    }
}
