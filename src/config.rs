//! Configuration module for Restible
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - User configuration (~/.restible.toml, ~/.restible/config)
//! - Project configuration (./restible.toml)
//! - Environment variables
//! - Command-line arguments

use crate::modules::http::{HttpSettings, DEFAULT_TIMEOUT_SECS};
use crate::modules::{ModuleContext, ServiceEndpoints};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Every value read from a file is optional, so a later file only
/// overrides what it actually sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// GitHub API settings
    pub github: ServiceConfig,

    /// Cloudflare API settings
    pub cloudflare: ServiceConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Files merged into this configuration, in load order
    #[serde(skip)]
    pub sources: Vec<PathBuf>,

    /// Problems found while loading, reported once logging is up
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Default configuration values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// HTTP request timeout in seconds
    pub timeout: Option<u64>,

    /// Verify TLS certificates
    pub validate_certs: Option<bool>,

    /// User-Agent sent with every request
    pub user_agent: Option<String>,
}

/// Per-service settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// API root replacing the public endpoint (GitHub Enterprise, proxies, mocks)
    pub api_url: Option<String>,
}

/// Output color settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colored output
    pub enabled: Option<bool>,
}

impl ColorsConfig {
    /// Colors are on unless turned off
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given, e.g. "info"
    pub level: Option<String>,

    /// Log line format
    pub format: Option<LogFormat>,
}

impl LoggingConfig {
    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or_default()
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            } else if config_path == Some(&path) {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        if let Ok(env_config) = std::env::var("RESTIBLE_CONFIG") {
            return vec![PathBuf::from(env_config)];
        }

        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".restible.toml"));
            paths.push(home.join(".restible/config"));
        }
        paths.push(PathBuf::from("restible.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        let mut merged = self.merge(file_config);
        merged.sources.push(path.to_path_buf());
        Ok(merged)
    }

    /// Merge another config into this one; values set in `other` win
    fn merge(&self, other: Config) -> Config {
        Config {
            defaults: Defaults {
                timeout: other.defaults.timeout.or(self.defaults.timeout),
                validate_certs: other.defaults.validate_certs.or(self.defaults.validate_certs),
                user_agent: other
                    .defaults
                    .user_agent
                    .or_else(|| self.defaults.user_agent.clone()),
            },
            github: ServiceConfig {
                api_url: other.github.api_url.or_else(|| self.github.api_url.clone()),
            },
            cloudflare: ServiceConfig {
                api_url: other
                    .cloudflare
                    .api_url
                    .or_else(|| self.cloudflare.api_url.clone()),
            },
            colors: ColorsConfig {
                enabled: other.colors.enabled.or(self.colors.enabled),
            },
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
                format: other.logging.format.or(self.logging.format),
            },
            sources: self.sources.clone(),
            warnings: self.warnings.clone(),
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // RESTIBLE_TIMEOUT
        if let Ok(timeout) = std::env::var("RESTIBLE_TIMEOUT") {
            match timeout.parse() {
                Ok(n) => self.defaults.timeout = Some(n),
                Err(_) => self
                    .warnings
                    .push(format!("ignoring invalid RESTIBLE_TIMEOUT '{}'", timeout)),
            }
        }

        // RESTIBLE_GITHUB_API_URL
        if let Ok(url) = std::env::var("RESTIBLE_GITHUB_API_URL") {
            self.github.api_url = Some(url);
        }

        // RESTIBLE_CLOUDFLARE_API_URL
        if let Ok(url) = std::env::var("RESTIBLE_CLOUDFLARE_API_URL") {
            self.cloudflare.api_url = Some(url);
        }

        // RESTIBLE_LOG_FORMAT
        if let Ok(format) = std::env::var("RESTIBLE_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.logging.format = Some(format),
                Err(e) => self
                    .warnings
                    .push(format!("ignoring RESTIBLE_LOG_FORMAT: {}", e)),
            }
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("RESTIBLE_NO_COLOR").is_ok() {
            self.colors.enabled = Some(false);
        }
    }

    /// HTTP settings for module clients
    pub fn http_settings(&self) -> HttpSettings {
        let defaults = HttpSettings::default();
        HttpSettings {
            timeout_secs: self.defaults.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            validate_certs: self.defaults.validate_certs.unwrap_or(true),
            user_agent: self
                .defaults
                .user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
        }
    }

    /// API roots for modules that do not pass `api_url`
    pub fn endpoints(&self) -> ServiceEndpoints {
        let defaults = ServiceEndpoints::default();
        ServiceEndpoints {
            github: self.github.api_url.clone().unwrap_or(defaults.github),
            cloudflare: self
                .cloudflare
                .api_url
                .clone()
                .unwrap_or(defaults.cloudflare),
        }
    }

    /// Module context carrying this configuration
    pub fn module_context(&self, check_mode: bool, diff_mode: bool) -> ModuleContext {
        ModuleContext::new()
            .with_check_mode(check_mode)
            .with_diff_mode(diff_mode)
            .with_http(self.http_settings())
            .with_endpoints(self.endpoints())
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_settings(), HttpSettings::default());
        assert!(config.colors.is_enabled());
        assert_eq!(config.logging.format(), LogFormat::Compact);
        assert_eq!(config.endpoints(), ServiceEndpoints::default());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            github: ServiceConfig {
                api_url: Some("https://ghe.example.com/api/v3".into()),
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                timeout: Some(10),
                ..Defaults::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.timeout, Some(10));
        assert_eq!(
            merged.github.api_url.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[defaults]
timeout = 5
validate_certs = false

[cloudflare]
api_url = "http://127.0.0.1:8080/client/v4"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.timeout, Some(5));
        assert_eq!(config.defaults.validate_certs, Some(false));
        assert_eq!(config.logging.format(), LogFormat::Json);
        assert_eq!(config.sources, vec![file.path().to_path_buf()]);

        let context = config.module_context(true, false);
        assert!(context.check_mode);
        assert_eq!(context.http.timeout_secs, 5);
        assert_eq!(context.endpoints.cloudflare, "http://127.0.0.1:8080/client/v4");
        assert_eq!(context.endpoints.github, "https://api.github.com");
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "github:\n  api_url: https://ghe.example.com/api/v3").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.endpoints().github, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_path_is_an_error() {
        let missing = PathBuf::from("/nonexistent/restible.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("RESTIBLE_TIMEOUT", "7");
        std::env::set_var("RESTIBLE_GITHUB_API_URL", "http://localhost:1234");
        std::env::set_var("RESTIBLE_LOG_FORMAT", "json");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("RESTIBLE_TIMEOUT");
        std::env::remove_var("RESTIBLE_GITHUB_API_URL");
        std::env::remove_var("RESTIBLE_LOG_FORMAT");

        assert_eq!(config.http_settings().timeout_secs, 7);
        assert_eq!(config.endpoints().github, "http://localhost:1234");
        assert_eq!(config.logging.format(), LogFormat::Json);
        assert!(config.warnings.is_empty());
    }

    #[test]
    #[serial]
    fn test_invalid_env_timeout_is_ignored() {
        std::env::set_var("RESTIBLE_TIMEOUT", "soon");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("RESTIBLE_TIMEOUT");
        assert_eq!(config.http_settings().timeout_secs, 30);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("RESTIBLE_TIMEOUT"));
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_later_file_keeps_values_it_does_not_set() {
        let user = toml_file(
            r#"
[defaults]
timeout = 12
validate_certs = false

[colors]
enabled = false

[logging]
format = "json"
"#,
        );
        let project = toml_file(
            r#"
[github]
api_url = "https://ghe.example.com/api/v3"
"#,
        );

        let config = Config::default()
            .merge_from_file(user.path())
            .unwrap()
            .merge_from_file(project.path())
            .unwrap();

        assert_eq!(config.defaults.validate_certs, Some(false));
        assert!(!config.http_settings().validate_certs);
        assert_eq!(config.http_settings().timeout_secs, 12);
        assert!(!config.colors.is_enabled());
        assert_eq!(config.logging.format(), LogFormat::Json);
        assert_eq!(config.endpoints().github, "https://ghe.example.com/api/v3");
        assert_eq!(
            config.sources,
            vec![user.path().to_path_buf(), project.path().to_path_buf()]
        );
    }

    #[test]
    fn test_later_file_overrides_with_default_values() {
        let user = toml_file("[defaults]\ntimeout = 12\nvalidate_certs = false");
        let project = toml_file("[defaults]\ntimeout = 30\nvalidate_certs = true");

        let config = Config::default()
            .merge_from_file(user.path())
            .unwrap()
            .merge_from_file(project.path())
            .unwrap();

        assert_eq!(config.http_settings().timeout_secs, 30);
        assert!(config.http_settings().validate_certs);
    }

    #[test]
    #[serial]
    fn test_invalid_env_log_format_is_reported() {
        std::env::set_var("RESTIBLE_LOG_FORMAT", "xml");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("RESTIBLE_LOG_FORMAT");

        assert_eq!(config.logging.format(), LogFormat::Compact);
        assert!(config.warnings[0].contains("unknown log format 'xml'"));
    }
}
