use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::catalog::feed::ContainerDetection;
use crate::language_utils::LanguageFilter;
use crate::session::model::Credentials;
use crate::session::store::SessionBackend;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Catalog service settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Login settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Catalog service settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    // @field: Origin used for bare identifiers
    #[serde(default = "default_base_url")]
    pub base_url: String,

    // @field: How container items are recognised
    #[serde(default)]
    pub container_detection: ContainerDetection,

    // @field: Keyword marking season containers
    #[serde(default = "default_season_keyword")]
    pub season_keyword: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            container_detection: ContainerDetection::default(),
            season_keyword: default_season_keyword(),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Login settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    // @field: Send session headers and log in when needed
    #[serde(default)]
    pub enabled: bool,

    // @field: Auth host
    #[serde(default = "default_base_url")]
    pub endpoint: String,

    // @field: Account name
    #[serde(default = "String::new")]
    pub username: String,

    // @field: Account password
    #[serde(default = "String::new")]
    pub password: String,

    // @field: Login locale
    #[serde(default = "default_locale")]
    pub locale: String,

    // @field: Declared device type
    #[serde(default = "default_device_type")]
    pub device_type: String,

    // @field: Client name header
    #[serde(default = "default_client_name")]
    pub client_name: String,

    // @field: Client version header
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl AuthConfig {
    // @returns: Credentials from this section
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_base_url(),
            username: String::new(),
            password: String::new(),
            locale: default_locale(),
            device_type: default_device_type(),
            client_name: default_client_name(),
            client_version: default_client_version(),
        }
    }
}

/// Session persistence settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SessionConfig {
    // @field: Storage backend
    #[serde(default)]
    pub backend: SessionBackend,

    // @field: Storage location override
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Output settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    // @field: Where artifacts are written
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    // @field: Keep the raw caption markup
    #[serde(default = "default_true")]
    pub write_raw: bool,

    // @field: Write converted SubRip files
    #[serde(default = "default_true")]
    pub write_srt: bool,

    // @field: Accepted language tags; empty accepts all
    #[serde(default)]
    pub languages: Vec<String>,

    // @field: Replace existing artifacts
    #[serde(default)]
    pub force_overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            write_raw: true,
            write_srt: true,
            languages: Vec::new(),
            force_overwrite: false,
        }
    }
}

impl OutputConfig {
    // @returns: Language filter built from `languages`
    pub fn language_filter(&self) -> Result<LanguageFilter> {
        LanguageFilter::from_codes(&self.languages)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_base_url() -> String {
    "https://api-hbon.hbo.clearleap.com".to_string()
}

fn default_season_keyword() -> String {
    "season".to_string()
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_locale() -> String {
    "sv_SE".to_string()
}

fn default_device_type() -> String {
    "COMP".to_string()
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration file, writing a default one when it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.catalog.concurrent_requests == 0 {
            return Err(anyhow!("catalog.concurrent_requests must be at least 1"));
        }

        if self.auth.enabled {
            if self.auth.endpoint.trim().is_empty() {
                return Err(anyhow!("auth.endpoint is required when authentication is enabled"));
            }
            if !self.auth.credentials().is_complete() {
                return Err(anyhow!(
                    "auth.username and auth.password are required when authentication is enabled"
                ));
            }
        }

        // Validate languages
        self.output
            .language_filter()
            .context("Invalid language in output.languages")?;

        if !self.output.write_raw && !self.output.write_srt {
            return Err(anyhow!("At least one of output.write_raw and output.write_srt must be enabled"));
        }

        Ok(())
    }
}
