//! Configuration module for azstack
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/azstack/azstack.toml)
//! - User configuration (~/.azstack.toml)
//! - Project configuration (./azstack.toml)
//! - Environment variables
//! - Command-line arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::azure::SasWindow;
use crate::engine::DeploymentOptions;
use crate::provider::arm::{ArmConfig, DEFAULT_BLOB_ENDPOINT, DEFAULT_MANAGEMENT_ENDPOINT};
use crate::secrets::SensitiveString;
use crate::stacks::function::DEFAULT_ARCHIVE;
use crate::stacks::static_website::DEFAULT_CONTENT_DIR;

/// Project name used when none is configured
pub const DEFAULT_PROJECT: &str = "pulumiazurenative";

/// Stack identifier used when none is configured
pub const DEFAULT_STACK: &str = "dev";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project and stack identity
    pub project: ProjectConfig,

    /// Local inputs
    pub paths: PathsConfig,

    /// Azure settings
    pub azure: AzureConfig,

    /// Signed package URL window
    pub sas: SasWindow,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Project and stack identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, prefix of every resource name
    pub name: String,

    /// Stack identifier
    pub stack: String,

    /// Seed for random name suffixes
    pub seed: Option<u64>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROJECT.to_string(),
            stack: DEFAULT_STACK.to_string(),
            seed: None,
        }
    }
}

/// Local inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Static website content
    pub content_dir: PathBuf,

    /// Function package directory or zip
    pub archive: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            archive: PathBuf::from(DEFAULT_ARCHIVE),
        }
    }
}

/// Azure settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Subscription to deploy into
    pub subscription_id: Option<String>,

    /// Default location
    pub location: String,

    /// Resource Manager endpoint
    pub endpoint: String,

    /// Blob endpoint template (`{account}` is substituted)
    pub blob_endpoint: String,

    /// Bearer token for Resource Manager
    pub access_token: Option<SensitiveString>,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            location: "westeurope".to_string(),
            endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            blob_endpoint: DEFAULT_BLOB_ENDPOINT.to_string(),
            access_token: None,
            timeout: 120,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level when neither `-v` nor `RUST_LOG` is given
    pub level: String,

    /// `compact` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Colored terminal output
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/azstack/azstack.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".azstack.toml"));
            paths.push(home.join(".azstack/config.toml"));
        }

        paths.push(PathBuf::from("azstack.toml"));
        paths.push(PathBuf::from(".azstack.toml"));

        if let Ok(env_config) = std::env::var("AZSTACK_CONFIG") {
            paths.insert(0, PathBuf::from(env_config));
        }

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; values that differ from the
    /// defaults in `other` win.
    fn merge(&self, other: Config) -> Config {
        let defaults = Config::default();

        fn pick<T: PartialEq + Clone>(base: &T, other: T, default: &T) -> T {
            if &other != default {
                other
            } else {
                base.clone()
            }
        }

        Config {
            project: ProjectConfig {
                name: pick(&self.project.name, other.project.name, &defaults.project.name),
                stack: pick(&self.project.stack, other.project.stack, &defaults.project.stack),
                seed: other.project.seed.or(self.project.seed),
            },
            paths: PathsConfig {
                content_dir: pick(
                    &self.paths.content_dir,
                    other.paths.content_dir,
                    &defaults.paths.content_dir,
                ),
                archive: pick(&self.paths.archive, other.paths.archive, &defaults.paths.archive),
            },
            azure: AzureConfig {
                subscription_id: other
                    .azure
                    .subscription_id
                    .or_else(|| self.azure.subscription_id.clone()),
                location: pick(&self.azure.location, other.azure.location, &defaults.azure.location),
                endpoint: pick(&self.azure.endpoint, other.azure.endpoint, &defaults.azure.endpoint),
                blob_endpoint: pick(
                    &self.azure.blob_endpoint,
                    other.azure.blob_endpoint,
                    &defaults.azure.blob_endpoint,
                ),
                access_token: other
                    .azure
                    .access_token
                    .or_else(|| self.azure.access_token.clone()),
                timeout: pick(&self.azure.timeout, other.azure.timeout, &defaults.azure.timeout),
            },
            sas: pick(&self.sas, other.sas, &defaults.sas),
            logging: LoggingConfig {
                level: pick(&self.logging.level, other.logging.level, &defaults.logging.level),
                format: pick(&self.logging.format, other.logging.format, &defaults.logging.format),
            },
            output: OutputConfig {
                color: self.output.color && other.output.color,
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(name) = std::env::var("AZSTACK_PROJECT") {
            self.project.name = name;
        }

        if let Ok(stack) = std::env::var("AZSTACK_STACK") {
            self.project.stack = stack;
        }

        if let Ok(seed) = std::env::var("AZSTACK_SEED") {
            let seed = seed
                .parse()
                .with_context(|| format!("AZSTACK_SEED must be an integer, got '{}'", seed))?;
            self.project.seed = Some(seed);
        }

        if let Ok(dir) = std::env::var("AZSTACK_CONTENT_DIR") {
            self.paths.content_dir = PathBuf::from(dir);
        }

        if let Ok(archive) = std::env::var("AZSTACK_ARCHIVE") {
            self.paths.archive = PathBuf::from(archive);
        }

        if let Ok(subscription) = std::env::var("AZSTACK_SUBSCRIPTION_ID") {
            self.azure.subscription_id = Some(subscription);
        }

        if let Ok(location) = std::env::var("AZSTACK_LOCATION") {
            self.azure.location = location;
        }

        if let Ok(endpoint) = std::env::var("AZSTACK_MANAGEMENT_ENDPOINT") {
            self.azure.endpoint = endpoint;
        }

        if let Ok(token) = std::env::var("AZSTACK_ACCESS_TOKEN") {
            self.azure.access_token = Some(SensitiveString::new(token));
        }

        if let Ok(level) = std::env::var("AZSTACK_LOG_LEVEL") {
            self.logging.level = level;
        }

        if std::env::var("NO_COLOR").is_ok() || std::env::var("AZSTACK_NO_COLOR").is_ok() {
            self.output.color = false;
        }

        Ok(())
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        Config::default().merge_from_file(&path_buf)
    }

    /// The SAS window, validated.
    pub fn sas_window(&self) -> Result<SasWindow> {
        SasWindow::new(self.sas.start, self.sas.expiry).context("Invalid [sas] window")
    }

    /// Deployment options for the configured project and stack.
    pub fn deployment_options(&self) -> DeploymentOptions {
        let options = DeploymentOptions::new(&self.project.name, &self.project.stack);
        match self.project.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }

    /// Settings for the ARM provider.
    pub fn arm_config(&self) -> ArmConfig {
        ArmConfig {
            subscription_id: self.azure.subscription_id.clone().unwrap_or_default(),
            location: self.azure.location.clone(),
            management_endpoint: self.azure.endpoint.clone(),
            blob_endpoint: self.azure.blob_endpoint.clone(),
            access_token: self.azure.access_token.clone(),
            timeout: Duration::from_secs(self.azure.timeout),
            ..ArmConfig::default()
        }
    }
}
