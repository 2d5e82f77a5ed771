//! Configuration management for docket
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::backend::{BackendDescriptor, Provider};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Processing scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Extraction request settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Provider endpoints and credentials
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Backend rotation, in dispatch order
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendDescriptor>,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum documents in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for a single analysis call in seconds
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Timeout for each storage operation in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

/// Extraction request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Sampling temperature sent with every request
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Per-provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Chat completions URL
    pub endpoint: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

/// Endpoints for every supported provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_groq_provider")]
    pub groq: ProviderConfig,

    #[serde(default = "default_mistral_provider")]
    pub mistral: ProviderConfig,

    #[serde(default = "default_codestral_provider")]
    pub codestral: ProviderConfig,
}

fn default_groq_provider() -> ProviderConfig {
    ProviderConfig {
        endpoint: default_groq_endpoint(),
        api_key_env: default_groq_api_key_env(),
    }
}

fn default_mistral_provider() -> ProviderConfig {
    ProviderConfig {
        endpoint: default_mistral_endpoint(),
        api_key_env: default_mistral_api_key_env(),
    }
}

fn default_codestral_provider() -> ProviderConfig {
    ProviderConfig {
        endpoint: default_codestral_endpoint(),
        api_key_env: default_codestral_api_key_env(),
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Groq => &self.groq,
            Provider::Mistral => &self.mistral,
            Provider::Codestral => &self.codestral,
        }
    }

    /// Point every provider at the same endpoint (local gateways, tests)
    pub fn with_endpoint(endpoint: &str) -> Self {
        let mut providers = Self::default();
        for provider in [Provider::Groq, Provider::Mistral, Provider::Codestral] {
            providers.get_mut(provider).endpoint = endpoint.to_string();
        }
        providers
    }

    fn get_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::Groq => &mut self.groq,
            Provider::Mistral => &mut self.mistral,
            Provider::Codestral => &mut self.codestral,
        }
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for docket data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            store: StoreConfig::default(),
            analysis: AnalysisConfig::default(),
            providers: ProvidersConfig::default(),
            backends: default_backends(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            analysis_timeout_secs: default_analysis_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            groq: default_groq_provider(),
            mistral: default_mistral_provider(),
            codestral: default_codestral_provider(),
        }
    }
}

impl Config {
    /// Get the default base directory for docket (~/.docket)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docket")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("docket.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("docket.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if docket is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::Config(
                "at least one [[backends]] entry is required".to_string(),
            ));
        }

        if let Some(backend) = self.backends.iter().find(|b| b.input_capacity == 0) {
            return Err(Error::Config(format!(
                "backend '{}' must have input_capacity > 0",
                backend.model
            )));
        }

        if self.scheduler.max_concurrency == 0 {
            return Err(Error::Config(
                "scheduler.max_concurrency must be > 0".to_string(),
            ));
        }

        if self.scheduler.analysis_timeout_secs == 0 {
            return Err(Error::Config(
                "scheduler.analysis_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.store.timeout_secs == 0 {
            return Err(Error::Config("store.timeout_secs must be > 0".to_string()));
        }

        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(Error::Config(
                "analysis.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        for provider in [Provider::Groq, Provider::Mistral, Provider::Codestral] {
            let endpoint = &self.providers.get(provider).endpoint;
            Url::parse(endpoint).map_err(|e| {
                Error::Config(format!("Invalid {} endpoint '{}': {}", provider, endpoint, e))
            })?;
        }

        Ok(())
    }
}
