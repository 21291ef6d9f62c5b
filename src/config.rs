use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::llm::{LLMConfig, LLMProvider};

/// Configuration for the Text-to-Learn backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Generative model settings
    pub llm: LLMConfig,

    /// Video search settings
    pub video: VideoSearchConfig,

    /// Where courses and accounts are stored
    pub storage: StorageConfig,

    /// Account settings
    pub auth: AuthConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Origins allowed by CORS (empty = any)
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSearchConfig {
    /// YouTube Data API key
    pub api_key: Option<String>,

    /// Endpoint override
    pub endpoint: Option<String>,

    /// Results per search
    pub max_results: u32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for course and user files
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// PBKDF2 iterations for password hashing
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for VideoSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            max_results: 5,
            timeout_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 600_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "text_to_learn=info,tower_http=info,warn".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LLMConfig::default(),
            video: VideoSearchConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults
    pub fn load() -> Result<Self> {
        let config_paths = [
            "text-to-learn.toml",
            "config/text-to-learn.toml",
            "/etc/text-to-learn/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::from_file(Path::new(path));
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let provider_key = match self.llm.provider {
            LLMProvider::Gemini => var("GEMINI_API_KEY"),
            LLMProvider::OpenAI => var("OPENAI_API_KEY"),
            LLMProvider::LMStudio => None,
        };
        if let Some(api_key) = provider_key.filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(api_key);
        }

        if let Some(models) = var("TEXT_TO_LEARN_MODELS") {
            self.llm.models = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }

        if let Some(api_key) = var("YOUTUBE_API_KEY").filter(|k| !k.is_empty()) {
            self.video.api_key = Some(api_key);
        }

        if let Some(port) = var("TEXT_TO_LEARN_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid TEXT_TO_LEARN_PORT: {}", port),
            }
        }

        if let Some(data_dir) = var("TEXT_TO_LEARN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(level) = var("TEXT_TO_LEARN_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be greater than 0"));
        }

        if self.llm.models.is_empty() {
            return Err(anyhow!("llm.models must name at least one model"));
        }

        if self.llm.max_concurrent_lessons == 0 {
            return Err(anyhow!("llm.max_concurrent_lessons must be greater than 0"));
        }

        if self.auth.pbkdf2_iterations == 0 {
            return Err(anyhow!("auth.pbkdf2_iterations must be greater than 0"));
        }

        if self.video.max_results == 0 || self.video.max_results > 50 {
            return Err(anyhow!("video.max_results must be between 1 and 50"));
        }

        if self.llm.provider == LLMProvider::LMStudio && self.llm.endpoint.is_none() {
            tracing::warn!("LMStudio endpoint not set, using the local default");
        }

        if self.llm.api_key.is_none() && self.llm.provider != LLMProvider::LMStudio {
            tracing::warn!("No API key for {:?}; generation requests will fail", self.llm.provider);
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Text-to-Learn Configuration:\n\
            - Listen: {}:{}\n\
            - LLM Provider: {:?}\n\
            - Models: {}\n\
            - Video Search: {}\n\
            - Data Directory: {}",
            self.server.host,
            self.server.port,
            self.llm.provider,
            self.llm.models.join(" -> "),
            if self.video.api_key.is_some() { "enabled" } else { "disabled" },
            self.storage.data_dir.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = dir;
        self
    }

    pub fn with_provider(mut self, provider: LLMProvider) -> Self {
        self.config.llm.provider = provider;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.config.llm.models = models;
        self
    }

    pub fn with_youtube_key(mut self, api_key: String) -> Self {
        self.config.video.api_key = Some(api_key);
        self
    }

    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.config.auth.pbkdf2_iterations = iterations;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
