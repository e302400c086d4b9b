//! Configuration System
//!
//! Layered configuration for storage locations, generation policy (retry,
//! concurrency, progress polling), the image provider, and logging. Defaults come
//! from the merge policy; files and `SLIDEGEN__*` environment variables override
//! them in that order.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlidegenConfig {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation policy
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Image provider settings
    #[serde(default)]
    pub provider: ImageProviderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage locations, relative paths resolve against the workspace root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project store (sled database directory)
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Root directory for generated style and page images
    #[serde(default = "default_generated_folder")]
    pub generated_folder: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".slidegen/store")
}

fn default_generated_folder() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            generated_folder: default_generated_folder(),
        }
    }
}

/// Generation policy: retry/backoff, job concurrency and progress delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Attempts per remote call before the failure is surfaced
    #[serde(default = "default_max_api_retries")]
    pub max_api_retries: u32,

    /// Exponential backoff base: wait `base ^ attempt` units between attempts
    #[serde(default = "default_retry_delay_base")]
    pub retry_delay_base: u32,

    /// Length of one backoff unit in milliseconds
    #[serde(default = "default_retry_unit_ms")]
    pub retry_unit_ms: u64,

    /// Per-request timeout enforced by the provider client
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Upper bound on jobs running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Delay between progress snapshots
    #[serde(default = "default_progress_poll_ms")]
    pub progress_poll_ms: u64,

    /// How long a subscriber waits for a job to register before giving up
    #[serde(default = "default_progress_start_wait_ms")]
    pub progress_start_wait_ms: u64,

    /// Terminal progress entries older than this are pruned
    #[serde(default = "default_registry_retention_secs")]
    pub registry_retention_secs: u64,
}

fn default_max_api_retries() -> u32 {
    10
}

fn default_retry_delay_base() -> u32 {
    2
}

fn default_retry_unit_ms() -> u64 {
    1000
}

fn default_api_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_progress_poll_ms() -> u64 {
    2000
}

fn default_progress_start_wait_ms() -> u64 {
    30_000
}

fn default_registry_retention_secs() -> u64 {
    3600
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_api_retries: default_max_api_retries(),
            retry_delay_base: default_retry_delay_base(),
            retry_unit_ms: default_retry_unit_ms(),
            api_timeout_secs: default_api_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            progress_poll_ms: default_progress_poll_ms(),
            progress_start_wait_ms: default_progress_start_wait_ms(),
            registry_retention_secs: default_registry_retention_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub fn progress_start_wait(&self) -> Duration {
        Duration::from_millis(self.progress_start_wait_ms)
    }

    pub fn registry_retention(&self) -> Duration {
        Duration::from_secs(self.registry_retention_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Image-generation provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProviderConfig {
    /// API key; falls back to `BANANA_API_KEY` then `GEMINI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_image_model")]
    pub model: String,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_image_size")]
    pub image_size: String,

    /// Directory holding `style_template.txt` / `page_generation.txt` overrides
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_image_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_image_size() -> String {
    "2K".to_string()
}

impl Default for ImageProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_image_model(),
            aspect_ratio: default_aspect_ratio(),
            image_size: default_image_size(),
            prompts_dir: None,
        }
    }
}

impl ImageProviderConfig {
    /// Resolve the API key from config or the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("BANANA_API_KEY").ok().filter(|k| !k.is_empty()))
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Storage(String),
    Generation(String),
    Provider(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SlidegenConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if self.storage.generated_folder.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Generated folder cannot be empty".to_string(),
            ));
        }

        let generation = &self.generation;
        if generation.max_api_retries == 0 {
            errors.push(ValidationError::Generation(
                "max_api_retries must be at least 1".to_string(),
            ));
        }
        if generation.retry_delay_base == 0 {
            errors.push(ValidationError::Generation(
                "retry_delay_base must be at least 1".to_string(),
            ));
        }
        if generation.max_concurrent_jobs == 0 {
            errors.push(ValidationError::Generation(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        let base_url = &self.provider.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            errors.push(ValidationError::Provider(format!(
                "base_url must be an http(s) URL: {}",
                base_url
            )));
        }
        if self.provider.model.trim().is_empty() {
            errors.push(ValidationError::Provider(
                "Model cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into a single `ApiError`
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}
