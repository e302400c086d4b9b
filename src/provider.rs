//! Image Provider Abstraction
//!
//! The image-generation collaborator used by the pipeline. Implementations render a
//! prompt (optionally steered by a reference image) into an image file and must
//! return an error on failure rather than writing a placeholder, so the retry layer
//! and the page bookkeeping see every failure.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiImageClient;
pub use prompts::PromptTemplates;

/// Image generation client trait
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render `prompt` into an image written at `output_path`
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<PathBuf, ApiError>;

    /// Render `prompt` using `reference_image` as a visual reference
    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference_image: &Path,
        output_path: &Path,
    ) -> Result<PathBuf, ApiError>;
}

// Helper function to map HTTP errors to ApiError
pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        map_status(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

pub(crate) fn map_status(status: u16, detail: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", detail)),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", detail)),
        _ => ApiError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, detail
        )),
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_provider_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}
