//! Gemini image-generation client.
//!
//! Calls `models/{model}:generateContent` with an image-only response modality and
//! writes the first inline image part to the requested output path.

use crate::config::ImageProviderConfig;
use crate::error::ApiError;
use crate::provider::{build_provider_http_client, map_http_error, map_status, ImageGenerator};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Gemini image client
pub struct GeminiImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    aspect_ratio: String,
    image_size: String,
}

impl GeminiImageClient {
    pub fn new(config: &ImageProviderConfig, request_timeout: Duration) -> Result<Self, ApiError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ApiError::ConfigError(
                "No image provider API key (set provider.api_key or GEMINI_API_KEY)".to_string(),
            )
        })?;
        let client = build_provider_http_client(request_timeout)?;
        info!(model = %config.model, "Image provider client initialized");
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            aspect_ratio: config.aspect_ratio.clone(),
            image_size: config.image_size.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request_image(
        &self,
        parts: Vec<RequestPart>,
        output_path: &Path,
    ) -> Result<PathBuf, ApiError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                    image_size: self.image_size.clone(),
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status(status, &error_text));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let bytes = extract_image(body)?;
        write_image(output_path, &bytes).await?;
        info!(output = %output_path.display(), bytes = bytes.len(), "Image saved");
        Ok(output_path.to_path_buf())
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<PathBuf, ApiError> {
        debug!(output = %output_path.display(), "Generating image");
        self.request_image(vec![RequestPart::text(prompt)], output_path)
            .await
    }

    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference_image: &Path,
        output_path: &Path,
    ) -> Result<PathBuf, ApiError> {
        debug!(
            output = %output_path.display(),
            reference = %reference_image.display(),
            "Generating image with reference"
        );
        let reference = tokio::fs::read(reference_image).await.map_err(|e| {
            ApiError::ProviderError(format!(
                "Failed to read reference image {:?}: {}",
                reference_image, e
            ))
        })?;
        let parts = vec![
            RequestPart::text(prompt),
            RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type_for(reference_image).to_string(),
                    data: BASE64.encode(reference),
                },
            },
        ];
        self.request_image(parts, output_path).await
    }
}

// Gemini API request/response structures

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl RequestPart {
    fn text(text: &str) -> Self {
        RequestPart::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    image_config: ImageConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

fn extract_image(body: GenerateContentResponse) -> Result<Vec<u8>, ApiError> {
    let mut finish_reason = None;
    for candidate in body.candidates {
        finish_reason = candidate.finish_reason.or(finish_reason);
        let Some(content) = candidate.content else {
            continue;
        };
        if let Some(inline) = content.parts.into_iter().find_map(|p| p.inline_data) {
            return BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| ApiError::ProviderError(format!("Invalid image payload: {}", e)));
        }
    }
    Err(ApiError::ProviderNoImage(format!(
        "response contained no image (finish reason: {})",
        finish_reason.as_deref().unwrap_or("unknown")
    )))
}

async fn write_image(output_path: &Path, bytes: &[u8]) -> Result<(), ApiError> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to create output directory: {}", e))
        })?;
    }
    tokio::fs::write(output_path, bytes).await.map_err(|e| {
        ApiError::ProviderError(format!("Failed to write image {:?}: {}", output_path, e))
    })
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}
