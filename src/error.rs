//! Error types for the slide generation pipeline.

use crate::types::{PageNumber, ProjectId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Page record not found: project {project_id}, page {page_number}")]
    PageRecordNotFound {
        project_id: ProjectId,
        page_number: PageNumber,
    },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the generation API and its collaborators
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Outline not found for project {0}")]
    OutlineMissing(ProjectId),

    #[error("Page {page_number} not found in project {project_id}")]
    PageNotFound {
        project_id: ProjectId,
        page_number: PageNumber,
    },

    #[error("Invalid style index {index} (must be below {available})")]
    InvalidStyleIndex { index: usize, available: usize },

    #[error("A generation job is already running for project {0}")]
    JobAlreadyRunning(ProjectId),

    #[error("Remote call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider returned no image: {0}")]
    ProviderNoImage(String),

    #[error("Style template {index} generation failed: {reason}")]
    StyleGenerationFailed { index: usize, reason: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        ))
    }
}
