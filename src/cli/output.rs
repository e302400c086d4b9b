//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output, with a hint where the
/// next step is obvious.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::JobAlreadyRunning(project_id) => format!(
            "{}\nhint: check `slidegen progress {}` and retry once it finishes",
            e, project_id
        ),
        ApiError::OutlineMissing(_) => {
            format!("{}\nhint: import the project with a non-empty \"pages\" list", e)
        }
        ApiError::ProviderAuthFailed(_) => {
            format!("{}\nhint: set provider.api_key or GEMINI_API_KEY", e)
        }
        _ => e.to_string(),
    }
}
