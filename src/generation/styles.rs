//! Style-Set Generator
//!
//! Replaces a project's style templates with a fresh set of three candidates.
//! Old templates are deleted before the first call; the first archetype whose
//! call exhausts its retries aborts the run, leaving only the templates that
//! succeeded before it.

use crate::error::{ApiError, StorageError};
use crate::generation::prompt::style_description;
use crate::generation::GenerationContext;
use crate::store::{Project, StyleTemplate};
use crate::types::{StyleRunStatus, STYLE_SET_SIZE};
use tracing::{error, info};

/// Fixed style archetypes, one template each
pub const STYLE_ARCHETYPES: [&str; STYLE_SET_SIZE] = [
    "Modern minimalist style with generous whitespace and geometric shapes",
    "Professional business style with a dark background and gold accents",
    "Creative, lively style with bright colors and dynamic elements",
];

pub struct StyleSetGenerator {
    ctx: GenerationContext,
}

impl StyleSetGenerator {
    pub fn new(ctx: GenerationContext) -> Self {
        Self { ctx }
    }

    /// Generate the full style set for `project`, reporting progress in the registry
    pub async fn generate(
        &self,
        project: &Project,
        augmentation: Option<&str>,
    ) -> Result<Vec<StyleTemplate>, ApiError> {
        let project_id = project.id;
        let registry = &self.ctx.registry;
        registry.style_begin(project_id);
        info!(project_id, augmentation = ?augmentation, "Generating style templates");

        let result = self.generate_inner(project, augmentation).await;
        match &result {
            Ok(templates) => {
                registry.style_complete(project_id);
                info!(project_id, count = templates.len(), "Style templates generated");
            }
            Err(err) => {
                // step failures already carry a specific message
                if registry.style_progress(project_id).status != StyleRunStatus::Failed {
                    registry.style_fail(project_id, err.to_string());
                }
                error!(project_id, error = %err, "Style template generation failed");
            }
        }
        result
    }

    async fn generate_inner(
        &self,
        project: &Project,
        augmentation: Option<&str>,
    ) -> Result<Vec<StyleTemplate>, ApiError> {
        let project_id = project.id;
        self.ctx.store.delete_style_templates(project_id)?;

        let styles_dir = self.ctx.layout.styles_dir(project.workspace_id, project_id);
        tokio::fs::create_dir_all(&styles_dir)
            .await
            .map_err(StorageError::IoError)?;

        let mut templates = Vec::with_capacity(STYLE_SET_SIZE);
        for (index, archetype) in STYLE_ARCHETYPES.iter().enumerate() {
            let step = index + 1;
            self.ctx.registry.style_step(
                project_id,
                step,
                format!("generating style {}/{}", step, STYLE_SET_SIZE),
            );

            let prompt = self
                .ctx
                .templates
                .style_prompt(&style_description(archetype, augmentation));
            let output = self
                .ctx
                .layout
                .style_path(project.workspace_id, project_id, index);
            let label = format!("style {} of project {}", index, project_id);
            let generator = &self.ctx.generator;
            let (prompt, output) = (&prompt, &output);

            let image_path = match self
                .ctx
                .retry
                .run(&label, move || generator.generate(prompt, output))
                .await
            {
                Ok(path) => path,
                Err(err) => {
                    self.ctx.registry.style_fail(
                        project_id,
                        format!("style {} failed: {}", step, err),
                    );
                    return Err(ApiError::StyleGenerationFailed {
                        index,
                        reason: err.to_string(),
                    });
                }
            };

            let template = self
                .ctx
                .store
                .add_style_template(project_id, index, &image_path)?;
            info!(project_id, template_index = index, path = %image_path.display(), "Style template saved");
            templates.push(template);
        }
        Ok(templates)
    }
}
