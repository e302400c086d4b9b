//! Page Generation Job
//!
//! The resumable unit of work. A run renders every outline page whose record is
//! not yet `completed`, strictly in page-number order, persisting each page's
//! outcome before moving on. A page that exhausts its retries is recorded as
//! `failed` and the run continues; only bookkeeping errors (store I/O, artifact
//! directories) fail the job as a whole.
//!
//! Page records are created lazily: a first run creates one per outline page, a
//! resumed run reuses the existing set.

use crate::error::{ApiError, StorageError};
use crate::generation::prompt::page_content;
use crate::generation::GenerationContext;
use crate::store::{OutlinePage, PageOutcome, PageRecord, Project};
use crate::types::{PageNumber, ProjectId, ProjectStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Per-page custom prompt text, appended to the page description
pub type PageOverrides = HashMap<PageNumber, String>;

/// Counts reported by a finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSummary {
    /// Pages rendered successfully during this run
    pub generated: u32,
    /// Pages that exhausted their retries during this run
    pub failed: u32,
    /// Pages skipped because an earlier run completed them
    pub skipped: u32,
}

pub struct PageGenerationJob {
    ctx: GenerationContext,
}

impl PageGenerationJob {
    pub fn new(ctx: GenerationContext) -> Self {
        Self { ctx }
    }

    /// Run the job to completion.
    ///
    /// Returns `None` when the project or its outline does not exist (nothing is
    /// touched in that case). Structural failures mark the project `failed` and
    /// are recorded in the registry before being returned.
    pub async fn run(
        &self,
        project_id: ProjectId,
        overrides: &PageOverrides,
    ) -> Result<Option<JobSummary>, ApiError> {
        match self.execute(project_id, overrides).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(project_id, error = %err, "Page generation job failed");
                if let Err(status_err) = self
                    .ctx
                    .store
                    .update_project_status(project_id, ProjectStatus::Failed)
                {
                    error!(project_id, error = %status_err, "Could not mark project failed");
                }
                self.ctx.registry.fail(project_id, err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        project_id: ProjectId,
        overrides: &PageOverrides,
    ) -> Result<Option<JobSummary>, ApiError> {
        let store = &self.ctx.store;
        let Some(project) = store.get_project(project_id)? else {
            debug!(project_id, "Project not found, nothing to generate");
            return Ok(None);
        };
        let outline = store.get_outline_pages(project_id)?;
        if outline.is_empty() {
            debug!(project_id, "Project has no outline, nothing to generate");
            return Ok(None);
        }

        let style_reference = resolve_style_reference(&self.ctx, &project)?;
        tokio::fs::create_dir_all(self.ctx.layout.pages_dir(project.workspace_id, project_id))
            .await
            .map_err(StorageError::IoError)?;

        let records = ensure_page_records(&self.ctx, project_id, &outline)?;

        store.update_project_status(project_id, ProjectStatus::Generating)?;

        let completed = records.values().filter(|r| r.is_completed()).count() as u32;
        let total = outline.len() as u32;
        self.ctx.registry.begin(project_id, completed, total);
        info!(project_id, completed, total, "Page generation started");

        let mut summary = JobSummary::default();
        for page in &outline {
            if records
                .get(&page.page_number)
                .map(PageRecord::is_completed)
                .unwrap_or(false)
            {
                debug!(project_id, page_number = page.page_number, "Page already completed, skipping");
                summary.skipped += 1;
                continue;
            }

            self.ctx.registry.set_current_page(project_id, page.page_number);
            info!(project_id, page_number = page.page_number, total, "Generating page");

            let custom = overrides.get(&page.page_number).map(String::as_str);
            match render_page(&self.ctx, &project, page, custom, style_reference.as_deref()).await {
                Ok(image_path) => {
                    store.update_page_record(
                        project_id,
                        page.page_number,
                        PageOutcome::Completed {
                            image_path: &image_path,
                        },
                    )?;
                    summary.generated += 1;
                    info!(project_id, page_number = page.page_number, "Page completed");
                }
                Err(err) => {
                    let message = err.to_string();
                    store.update_page_record(
                        project_id,
                        page.page_number,
                        PageOutcome::Failed { error: &message },
                    )?;
                    summary.failed += 1;
                    warn!(project_id, page_number = page.page_number, error = %message, "Page failed");
                }
            }
        }

        store.update_project_status(project_id, ProjectStatus::Completed)?;
        self.ctx.registry.complete(project_id);
        info!(
            project_id,
            generated = summary.generated,
            failed = summary.failed,
            skipped = summary.skipped,
            "Page generation finished"
        );
        Ok(Some(summary))
    }
}

/// Render one page through the retry wrapper, returning the written image path
pub(crate) async fn render_page(
    ctx: &GenerationContext,
    project: &Project,
    page: &OutlinePage,
    custom_prompt: Option<&str>,
    style_reference: Option<&Path>,
) -> Result<PathBuf, ApiError> {
    let prompt = ctx
        .templates
        .page_prompt(&page_content(page, custom_prompt), style_reference.is_some());
    let output = ctx
        .layout
        .page_path(project.workspace_id, project.id, page.page_number);
    let label = format!("page {} of project {}", page.page_number, project.id);
    let generator = &ctx.generator;
    let (prompt, output) = (&prompt, &output);

    ctx.retry
        .run(&label, move || async move {
            match style_reference {
                Some(reference) => {
                    generator
                        .generate_with_reference(prompt, reference, output)
                        .await
                }
                None => generator.generate(prompt, output).await,
            }
        })
        .await
}

/// Image of the selected style template, if one is selected and still on disk
pub(crate) fn resolve_style_reference(
    ctx: &GenerationContext,
    project: &Project,
) -> Result<Option<PathBuf>, ApiError> {
    let Some(selected) = project.selected_style_index else {
        return Ok(None);
    };
    let template = ctx
        .store
        .get_style_templates(project.id)?
        .into_iter()
        .find(|t| t.template_index == selected);
    match template {
        Some(template) if template.image_path.exists() => Ok(Some(template.image_path)),
        Some(template) => {
            warn!(
                project_id = project.id,
                path = %template.image_path.display(),
                "Selected style image is missing, generating without reference"
            );
            Ok(None)
        }
        None => {
            warn!(project_id = project.id, selected, "Selected style template not found");
            Ok(None)
        }
    }
}

/// Load the project's page records keyed by page number, creating one per outline
/// page when the project has none
pub(crate) fn ensure_page_records(
    ctx: &GenerationContext,
    project_id: ProjectId,
    outline: &[OutlinePage],
) -> Result<HashMap<PageNumber, PageRecord>, ApiError> {
    let store = &ctx.store;
    let mut records = store.get_page_records(project_id)?;
    if records.is_empty() {
        info!(project_id, pages = outline.len(), "First run, creating page records");
        for page in outline {
            store.add_page_record(project_id, page.page_number)?;
        }
        records = store.get_page_records(project_id)?;
    } else {
        debug!(project_id, records = records.len(), "Reusing existing page records");
    }

    let mut by_page: HashMap<PageNumber, PageRecord> = records
        .into_iter()
        .map(|record| (record.page_number, record))
        .collect();
    // outline pages added after the first run still need a record
    for page in outline {
        if !by_page.contains_key(&page.page_number) {
            store.add_page_record(project_id, page.page_number)?;
            by_page.insert(page.page_number, PageRecord::pending(project_id, page.page_number));
        }
    }
    Ok(by_page)
}
