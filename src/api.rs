//! Generation API
//!
//! Entry points of the pipeline: start and resume page jobs, generate and select
//! styles, regenerate single pages, observe progress, and recover interrupted
//! work. Caller misuse (unknown project, missing outline, bad style index, a job
//! already running) is rejected synchronously; accepted work runs on tracked
//! tokio tasks bounded by `max_concurrent_jobs`.

use crate::config::{GenerationConfig, SlidegenConfig};
use crate::error::{ApiError, StorageError};
use crate::generation::job::{ensure_page_records, render_page, resolve_style_reference};
use crate::generation::paths::page_file_name;
use crate::generation::prompt::preview_prompts;
use crate::generation::{
    ArtifactLayout, GenerationContext, JobClaim, JobKind, JobRegistry, JobResumer,
    PageGenerationJob, PageOverrides, PagePrompt, ProgressChannel, ProgressEvent, ProgressLookup,
    RecoveryReport, RecoveryScanner, ResumeOutcome, StyleProgress, StyleSetGenerator,
};
use crate::provider::{ImageGenerator, PromptTemplates};
use crate::retry::RetryPolicy;
use crate::store::{
    NewProject, OutlinePage, PageOutcome, PageRecord, Project, ProjectStore, SledProjectStore,
    StyleTemplate,
};
use crate::types::{PageNumber, ProjectId, ProjectStatus, WorkspaceId, STYLE_SET_SIZE};
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a start-or-resume request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    Started,
    Resumed,
}

/// A project plus its outline, as produced by the outline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectImport {
    pub workspace_id: WorkspaceId,
    pub title: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub pages: Vec<ImportedPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedPage {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

/// Generation API service
pub struct GenerationApi {
    ctx: GenerationContext,
    progress: ProgressChannel,
    /// Bounds how many style/page jobs execute at once
    workers: Arc<Semaphore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
}

impl GenerationApi {
    /// Build the API on an existing context. Must be called within a tokio runtime.
    pub fn new(ctx: GenerationContext, config: &GenerationConfig) -> Result<Self, ApiError> {
        let runtime = Handle::try_current().map_err(|e| {
            ApiError::ConfigError(format!("Generation API requires a tokio runtime: {}", e))
        })?;
        let progress = ProgressChannel::new(
            Arc::clone(&ctx.registry),
            config.progress_poll_interval(),
            config.progress_start_wait(),
        );
        Ok(Self {
            ctx,
            progress,
            workers: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            tasks: Mutex::new(Vec::new()),
            runtime,
        })
    }

    /// Open the workspace's store and artifact root and build the API
    pub fn open(
        config: &SlidegenConfig,
        workspace_root: &Path,
        generator: Arc<dyn ImageGenerator>,
    ) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let store_path = workspace_root.join(&config.storage.store_path);
        std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
        let store = SledProjectStore::new(&store_path)?;
        let prompts_dir = config
            .provider
            .prompts_dir
            .as_ref()
            .map(|dir| workspace_root.join(dir));
        let templates = PromptTemplates::load(prompts_dir.as_deref())?;

        let ctx = GenerationContext {
            store: Arc::new(store),
            generator,
            templates: Arc::new(templates),
            layout: ArtifactLayout::new(workspace_root.join(&config.storage.generated_folder)),
            retry: RetryPolicy::from_config(&config.generation),
            registry: Arc::new(JobRegistry::new(config.generation.registry_retention())),
        };
        debug!(store = %store_path.display(), "Generation API opened");
        Self::new(ctx, &config.generation)
    }

    pub fn context(&self) -> &GenerationContext {
        &self.ctx
    }

    // Project data

    /// Create a project with its outline; status becomes `outline_generated`
    /// when the outline is non-empty
    pub fn import_project(&self, import: &ProjectImport) -> Result<ProjectId, ApiError> {
        let store = &self.ctx.store;
        let project_id = store.create_project(&NewProject {
            workspace_id: import.workspace_id,
            title: import.title.clone(),
            user_prompt: import.user_prompt.clone(),
            expected_pages: import.pages.len() as u32,
        })?;
        for (index, page) in import.pages.iter().enumerate() {
            store.put_outline_page(&OutlinePage {
                project_id,
                page_number: index as PageNumber + 1,
                title: page.title.clone(),
                content: page.content.clone(),
                image_prompt: page.image_prompt.clone(),
            })?;
        }
        if !import.pages.is_empty() {
            store.update_project_status(project_id, ProjectStatus::OutlineGenerated)?;
        }
        info!(project_id, pages = import.pages.len(), "Project imported");
        Ok(project_id)
    }

    pub fn project(&self, project_id: ProjectId) -> Result<Project, ApiError> {
        self.ctx
            .store
            .get_project(project_id)?
            .ok_or(ApiError::ProjectNotFound(project_id))
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        Ok(self.ctx.store.list_projects()?)
    }

    pub fn outline(&self, project_id: ProjectId) -> Result<Vec<OutlinePage>, ApiError> {
        Ok(self.ctx.store.get_outline_pages(project_id)?)
    }

    pub fn page_records(&self, project_id: ProjectId) -> Result<Vec<PageRecord>, ApiError> {
        Ok(self.ctx.store.get_page_records(project_id)?)
    }

    pub fn style_templates(&self, project_id: ProjectId) -> Result<Vec<StyleTemplate>, ApiError> {
        Ok(self.ctx.store.get_style_templates(project_id)?)
    }

    // Styles

    /// Launch a style-set generation run for the project
    pub fn generate_styles(
        &self,
        project_id: ProjectId,
        augmentation: Option<String>,
    ) -> Result<(), ApiError> {
        let project = self.project(project_id)?;
        let claim = self
            .ctx
            .registry
            .try_claim(project_id, JobKind::Styles)
            .ok_or(ApiError::JobAlreadyRunning(project_id))?;
        self.ctx.registry.prune_expired();

        let generator = StyleSetGenerator::new(self.ctx.clone());
        self.spawn_tracked(claim, async move {
            // failures are recorded in the style progress record
            let _ = generator.generate(&project, augmentation.as_deref()).await;
        });
        info!(project_id, "Style generation launched");
        Ok(())
    }

    pub fn style_progress(&self, project_id: ProjectId) -> StyleProgress {
        self.ctx.registry.style_progress(project_id)
    }

    /// Select one of the generated styles; status becomes `style_selected`
    pub fn select_style(&self, project_id: ProjectId, style_index: usize) -> Result<(), ApiError> {
        if style_index >= STYLE_SET_SIZE {
            return Err(ApiError::InvalidStyleIndex {
                index: style_index,
                available: STYLE_SET_SIZE,
            });
        }
        self.project(project_id)?;
        self.ctx.store.update_project_style(project_id, style_index)?;
        self.ctx
            .store
            .update_project_status(project_id, ProjectStatus::StyleSelected)?;
        info!(project_id, style_index, "Style selected");
        Ok(())
    }

    // Page jobs

    /// Launch a page generation job.
    ///
    /// Pages already completed by an earlier run are kept. The overrides are
    /// stored with the project so a resumed run renders with the same prompts.
    pub fn start(&self, project_id: ProjectId, overrides: PageOverrides) -> Result<(), ApiError> {
        self.project(project_id)?;
        if self.ctx.store.get_outline_pages(project_id)?.is_empty() {
            return Err(ApiError::OutlineMissing(project_id));
        }
        let claim = self.claim_pages(project_id)?;
        self.ctx
            .store
            .update_project_overrides(project_id, &overrides)?;
        self.launch_job(claim, overrides)
    }

    /// Relaunch an interrupted job.
    ///
    /// Only projects in `generating` are resumed. If none of their pages is pending
    /// or failed the project is marked `completed` instead.
    pub fn resume(&self, project_id: ProjectId) -> Result<ResumeOutcome, ApiError> {
        let project = self.project(project_id)?;
        if project.status != ProjectStatus::Generating {
            debug!(project_id, status = %project.status, "Project not generating, nothing to resume");
            return Ok(ResumeOutcome::NotGenerating);
        }

        let incomplete = self
            .ctx
            .store
            .get_page_records(project_id)?
            .iter()
            .filter(|record| !record.is_completed())
            .count();
        if incomplete == 0 {
            info!(project_id, "All pages already completed, marking project completed");
            self.ctx
                .store
                .update_project_status(project_id, ProjectStatus::Completed)?;
            return Ok(ResumeOutcome::AlreadyComplete);
        }

        let claim = self.claim_pages(project_id)?;
        let overrides = project.page_overrides;
        info!(
            project_id,
            incomplete,
            overrides = overrides.len(),
            "Resuming generation job"
        );
        self.launch_job(claim, overrides)?;
        Ok(ResumeOutcome::Resumed)
    }

    /// Resume when the project is mid-generation, start otherwise
    pub fn generate(
        &self,
        project_id: ProjectId,
        overrides: PageOverrides,
    ) -> Result<GenerateOutcome, ApiError> {
        let project = self.project(project_id)?;
        if project.status == ProjectStatus::Generating
            && self.resume(project_id)?.is_resumed()
        {
            return Ok(GenerateOutcome::Resumed);
        }
        self.start(project_id, overrides)?;
        Ok(GenerateOutcome::Started)
    }

    /// Regenerate one page on the caller's task.
    ///
    /// A failure bumps the page's retry count, records the error and is returned.
    pub async fn regenerate_page(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
        custom_prompt: Option<&str>,
    ) -> Result<PageRecord, ApiError> {
        let project = self.project(project_id)?;
        let outline = self.ctx.store.get_outline_pages(project_id)?;
        let page = outline
            .iter()
            .find(|page| page.page_number == page_number)
            .ok_or(ApiError::PageNotFound {
                project_id,
                page_number,
            })?;
        let _claim = self.claim_pages(project_id)?;

        ensure_page_records(&self.ctx, project_id, &outline)?;
        let style_reference = resolve_style_reference(&self.ctx, &project)?;
        info!(project_id, page_number, "Regenerating page");

        let store = &self.ctx.store;
        match render_page(
            &self.ctx,
            &project,
            page,
            custom_prompt,
            style_reference.as_deref(),
        )
        .await
        {
            Ok(image_path) => {
                store.update_page_record(
                    project_id,
                    page_number,
                    PageOutcome::Completed {
                        image_path: &image_path,
                    },
                )?;
                info!(project_id, page_number, "Page regenerated");
            }
            Err(err) => {
                let retries = store.increment_page_retry_count(project_id, page_number)?;
                let message = err.to_string();
                store.update_page_record(
                    project_id,
                    page_number,
                    PageOutcome::Failed { error: &message },
                )?;
                warn!(project_id, page_number, retries, error = %message, "Page regeneration failed");
                return Err(err);
            }
        }

        store
            .get_page_records(project_id)?
            .into_iter()
            .find(|record| record.page_number == page_number)
            .ok_or_else(|| {
                ApiError::StorageError(StorageError::PageRecordNotFound {
                    project_id,
                    page_number,
                })
            })
    }

    // Progress

    pub fn progress(&self, project_id: ProjectId) -> ProgressLookup {
        self.ctx.registry.lookup(project_id)
    }

    /// Finite stream of progress snapshots for the project
    pub fn subscribe_progress(
        &self,
        project_id: ProjectId,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        self.progress.subscribe(project_id)
    }

    /// The prompt each outline page would be rendered with
    pub fn page_prompts(&self, project_id: ProjectId) -> Result<Vec<PagePrompt>, ApiError> {
        let project = self.project(project_id)?;
        let outline = self.ctx.store.get_outline_pages(project_id)?;
        let uses_reference = resolve_style_reference(&self.ctx, &project)?.is_some();
        Ok(preview_prompts(&self.ctx.templates, &outline, uses_reference))
    }

    /// Copy every completed page image into `dest_dir` as `page_NNN.png`.
    /// Returns the number of files written.
    pub async fn export_pages(&self, project_id: ProjectId, dest_dir: &Path) -> Result<usize, ApiError> {
        self.project(project_id)?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(StorageError::IoError)?;

        let mut exported = 0;
        for record in self.ctx.store.get_page_records(project_id)? {
            let Some(image_path) = record.image_path.as_deref() else {
                continue;
            };
            if !record.is_completed() || !image_path.exists() {
                continue;
            }
            let target = dest_dir.join(page_file_name(record.page_number));
            tokio::fs::copy(image_path, &target)
                .await
                .map_err(StorageError::IoError)?;
            exported += 1;
        }
        info!(project_id, exported, dest = %dest_dir.display(), "Pages exported");
        Ok(exported)
    }

    // Recovery and task tracking

    /// Resume every project left in `generating`
    pub fn recover_interrupted(&self) -> Result<RecoveryReport, ApiError> {
        RecoveryScanner::new(self.ctx.store.as_ref()).scan(self)
    }

    /// Wait for every launched task, including ones launched while waiting
    pub async fn wait_idle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.tasks.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    error!(error = %err, "Generation task aborted");
                }
            }
        }
    }

    fn claim_pages(&self, project_id: ProjectId) -> Result<JobClaim, ApiError> {
        self.ctx
            .registry
            .try_claim(project_id, JobKind::Pages)
            .ok_or(ApiError::JobAlreadyRunning(project_id))
    }

    /// Mark the claimed project `generating` with its page records and a queued
    /// progress entry, then spawn the job. The job may wait for a worker slot, but
    /// from here on it is visible to observers and to the recovery scan.
    fn launch_job(&self, claim: JobClaim, overrides: PageOverrides) -> Result<(), ApiError> {
        let project_id = claim.project_id();
        let outline = self.ctx.store.get_outline_pages(project_id)?;
        let records = ensure_page_records(&self.ctx, project_id, &outline)?;
        self.ctx
            .store
            .update_project_status(project_id, ProjectStatus::Generating)?;

        let completed = records.values().filter(|r| r.is_completed()).count() as u32;
        let registry = Arc::clone(&self.ctx.registry);
        registry.prune_expired();
        registry.begin(project_id, completed, outline.len() as u32);

        let job = PageGenerationJob::new(self.ctx.clone());
        self.spawn_tracked(claim, async move {
            match job.run(project_id, &overrides).await {
                Ok(Some(summary)) => debug!(project_id, summary = ?summary, "Job task finished"),
                Ok(None) => {
                    debug!(project_id, "Job task had nothing to do");
                    registry.forget(project_id);
                }
                // already recorded on the project and in the registry
                Err(_) => {}
            }
        });
        info!(project_id, completed, total = outline.len(), "Page generation job queued");
        Ok(())
    }

    fn spawn_tracked<F>(&self, claim: JobClaim, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let workers = Arc::clone(&self.workers);
        let handle = self.runtime.spawn(async move {
            let _claim = claim;
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Worker pool closed, dropping job");
                    return;
                }
            };
            work.await;
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

impl JobResumer for GenerationApi {
    fn resume(&self, project_id: ProjectId) -> Result<ResumeOutcome, ApiError> {
        GenerationApi::resume(self, project_id)
    }
}
