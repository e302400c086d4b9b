//! CLI route: single route table and run context. Dispatches to the generation API
//! and presentation.

use crate::api::{GenerateOutcome, GenerationApi, ProjectImport};
use crate::config::{ConfigLoader, SlidegenConfig};
use crate::error::ApiError;
use crate::generation::{PageOverrides, RecoveryReport, ResumeOutcome};
use crate::provider::{GeminiImageClient, ImageGenerator};
use crate::types::ProjectId;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::cli::parse::{Commands, ProjectCommands, StyleCommands};
use crate::cli::presentation::{
    format_page_records, format_progress_event, format_project_list_text, format_project_text,
    format_prompts_text, format_recovery_report, format_style_status_text,
};

/// Runtime context for CLI execution: workspace, config, the tokio runtime that
/// owns job tasks, and the generation API.
pub struct RunContext {
    runtime: Runtime,
    api: GenerationApi,
    provider_ready: bool,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        let runtime = Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let (generator, provider_ready) = build_generator(&config)?;
        let api = {
            let _guard = runtime.enter();
            GenerationApi::open(&config, &workspace_root, generator)?
        };

        Ok(Self {
            runtime,
            api,
            provider_ready,
        })
    }

    /// Reference to the underlying generation API.
    pub fn api(&self) -> &GenerationApi {
        &self.api
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let mut recovered = RecoveryReport::default();
        if launches_jobs(command) {
            self.require_provider()?;
            if !matches!(command, Commands::Recover) {
                recovered = self.recover_before_work();
            }
        }

        match command {
            Commands::Project { command } => self.handle_project_command(command),
            Commands::Styles { command } => self.handle_style_command(command),
            Commands::Generate {
                project_id,
                overrides,
            } => {
                let overrides = parse_overrides(overrides.as_deref())?;
                if recovered.resumed.contains(project_id) {
                    eprintln!("Generation resumed for project {}", project_id);
                    return self.follow_job(*project_id);
                }
                let outcome = self.api.generate(*project_id, overrides)?;
                let verb = match outcome {
                    GenerateOutcome::Started => "started",
                    GenerateOutcome::Resumed => "resumed",
                };
                eprintln!("Generation {} for project {}", verb, project_id);
                self.follow_job(*project_id)
            }
            Commands::Resume { project_id } if recovered.resumed.contains(project_id) => {
                self.follow_job(*project_id)
            }
            Commands::Resume { project_id } => match self.api.resume(*project_id)? {
                ResumeOutcome::Resumed => self.follow_job(*project_id),
                ResumeOutcome::NotGenerating => Ok(format!(
                    "Project {} is not generating; nothing to resume",
                    project_id
                )),
                ResumeOutcome::AlreadyComplete => Ok(format!(
                    "Project {} had no unfinished pages; marked completed",
                    project_id
                )),
            },
            Commands::Progress { project_id, format } => {
                let project = self.api.project(*project_id)?;
                let records = self.api.page_records(*project_id)?;
                if format == "json" {
                    to_json(&json!({ "project": project, "pages": records }))
                } else {
                    Ok(format!(
                        "Project {} is {}\n{}",
                        project.id,
                        project.status,
                        format_page_records(&records)
                    ))
                }
            }
            Commands::Regenerate {
                project_id,
                page_number,
                prompt,
            } => {
                if recovered.resumed.contains(project_id) {
                    // let the recovered job release the project first
                    self.runtime.block_on(self.api.wait_idle());
                }
                let record = self.runtime.block_on(self.api.regenerate_page(
                    *project_id,
                    *page_number,
                    prompt.as_deref(),
                ))?;
                Ok(format!(
                    "Page {} regenerated: {}",
                    record.page_number,
                    record
                        .image_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ))
            }
            Commands::Prompts { project_id, format } => {
                let prompts = self.api.page_prompts(*project_id)?;
                if format == "json" {
                    to_json(&prompts)
                } else {
                    Ok(format_prompts_text(&prompts))
                }
            }
            Commands::Export { project_id, dest } => {
                let exported = self
                    .runtime
                    .block_on(self.api.export_pages(*project_id, dest))?;
                Ok(format!("Exported {} page(s) to {}", exported, dest.display()))
            }
            Commands::Recover => {
                let report = self.api.recover_interrupted()?;
                self.runtime.block_on(self.api.wait_idle());
                Ok(format_recovery_report(&report))
            }
        }
    }

    fn handle_project_command(&self, command: &ProjectCommands) -> Result<String, ApiError> {
        match command {
            ProjectCommands::Import { file } => {
                let import = read_import(file)?;
                let project_id = self.api.import_project(&import)?;
                Ok(format!(
                    "Created project {} with {} outline page(s)",
                    project_id,
                    import.pages.len()
                ))
            }
            ProjectCommands::Show { project_id, format } => {
                let project = self.api.project(*project_id)?;
                let records = self.api.page_records(*project_id)?;
                if format == "json" {
                    let outline = self.api.outline(*project_id)?;
                    to_json(&json!({ "project": project, "outline": outline, "pages": records }))
                } else {
                    Ok(format_project_text(&project, &records))
                }
            }
            ProjectCommands::List { format } => {
                let projects = self.api.list_projects()?;
                if format == "json" {
                    to_json(&projects)
                } else {
                    Ok(format_project_list_text(&projects))
                }
            }
        }
    }

    fn handle_style_command(&self, command: &StyleCommands) -> Result<String, ApiError> {
        match command {
            StyleCommands::Generate { project_id, prompt } => {
                self.api.generate_styles(*project_id, prompt.clone())?;
                self.runtime.block_on(self.api.wait_idle());
                self.style_status(*project_id)
            }
            StyleCommands::Status { project_id } => self.style_status(*project_id),
            StyleCommands::Select { project_id, index } => {
                self.api.select_style(*project_id, *index)?;
                Ok(format!("Selected style {} for project {}", index, project_id))
            }
        }
    }

    fn style_status(&self, project_id: ProjectId) -> Result<String, ApiError> {
        let project = self.api.project(project_id)?;
        let templates = self.api.style_templates(project_id)?;
        Ok(format_style_status_text(
            &self.api.style_progress(project_id),
            &templates,
            project.selected_style_index,
        ))
    }

    /// Print snapshots until the job is terminal, then report the persisted result.
    /// The process owns the job, so it stays alive until every task is done.
    fn follow_job(&self, project_id: ProjectId) -> Result<String, ApiError> {
        self.runtime.block_on(async {
            let mut events = Box::pin(self.api.subscribe_progress(project_id));
            while let Some(event) = events.next().await {
                eprintln!("{}", format_progress_event(&event));
            }
            self.api.wait_idle().await;
        });
        let project = self.api.project(project_id)?;
        let records = self.api.page_records(project_id)?;
        Ok(format_project_text(&project, &records))
    }

    fn recover_before_work(&self) -> RecoveryReport {
        match self.api.recover_interrupted() {
            Ok(report) => {
                if !report.interrupted.is_empty() {
                    info!(resumed = report.resumed.len(), "Recovered interrupted jobs");
                    eprintln!("{}", format_recovery_report(&report));
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "Recovery scan failed");
                RecoveryReport::default()
            }
        }
    }

    fn require_provider(&self) -> Result<(), ApiError> {
        if self.provider_ready {
            Ok(())
        } else {
            Err(ApiError::ConfigError(
                "No image provider API key (set provider.api_key or GEMINI_API_KEY)".to_string(),
            ))
        }
    }
}

fn launches_jobs(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Generate { .. }
            | Commands::Resume { .. }
            | Commands::Regenerate { .. }
            | Commands::Recover
            | Commands::Styles {
                command: StyleCommands::Generate { .. }
            }
    )
}

fn build_generator(config: &SlidegenConfig) -> Result<(Arc<dyn ImageGenerator>, bool), ApiError> {
    if config.provider.resolve_api_key().is_none() {
        return Ok((Arc::new(UnconfiguredProvider), false));
    }
    let client = GeminiImageClient::new(&config.provider, config.generation.api_timeout())?;
    Ok((Arc::new(client), true))
}

/// Stands in for the image provider when no credentials are configured; commands
/// that render images are rejected before reaching it.
struct UnconfiguredProvider;

#[async_trait]
impl ImageGenerator for UnconfiguredProvider {
    async fn generate(&self, _prompt: &str, _output_path: &Path) -> Result<PathBuf, ApiError> {
        Err(ApiError::ProviderAuthFailed("no API key configured".to_string()))
    }

    async fn generate_with_reference(
        &self,
        _prompt: &str,
        _reference_image: &Path,
        _output_path: &Path,
    ) -> Result<PathBuf, ApiError> {
        Err(ApiError::ProviderAuthFailed("no API key configured".to_string()))
    }
}

fn read_import(path: &Path) -> Result<ProjectImport, ApiError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ApiError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        ApiError::InvalidInput(format!("Invalid project file {}: {}", path.display(), e))
    })
}

fn parse_overrides(raw: Option<&str>) -> Result<PageOverrides, ApiError> {
    match raw {
        None => Ok(PageOverrides::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid --overrides JSON: {}", e))),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InvalidInput(format!("Failed to serialize output: {}", e)))
}
