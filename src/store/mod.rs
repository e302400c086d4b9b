//! Project State Store
//!
//! Durable records for generation projects: the project row, its outline pages,
//! its style-template candidates and its per-page generation records. The
//! orchestrator only relies on single-row reads/writes, bulk per-project deletes,
//! and page-ordered retrieval.

pub mod persistence;

pub use persistence::SledProjectStore;

use crate::error::StorageError;
use crate::types::{PageNumber, PageStatus, ProjectId, ProjectStatus, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One generation project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub user_prompt: String,
    pub expected_pages: u32,
    pub status: ProjectStatus,
    pub selected_style_index: Option<usize>,
    /// Custom prompt text per page from the last accepted start
    #[serde(default)]
    pub page_overrides: HashMap<PageNumber, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub user_prompt: String,
    #[serde(default = "default_expected_pages")]
    pub expected_pages: u32,
}

fn default_expected_pages() -> u32 {
    10
}

/// One planned slide of a project's outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlinePage {
    pub project_id: ProjectId,
    pub page_number: PageNumber,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

/// One candidate visual style image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleTemplate {
    pub project_id: ProjectId,
    pub template_index: usize,
    pub image_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Persisted generation state of one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub project_id: ProjectId,
    pub page_number: PageNumber,
    pub status: PageStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub image_path: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl PageRecord {
    pub fn pending(project_id: ProjectId, page_number: PageNumber) -> Self {
        Self {
            project_id,
            page_number,
            status: PageStatus::Pending,
            retry_count: 0,
            error_message: None,
            image_path: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PageStatus::Completed
    }
}

/// Outcome written to a page record after a generation attempt
#[derive(Debug, Clone)]
pub enum PageOutcome<'a> {
    Completed { image_path: &'a Path },
    Failed { error: &'a str },
}

/// Project store interface
///
/// Every method is an atomic single-row operation except the `delete_*` bulk
/// operations. `get_outline_pages` and `get_page_records` return rows ordered by
/// ascending page number.
pub trait ProjectStore: Send + Sync {
    fn create_project(&self, project: &NewProject) -> Result<ProjectId, StorageError>;
    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, StorageError>;
    fn list_projects(&self) -> Result<Vec<Project>, StorageError>;
    fn update_project_status(
        &self,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), StorageError>;
    fn update_project_style(
        &self,
        project_id: ProjectId,
        style_index: usize,
    ) -> Result<(), StorageError>;
    fn update_project_overrides(
        &self,
        project_id: ProjectId,
        overrides: &HashMap<PageNumber, String>,
    ) -> Result<(), StorageError>;

    fn put_outline_page(&self, page: &OutlinePage) -> Result<(), StorageError>;
    fn get_outline_pages(&self, project_id: ProjectId) -> Result<Vec<OutlinePage>, StorageError>;

    fn add_style_template(
        &self,
        project_id: ProjectId,
        template_index: usize,
        image_path: &Path,
    ) -> Result<StyleTemplate, StorageError>;
    fn get_style_templates(&self, project_id: ProjectId) -> Result<Vec<StyleTemplate>, StorageError>;
    fn delete_style_templates(&self, project_id: ProjectId) -> Result<(), StorageError>;

    fn add_page_record(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
    ) -> Result<(), StorageError>;
    fn get_page_records(&self, project_id: ProjectId) -> Result<Vec<PageRecord>, StorageError>;
    fn update_page_record(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
        outcome: PageOutcome<'_>,
    ) -> Result<(), StorageError>;
    fn increment_page_retry_count(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
    ) -> Result<u32, StorageError>;
    fn delete_page_records(&self, project_id: ProjectId) -> Result<(), StorageError>;
}
