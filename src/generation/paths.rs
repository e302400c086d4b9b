//! Artifact layout for generated style and page images.
//!
//! Paths are a pure function of workspace, project and index so a resumed job
//! recomputes exactly the path an interrupted one was writing.

use crate::types::{PageNumber, ProjectId, WorkspaceId};
use std::path::PathBuf;

/// Root of all generated artifacts
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/workspace_{w}/ppt_{p}`
    pub fn project_dir(&self, workspace_id: WorkspaceId, project_id: ProjectId) -> PathBuf {
        self.root
            .join(format!("workspace_{}", workspace_id))
            .join(format!("ppt_{}", project_id))
    }

    pub fn styles_dir(&self, workspace_id: WorkspaceId, project_id: ProjectId) -> PathBuf {
        self.project_dir(workspace_id, project_id).join("styles")
    }

    pub fn pages_dir(&self, workspace_id: WorkspaceId, project_id: ProjectId) -> PathBuf {
        self.project_dir(workspace_id, project_id).join("pages")
    }

    pub fn style_path(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        template_index: usize,
    ) -> PathBuf {
        self.styles_dir(workspace_id, project_id)
            .join(format!("style_{}.png", template_index))
    }

    pub fn page_path(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        page_number: PageNumber,
    ) -> PathBuf {
        self.pages_dir(workspace_id, project_id)
            .join(page_file_name(page_number))
    }
}

/// `page_{NNN}.png`, zero-padded to three digits
pub fn page_file_name(page_number: PageNumber) -> String {
    format!("page_{:03}.png", page_number)
}
