//! Shared identifiers and lifecycle enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Project identifier (assigned by the project store)
pub type ProjectId = u64;

/// Parent workspace identifier
pub type WorkspaceId = u64;

/// 1-based outline page number
pub type PageNumber = u32;

/// Number of candidate styles produced per style-set run
pub const STYLE_SET_SIZE: usize = 3;

/// Project lifecycle status.
///
/// `draft` → `outline_generated` → `style_selected` → `generating` → {`completed`, `failed`}.
/// `generating` is re-entered whenever a job resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    OutlineGenerated,
    StyleSelected,
    Generating,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::OutlineGenerated => "outline_generated",
            ProjectStatus::StyleSelected => "style_selected",
            ProjectStatus::Generating => "generating",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page generation status stored on a page record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Pending,
    Completed,
    Failed,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::Completed => "completed",
            PageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by an in-memory job progress entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a style-set generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleRunStatus {
    Idle,
    Generating,
    Completed,
    Failed,
}

impl StyleRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StyleRunStatus::Idle => "idle",
            StyleRunStatus::Generating => "generating",
            StyleRunStatus::Completed => "completed",
            StyleRunStatus::Failed => "failed",
        }
    }
}
