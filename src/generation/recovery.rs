//! Recovery Scanner
//!
//! Run once at startup, before new work is accepted: every project still marked
//! `generating` was interrupted mid-job, so it is handed to the same resume path an
//! explicit resume request uses. One project's failure never stops the scan.

use crate::error::ApiError;
use crate::generation::ResumeOutcome;
use crate::store::ProjectStore;
use crate::types::{ProjectId, ProjectStatus};
use tracing::{error, info, warn};

/// Something that can resume an interrupted project
pub trait JobResumer: Send + Sync {
    fn resume(&self, project_id: ProjectId) -> Result<ResumeOutcome, ApiError>;
}

/// What a scan found and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Projects found in `generating`
    pub interrupted: Vec<ProjectId>,
    /// Projects whose job was relaunched
    pub resumed: Vec<ProjectId>,
    /// Projects that needed no job (e.g. all pages were already done)
    pub settled: Vec<ProjectId>,
    /// Projects whose recovery failed, with the error
    pub failed: Vec<(ProjectId, String)>,
}

pub struct RecoveryScanner<'a> {
    store: &'a dyn ProjectStore,
}

impl<'a> RecoveryScanner<'a> {
    pub fn new(store: &'a dyn ProjectStore) -> Self {
        Self { store }
    }

    /// Scan all projects and resume the interrupted ones
    pub fn scan<R: JobResumer + ?Sized>(&self, resumer: &R) -> Result<RecoveryReport, ApiError> {
        let mut report = RecoveryReport::default();
        let projects = self.store.list_projects()?;

        for project in projects
            .into_iter()
            .filter(|p| p.status == ProjectStatus::Generating)
        {
            info!(project_id = project.id, title = %project.title, "Found interrupted generation job");
            report.interrupted.push(project.id);

            match resumer.resume(project.id) {
                Ok(ResumeOutcome::Resumed) => {
                    info!(project_id = project.id, "Generation job resumed");
                    report.resumed.push(project.id);
                }
                Ok(outcome) => {
                    info!(project_id = project.id, outcome = ?outcome, "Interrupted project needed no job");
                    report.settled.push(project.id);
                }
                Err(err) => {
                    error!(project_id = project.id, error = %err, "Failed to recover project");
                    report.failed.push((project.id, err.to_string()));
                }
            }
        }

        if report.interrupted.is_empty() {
            info!("No interrupted generation jobs found");
        } else if !report.failed.is_empty() {
            warn!(
                interrupted = report.interrupted.len(),
                failed = report.failed.len(),
                "Recovery finished with failures"
            );
        }
        Ok(report)
    }
}
