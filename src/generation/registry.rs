//! Job Registry
//!
//! In-memory table of live job state keyed by project id: page-job progress
//! entries, style-run progress records, and per-project claims that keep a second
//! job from starting while one is active. Everything here is advisory; the project
//! store stays the source of truth for durable status.

use crate::types::{JobStatus, PageNumber, ProjectId, StyleRunStatus, STYLE_SET_SIZE};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Point-in-time view of a page generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub current_page: PageNumber,
    pub total_pages: u32,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Result of looking up a project's job progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLookup {
    /// No job has registered progress for the project
    NotStarted,
    InProgress(JobProgress),
    /// The job finished (completed or failed)
    Terminal(JobProgress),
}

impl ProgressLookup {
    pub fn snapshot(&self) -> Option<&JobProgress> {
        match self {
            ProgressLookup::NotStarted => None,
            ProgressLookup::InProgress(progress) | ProgressLookup::Terminal(progress) => {
                Some(progress)
            }
        }
    }
}

/// Progress of a style-set generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleProgress {
    pub current: usize,
    pub total: usize,
    pub status: StyleRunStatus,
    pub message: String,
}

impl StyleProgress {
    pub fn idle() -> Self {
        Self {
            current: 0,
            total: STYLE_SET_SIZE,
            status: StyleRunStatus::Idle,
            message: "not started".to_string(),
        }
    }
}

/// Which kind of work a claim guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Pages,
    Styles,
}

struct ProgressEntry {
    progress: JobProgress,
    updated_at: Instant,
}

struct StyleEntry {
    progress: StyleProgress,
    updated_at: Instant,
}

impl StyleEntry {
    fn is_terminal(&self) -> bool {
        matches!(
            self.progress.status,
            StyleRunStatus::Completed | StyleRunStatus::Failed
        )
    }
}

/// Shared registry of job progress and claims
pub struct JobRegistry {
    jobs: RwLock<HashMap<ProjectId, ProgressEntry>>,
    styles: RwLock<HashMap<ProjectId, StyleEntry>>,
    claims: Mutex<HashSet<(ProjectId, JobKind)>>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            styles: RwLock::new(HashMap::new()),
            claims: Mutex::new(HashSet::new()),
            retention,
        }
    }

    /// Claim the project for one job of `kind`.
    ///
    /// Returns `None` while another claim of the same kind is held. The claim is
    /// released when the returned guard drops.
    pub fn try_claim(self: &Arc<Self>, project_id: ProjectId, kind: JobKind) -> Option<JobClaim> {
        let inserted = self.claims.lock().insert((project_id, kind));
        if !inserted {
            debug!(project_id, kind = ?kind, "Claim rejected, job already active");
            return None;
        }
        Some(JobClaim {
            registry: Arc::clone(self),
            project_id,
            kind,
        })
    }

    pub fn is_claimed(&self, project_id: ProjectId, kind: JobKind) -> bool {
        self.claims.lock().contains(&(project_id, kind))
    }

    fn release(&self, project_id: ProjectId, kind: JobKind) {
        self.claims.lock().remove(&(project_id, kind));
    }

    // Page job progress

    /// Create or reset the progress entry for a launching job
    pub fn begin(&self, project_id: ProjectId, completed_pages: u32, total_pages: u32) {
        self.jobs.write().insert(
            project_id,
            ProgressEntry {
                progress: JobProgress {
                    current_page: completed_pages,
                    total_pages,
                    status: JobStatus::Generating,
                    error: None,
                },
                updated_at: Instant::now(),
            },
        );
    }

    pub fn set_current_page(&self, project_id: ProjectId, page_number: PageNumber) {
        self.update(project_id, |progress| progress.current_page = page_number);
    }

    /// Mark the job completed; the final page counter reads `total_pages`
    pub fn complete(&self, project_id: ProjectId) {
        self.update(project_id, |progress| {
            progress.current_page = progress.total_pages;
            progress.status = JobStatus::Completed;
        });
    }

    /// Mark the job failed, registering an entry if the job failed before `begin`
    pub fn fail(&self, project_id: ProjectId, error: impl Into<String>) {
        let error = error.into();
        let mut jobs = self.jobs.write();
        let entry = jobs.entry(project_id).or_insert_with(|| ProgressEntry {
            progress: JobProgress {
                current_page: 0,
                total_pages: 0,
                status: JobStatus::Failed,
                error: None,
            },
            updated_at: Instant::now(),
        });
        entry.progress.status = JobStatus::Failed;
        entry.progress.error = Some(error);
        entry.updated_at = Instant::now();
    }

    fn update(&self, project_id: ProjectId, apply: impl FnOnce(&mut JobProgress)) {
        if let Some(entry) = self.jobs.write().get_mut(&project_id) {
            apply(&mut entry.progress);
            entry.updated_at = Instant::now();
        }
    }

    /// Drop the project's progress entry, for a queued job that found nothing to run
    pub fn forget(&self, project_id: ProjectId) {
        self.jobs.write().remove(&project_id);
    }

    pub fn lookup(&self, project_id: ProjectId) -> ProgressLookup {
        match self.jobs.read().get(&project_id) {
            None => ProgressLookup::NotStarted,
            Some(entry) if entry.progress.status.is_terminal() => {
                ProgressLookup::Terminal(entry.progress.clone())
            }
            Some(entry) => ProgressLookup::InProgress(entry.progress.clone()),
        }
    }

    /// Drop terminal job and style entries older than the retention window.
    /// Returns how many entries were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let fresh = |updated_at: Instant| now.duration_since(updated_at) < self.retention;

        let mut jobs = self.jobs.write();
        let mut styles = self.styles.write();
        let before = jobs.len() + styles.len();
        jobs.retain(|_, entry| !entry.progress.status.is_terminal() || fresh(entry.updated_at));
        styles.retain(|_, entry| !entry.is_terminal() || fresh(entry.updated_at));
        let removed = before - jobs.len() - styles.len();
        if removed > 0 {
            debug!(removed, "Pruned expired progress entries");
        }
        removed
    }

    // Style run progress

    pub fn style_begin(&self, project_id: ProjectId) {
        self.styles.write().insert(
            project_id,
            StyleEntry {
                progress: StyleProgress {
                    current: 0,
                    total: STYLE_SET_SIZE,
                    status: StyleRunStatus::Generating,
                    message: "preparing style templates".to_string(),
                },
                updated_at: Instant::now(),
            },
        );
    }

    pub fn style_step(&self, project_id: ProjectId, current: usize, message: impl Into<String>) {
        self.update_style(project_id, |progress| {
            progress.current = current;
            progress.message = message.into();
        });
    }

    pub fn style_complete(&self, project_id: ProjectId) {
        self.update_style(project_id, |progress| {
            progress.status = StyleRunStatus::Completed;
            progress.message = "style templates generated".to_string();
        });
    }

    pub fn style_fail(&self, project_id: ProjectId, message: impl Into<String>) {
        let mut styles = self.styles.write();
        let entry = styles.entry(project_id).or_insert_with(|| StyleEntry {
            progress: StyleProgress::idle(),
            updated_at: Instant::now(),
        });
        entry.progress.status = StyleRunStatus::Failed;
        entry.progress.message = message.into();
        entry.updated_at = Instant::now();
    }

    fn update_style(&self, project_id: ProjectId, apply: impl FnOnce(&mut StyleProgress)) {
        if let Some(entry) = self.styles.write().get_mut(&project_id) {
            apply(&mut entry.progress);
            entry.updated_at = Instant::now();
        }
    }

    /// Last style progress record, or the idle default
    pub fn style_progress(&self, project_id: ProjectId) -> StyleProgress {
        self.styles
            .read()
            .get(&project_id)
            .map(|entry| entry.progress.clone())
            .unwrap_or_else(StyleProgress::idle)
    }
}

/// Held for the lifetime of one job; releases the project's claim on drop
pub struct JobClaim {
    registry: Arc<JobRegistry>,
    project_id: ProjectId,
    kind: JobKind,
}

impl JobClaim {
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.registry.release(self.project_id, self.kind);
    }
}
