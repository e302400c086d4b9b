pub mod job;
pub mod paths;
pub mod progress;
pub mod prompt;
pub mod recovery;
pub mod registry;
pub mod styles;

pub use job::{JobSummary, PageGenerationJob, PageOverrides};
pub use paths::ArtifactLayout;
pub use progress::{ProgressChannel, ProgressEvent};
pub use prompt::PagePrompt;
pub use recovery::{JobResumer, RecoveryReport, RecoveryScanner};
pub use registry::{JobClaim, JobKind, JobProgress, JobRegistry, ProgressLookup, StyleProgress};
pub use styles::{StyleSetGenerator, STYLE_ARCHETYPES};

use crate::provider::{ImageGenerator, PromptTemplates};
use crate::retry::RetryPolicy;
use crate::store::ProjectStore;
use std::sync::Arc;

/// Collaborators shared by the style generator, the page job and the API
#[derive(Clone)]
pub struct GenerationContext {
    pub store: Arc<dyn ProjectStore>,
    pub generator: Arc<dyn ImageGenerator>,
    pub templates: Arc<PromptTemplates>,
    pub layout: ArtifactLayout,
    pub retry: RetryPolicy,
    pub registry: Arc<JobRegistry>,
}

/// Result of a resume request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// A job was launched for the remaining pages
    Resumed,
    /// Project status is not `generating`
    NotGenerating,
    /// Every page was already completed; the project was marked completed
    AlreadyComplete,
}

impl ResumeOutcome {
    pub fn is_resumed(self) -> bool {
        matches!(self, ResumeOutcome::Resumed)
    }
}
