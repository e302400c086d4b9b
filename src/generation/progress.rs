//! Progress Channel
//!
//! Each subscription is an independent, finite stream of snapshots for one
//! project. It waits up to `start_wait` for a job to register, yielding a single
//! [`ProgressEvent::NotStarted`] if none does, then polls the registry every
//! `poll_interval` until a completed or failed snapshot has been yielded.

use crate::generation::registry::{JobProgress, JobRegistry, ProgressLookup};
use crate::types::ProjectId;
use futures::stream::{self, Stream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// One item of a progress subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// No job registered within the start window; always the only item
    NotStarted,
    Snapshot(JobProgress),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            ProgressEvent::NotStarted => true,
            ProgressEvent::Snapshot(progress) => progress.status.is_terminal(),
        }
    }
}

enum SubscriptionState {
    Waiting { deadline: Instant },
    Polling,
    Done,
}

/// Polling progress channel over the job registry
#[derive(Clone)]
pub struct ProgressChannel {
    registry: Arc<JobRegistry>,
    poll_interval: Duration,
    start_wait: Duration,
}

impl ProgressChannel {
    pub fn new(registry: Arc<JobRegistry>, poll_interval: Duration, start_wait: Duration) -> Self {
        Self {
            registry,
            poll_interval,
            start_wait,
        }
    }

    /// Start a new subscription for `project_id`
    pub fn subscribe(&self, project_id: ProjectId) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let registry = Arc::clone(&self.registry);
        let poll_interval = self.poll_interval;
        let initial = SubscriptionState::Waiting {
            deadline: Instant::now() + self.start_wait,
        };

        stream::unfold(initial, move |state| {
            let registry = Arc::clone(&registry);
            async move {
                match state {
                    SubscriptionState::Done => None,
                    SubscriptionState::Waiting { deadline } => loop {
                        match registry.lookup(project_id) {
                            ProgressLookup::NotStarted => {
                                let now = Instant::now();
                                if now >= deadline {
                                    return Some((ProgressEvent::NotStarted, SubscriptionState::Done));
                                }
                                sleep(poll_interval.min(deadline - now)).await;
                            }
                            ProgressLookup::InProgress(progress) => {
                                return Some((
                                    ProgressEvent::Snapshot(progress),
                                    SubscriptionState::Polling,
                                ));
                            }
                            ProgressLookup::Terminal(progress) => {
                                return Some((
                                    ProgressEvent::Snapshot(progress),
                                    SubscriptionState::Done,
                                ));
                            }
                        }
                    },
                    SubscriptionState::Polling => {
                        sleep(poll_interval).await;
                        match registry.lookup(project_id) {
                            // entry pruned underneath us
                            ProgressLookup::NotStarted => None,
                            ProgressLookup::InProgress(progress) => Some((
                                ProgressEvent::Snapshot(progress),
                                SubscriptionState::Polling,
                            )),
                            ProgressLookup::Terminal(progress) => Some((
                                ProgressEvent::Snapshot(progress),
                                SubscriptionState::Done,
                            )),
                        }
                    }
                }
            }
        })
    }
}
