//! Integration tests for page generation jobs: full runs, per-page failures,
//! structural failures, queued jobs, progress snapshots, style references and
//! start validation.

use futures::StreamExt;
use slidegen::config::GenerationConfig;
use slidegen::error::ApiError;
use slidegen::generation::{
    JobProgress, JobResumer, PageGenerationJob, PageOverrides, ProgressEvent, ProgressLookup,
    RecoveryScanner, ResumeOutcome,
};
use slidegen::store::ProjectStore;
use slidegen::types::{JobStatus, PageStatus, ProjectId, ProjectStatus};
use std::sync::Mutex;
use std::time::Duration;

use crate::integration::test_utils::{
    seed_project, test_generation_config, ScriptedGenerator, TestPipeline,
};

/// Resumer that only records what a recovery scan would relaunch
#[derive(Default)]
struct RecordingResumer {
    resumed: Mutex<Vec<ProjectId>>,
}

impl JobResumer for RecordingResumer {
    fn resume(&self, project_id: ProjectId) -> Result<ResumeOutcome, ApiError> {
        self.resumed.lock().unwrap().push(project_id);
        Ok(ResumeOutcome::Resumed)
    }
}

async fn collect_events(pipeline: &TestPipeline, project_id: u64) -> Vec<ProgressEvent> {
    pipeline
        .api
        .subscribe_progress(project_id)
        .collect::<Vec<_>>()
        .await
}

#[tokio::test]
async fn test_all_pages_complete() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(3);

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    let events = collect_events(&pipeline, project_id).await;
    pipeline.api.wait_idle().await;

    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Snapshot(JobProgress {
            current_page: 3,
            total_pages: 3,
            status: JobStatus::Completed,
            error: None,
        }))
    );

    let records = pipeline.api.page_records(project_id).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.status, PageStatus::Completed);
        let expected = pipeline.layout.page_path(1, project_id, record.page_number);
        assert_eq!(record.image_path.as_deref(), Some(expected.as_path()));
        assert!(expected.exists());
        assert_eq!(record.error_message, None);
    }
    assert_eq!(pipeline.status(project_id), ProjectStatus::Completed);
    assert_eq!(
        pipeline.generator.call_files(),
        vec!["page_001.png", "page_002.png", "page_003.png"]
    );
}

#[tokio::test]
async fn test_failed_page_does_not_fail_project() {
    let generator = ScriptedGenerator::new();
    generator.fail_always("page_002.png");
    let pipeline = TestPipeline::new(generator);
    let project_id = pipeline.import(3);

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;

    let records = pipeline.api.page_records(project_id).unwrap();
    assert_eq!(records[0].status, PageStatus::Completed);
    assert_eq!(records[1].status, PageStatus::Failed);
    assert_eq!(records[1].image_path, None);
    let error = records[1].error_message.as_deref().unwrap();
    assert!(error.contains("3 attempts"), "unexpected error: {}", error);
    assert!(error.contains("scripted failure"));
    assert_eq!(records[2].status, PageStatus::Completed);

    // every attempt went to the provider before giving up
    assert_eq!(pipeline.generator.calls_for("page_002.png"), 3);
    assert_eq!(pipeline.status(project_id), ProjectStatus::Completed);

    match pipeline.api.progress(project_id) {
        ProgressLookup::Terminal(progress) => {
            assert_eq!(progress.status, JobStatus::Completed);
            assert_eq!(progress.error, None);
        }
        other => panic!("expected terminal progress, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unwritable_artifact_root_fails_the_job() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(2);
    // a regular file where the artifact directory should go
    std::fs::write(pipeline.temp_dir.path().join("generated"), b"").unwrap();

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;

    assert_eq!(pipeline.status(project_id), ProjectStatus::Failed);
    assert!(pipeline.generator.calls().is_empty());
    match pipeline.api.progress(project_id) {
        ProgressLookup::Terminal(progress) => {
            assert_eq!(progress.status, JobStatus::Failed);
            assert!(progress.error.is_some());
        }
        other => panic!("expected terminal progress, got {:?}", other),
    }

    let events = collect_events(&pipeline, project_id).await;
    match events.last() {
        Some(ProgressEvent::Snapshot(progress)) => {
            assert_eq!(progress.status, JobStatus::Failed);
            assert!(progress.error.is_some());
        }
        other => panic!("expected failed snapshot, got {:?}", other),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_queued_job_is_generating_before_it_runs() {
    let config = GenerationConfig {
        max_concurrent_jobs: 1,
        ..test_generation_config()
    };
    let pipeline =
        TestPipeline::with_config(ScriptedGenerator::slow(Duration::from_millis(30)), config);
    let running = pipeline.import(2);
    let queued = pipeline.import(2);

    pipeline.api.start(running, PageOverrides::new()).unwrap();
    pipeline.api.start(queued, PageOverrides::new()).unwrap();

    // accepted but waiting for the only worker slot
    assert_eq!(pipeline.status(queued), ProjectStatus::Generating);
    assert_eq!(
        pipeline.api.progress(queued),
        ProgressLookup::InProgress(JobProgress {
            current_page: 0,
            total_pages: 2,
            status: JobStatus::Generating,
            error: None,
        })
    );
    let records = pipeline.api.page_records(queued).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == PageStatus::Pending));

    // a restart at this point would pick both jobs up again
    let resumer = RecordingResumer::default();
    let report = RecoveryScanner::new(pipeline.store.as_ref())
        .scan(&resumer)
        .unwrap();
    assert!(report.interrupted.contains(&running));
    assert!(report.interrupted.contains(&queued));

    let events = collect_events(&pipeline, queued).await;
    pipeline.api.wait_idle().await;

    match events.first() {
        Some(ProgressEvent::Snapshot(progress)) => {
            assert_eq!(progress.status, JobStatus::Generating);
            assert_eq!(progress.total_pages, 2);
        }
        other => panic!("expected a generating snapshot first, got {:?}", other),
    }
    assert_eq!(pipeline.status(running), ProjectStatus::Completed);
    assert_eq!(pipeline.status(queued), ProjectStatus::Completed);
    assert_eq!(pipeline.generator.calls().len(), 4);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let generator = ScriptedGenerator::new();
    generator.fail_times("page_001.png", 2);
    let pipeline = TestPipeline::new(generator);
    let project_id = pipeline.import(1);

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;

    let records = pipeline.api.page_records(project_id).unwrap();
    assert_eq!(records[0].status, PageStatus::Completed);
    assert_eq!(pipeline.generator.calls_for("page_001.png"), 3);
}

#[tokio::test]
async fn test_progress_is_observable_mid_job() {
    let pipeline = TestPipeline::new(ScriptedGenerator::slow(Duration::from_millis(40)));
    let project_id = pipeline.import(3);

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    let events = collect_events(&pipeline, project_id).await;
    pipeline.api.wait_idle().await;

    let snapshots: Vec<&JobProgress> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Snapshot(progress) => Some(progress),
            ProgressEvent::NotStarted => None,
        })
        .collect();
    assert!(snapshots.len() >= 2, "expected several snapshots: {:?}", events);
    assert!(snapshots
        .iter()
        .any(|progress| progress.status == JobStatus::Generating));
    assert!(snapshots.iter().all(|progress| progress.total_pages == 3));
    // the page counter never goes backwards
    assert!(snapshots
        .windows(2)
        .all(|pair| pair[0].current_page <= pair[1].current_page));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_progress_for_unknown_project_is_not_started() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());

    let events = collect_events(&pipeline, 404).await;
    assert_eq!(events, vec![ProgressEvent::NotStarted]);
    assert_eq!(pipeline.api.progress(404), ProgressLookup::NotStarted);
}

#[tokio::test]
async fn test_start_rejects_missing_project_and_outline() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());

    let missing = pipeline.api.start(99, PageOverrides::new());
    assert!(matches!(missing, Err(ApiError::ProjectNotFound(99))));

    let empty = seed_project(pipeline.store.as_ref(), 0, ProjectStatus::Draft);
    let no_outline = pipeline.api.start(empty, PageOverrides::new());
    assert!(matches!(no_outline, Err(ApiError::OutlineMissing(id)) if id == empty));

    pipeline.api.wait_idle().await;
    assert!(pipeline.generator.calls().is_empty());
    assert_eq!(pipeline.status(empty), ProjectStatus::Draft);
    assert!(pipeline.api.page_records(empty).unwrap().is_empty());
}

#[tokio::test]
async fn test_job_for_vanished_project_is_a_quiet_no_op() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let job = PageGenerationJob::new(pipeline.api.context().clone());

    let summary = job.run(77, &PageOverrides::new()).await.unwrap();
    assert_eq!(summary, None);
    assert_eq!(pipeline.api.progress(77), ProgressLookup::NotStarted);
    assert!(pipeline.generator.calls().is_empty());
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let pipeline = TestPipeline::new(ScriptedGenerator::slow(Duration::from_millis(30)));
    let project_id = pipeline.import(2);

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    let second = pipeline.api.start(project_id, PageOverrides::new());
    assert!(matches!(second, Err(ApiError::JobAlreadyRunning(id)) if id == project_id));

    pipeline.api.wait_idle().await;
    assert_eq!(pipeline.api.page_records(project_id).unwrap().len(), 2);
    assert_eq!(pipeline.generator.calls().len(), 2);

    // the claim is released once the job finishes
    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;
    // completed pages are not rendered again
    assert_eq!(pipeline.generator.calls().len(), 2);
}

#[tokio::test]
async fn test_overrides_reach_the_prompt() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(2);

    let mut overrides = PageOverrides::new();
    overrides.insert(2, "use a bar chart".to_string());
    pipeline.api.start(project_id, overrides).unwrap();
    pipeline.api.wait_idle().await;

    let calls = pipeline.generator.calls();
    assert!(!calls[0].prompt.contains("use a bar chart"));
    assert!(calls[1]
        .prompt
        .contains("Additional requirements: use a bar chart"));
    assert!(calls[1].prompt.contains("Title: Slide 2"));
}

#[tokio::test]
async fn test_selected_style_is_used_as_reference() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(2);

    let style_path = pipeline.layout.style_path(1, project_id, 1);
    std::fs::create_dir_all(style_path.parent().unwrap()).unwrap();
    std::fs::write(&style_path, b"style").unwrap();
    pipeline
        .store
        .add_style_template(project_id, 1, &style_path)
        .unwrap();
    pipeline.api.select_style(project_id, 1).unwrap();

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;

    let calls = pipeline.generator.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert_eq!(call.reference.as_deref(), Some(style_path.as_path()));
    }
    assert!(pipeline
        .api
        .page_prompts(project_id)
        .unwrap()
        .iter()
        .all(|prompt| prompt.uses_style_reference));
}

#[tokio::test]
async fn test_missing_style_file_falls_back_to_no_reference() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(1);

    let style_path = pipeline.layout.style_path(1, project_id, 0);
    pipeline
        .store
        .add_style_template(project_id, 0, &style_path)
        .unwrap();
    pipeline.api.select_style(project_id, 0).unwrap();

    pipeline.api.start(project_id, PageOverrides::new()).unwrap();
    pipeline.api.wait_idle().await;

    let calls = pipeline.generator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].reference, None);
    assert_eq!(pipeline.status(project_id), ProjectStatus::Completed);
}

#[tokio::test]
async fn test_many_projects_run_independently() {
    let generator = ScriptedGenerator::new();
    let pipeline = TestPipeline::new(generator);
    let projects: Vec<u64> = (0..4).map(|_| pipeline.import(2)).collect();

    for project_id in &projects {
        pipeline.api.start(*project_id, PageOverrides::new()).unwrap();
    }
    pipeline.api.wait_idle().await;

    for project_id in projects {
        assert_eq!(pipeline.status(project_id), ProjectStatus::Completed);
        let records = pipeline.api.page_records(project_id).unwrap();
        assert!(records.iter().all(|r| r.status == PageStatus::Completed));
    }
    assert_eq!(pipeline.generator.calls().len(), 8);
}
