//! Integration tests for style-set generation and style selection.

use slidegen::error::ApiError;
use slidegen::generation::{StyleSetGenerator, STYLE_ARCHETYPES};
use slidegen::store::ProjectStore;
use slidegen::types::{ProjectStatus, StyleRunStatus};

use crate::integration::test_utils::{ScriptedGenerator, TestPipeline};

#[tokio::test]
async fn test_style_set_generates_three_templates() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(2);

    pipeline.api.generate_styles(project_id, None).unwrap();
    pipeline.api.wait_idle().await;

    let templates = pipeline.api.style_templates(project_id).unwrap();
    assert_eq!(templates.len(), 3);
    for (index, template) in templates.iter().enumerate() {
        assert_eq!(template.template_index, index);
        assert_eq!(
            template.image_path,
            pipeline.layout.style_path(1, project_id, index)
        );
        assert!(template.image_path.exists());
    }

    let progress = pipeline.api.style_progress(project_id);
    assert_eq!(progress.status, StyleRunStatus::Completed);
    assert_eq!(progress.current, 3);
    assert_eq!(progress.total, 3);

    let calls = pipeline.generator.calls();
    assert_eq!(calls.len(), 3);
    for (call, archetype) in calls.iter().zip(STYLE_ARCHETYPES.iter()) {
        assert!(call.prompt.contains(archetype));
        assert_eq!(call.reference, None);
    }
    // styles never change the project status
    assert_eq!(pipeline.status(project_id), ProjectStatus::OutlineGenerated);
}

#[tokio::test]
async fn test_augmentation_is_appended_to_every_style() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(1);

    pipeline
        .api
        .generate_styles(project_id, Some("use a teal palette".to_string()))
        .unwrap();
    pipeline.api.wait_idle().await;

    let calls = pipeline.generator.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls
        .iter()
        .all(|call| call.prompt.contains("Additional requirements: use a teal palette")));
}

#[tokio::test]
async fn test_failed_style_aborts_the_set() {
    let generator = ScriptedGenerator::new();
    generator.fail_always("style_1.png");
    let pipeline = TestPipeline::new(generator);
    let project_id = pipeline.import(1);

    // leftovers from an earlier run are replaced
    for index in 0..3 {
        let stale = pipeline.layout.style_path(1, project_id, index);
        pipeline
            .store
            .add_style_template(project_id, index, &stale)
            .unwrap();
    }

    let project = pipeline.api.project(project_id).unwrap();
    let styles = StyleSetGenerator::new(pipeline.api.context().clone());
    let result = styles.generate(&project, None).await;

    assert!(matches!(
        result,
        Err(ApiError::StyleGenerationFailed { index: 1, .. })
    ));
    let templates = pipeline.api.style_templates(project_id).unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].template_index, 0);

    let progress = pipeline.api.style_progress(project_id);
    assert_eq!(progress.status, StyleRunStatus::Failed);
    assert!(progress.message.contains("style 2"), "{}", progress.message);

    // the third style is never attempted
    assert_eq!(pipeline.generator.calls_for("style_2.png"), 0);
    assert_eq!(pipeline.generator.calls_for("style_1.png"), 3);
}

#[tokio::test]
async fn test_style_generation_rejects_unknown_project() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());

    let result = pipeline.api.generate_styles(12, None);
    assert!(matches!(result, Err(ApiError::ProjectNotFound(12))));
}

#[tokio::test]
async fn test_style_progress_defaults_to_idle() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(1);

    let progress = pipeline.api.style_progress(project_id);
    assert_eq!(progress.status, StyleRunStatus::Idle);
    assert_eq!(progress.current, 0);
    assert_eq!(progress.total, 3);
}

#[tokio::test]
async fn test_select_style_validates_index() {
    let pipeline = TestPipeline::new(ScriptedGenerator::new());
    let project_id = pipeline.import(1);

    let invalid = pipeline.api.select_style(project_id, 3);
    assert!(matches!(
        invalid,
        Err(ApiError::InvalidStyleIndex {
            index: 3,
            available: 3
        })
    ));
    assert_eq!(pipeline.status(project_id), ProjectStatus::OutlineGenerated);

    pipeline.api.select_style(project_id, 2).unwrap();
    let project = pipeline.store.get_project(project_id).unwrap().unwrap();
    assert_eq!(project.selected_style_index, Some(2));
    assert_eq!(project.status, ProjectStatus::StyleSelected);

    assert!(matches!(
        pipeline.api.select_style(500, 0),
        Err(ApiError::ProjectNotFound(500))
    ));
}
