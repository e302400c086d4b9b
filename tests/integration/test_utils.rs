//! Shared test utilities for integration tests
//!
//! Provides a scripted image generator, pipeline setup over a temporary sled store,
//! and XDG environment isolation for config tests.

use async_trait::async_trait;
use slidegen::api::{GenerationApi, ImportedPage, ProjectImport};
use slidegen::config::GenerationConfig;
use slidegen::error::ApiError;
use slidegen::generation::{ArtifactLayout, GenerationContext, JobRegistry};
use slidegen::provider::{ImageGenerator, PromptTemplates};
use slidegen::retry::RetryPolicy;
use slidegen::store::{NewProject, OutlinePage, ProjectStore, SledProjectStore};
use slidegen::types::{ProjectId, ProjectStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// One recorded call to the scripted generator
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub prompt: String,
    pub reference: Option<PathBuf>,
    pub output: PathBuf,
}

impl GeneratorCall {
    pub fn file_name(&self) -> String {
        self.output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Image generator double: writes a placeholder file for each call and fails
/// calls whose output file name has been scripted to fail.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: Mutex<Vec<GeneratorCall>>,
    /// file name -> remaining failures (`None` fails forever)
    failures: Mutex<HashMap<String, Option<u32>>>,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Generator that sleeps before answering, to keep jobs in flight
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn fail_always(&self, file_name: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(file_name.to_string(), None);
    }

    pub fn fail_times(&self, file_name: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(file_name.to_string(), Some(times));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Output file names in call order
    pub fn call_files(&self) -> Vec<String> {
        self.calls().iter().map(GeneratorCall::file_name).collect()
    }

    pub fn calls_for(&self, file_name: &str) -> usize {
        self.call_files()
            .iter()
            .filter(|name| name.as_str() == file_name)
            .count()
    }

    async fn answer(
        &self,
        prompt: &str,
        reference: Option<&Path>,
        output_path: &Path,
    ) -> Result<PathBuf, ApiError> {
        let call = GeneratorCall {
            prompt: prompt.to_string(),
            reference: reference.map(Path::to_path_buf),
            output: output_path.to_path_buf(),
        };
        let file_name = call.file_name();
        self.calls.lock().unwrap().push(call);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&file_name) {
                Some(None) => true,
                Some(Some(0)) => false,
                Some(Some(remaining)) => {
                    *remaining -= 1;
                    true
                }
                None => false,
            }
        };
        if should_fail {
            return Err(ApiError::ProviderRequestFailed(format!(
                "scripted failure for {}",
                file_name
            )));
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(output_path, b"\x89PNG scripted").unwrap();
        Ok(output_path.to_path_buf())
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<PathBuf, ApiError> {
        self.answer(prompt, None, output_path).await
    }

    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference_image: &Path,
        output_path: &Path,
    ) -> Result<PathBuf, ApiError> {
        self.answer(prompt, Some(reference_image), output_path)
            .await
    }
}

/// Generation settings with instant retries and fast progress polling
pub fn test_generation_config() -> GenerationConfig {
    GenerationConfig {
        max_api_retries: 3,
        retry_delay_base: 2,
        retry_unit_ms: 0,
        progress_poll_ms: 5,
        progress_start_wait_ms: 200,
        ..GenerationConfig::default()
    }
}

/// A generation API over a temporary sled store and artifact root
pub struct TestPipeline {
    pub api: GenerationApi,
    pub store: Arc<SledProjectStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub layout: ArtifactLayout,
    pub temp_dir: TempDir,
    config: GenerationConfig,
}

impl TestPipeline {
    /// Build a pipeline; must be called inside a tokio runtime
    pub fn new(generator: Arc<ScriptedGenerator>) -> Self {
        Self::with_config(generator, test_generation_config())
    }

    pub fn with_config(generator: Arc<ScriptedGenerator>, config: GenerationConfig) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SledProjectStore::new(temp_dir.path().join("store")).unwrap());
        let layout = ArtifactLayout::new(temp_dir.path().join("generated"));
        let api = build_api(&store, &generator, &layout, &config);
        Self {
            api,
            store,
            generator,
            layout,
            temp_dir,
            config,
        }
    }

    /// A second API over the same store and artifacts with empty in-memory state,
    /// as seen by a freshly started process
    pub fn restarted(&self, generator: Arc<ScriptedGenerator>) -> GenerationApi {
        build_api(&self.store, &generator, &self.layout, &self.config)
    }

    /// Import a project whose outline has `pages` pages
    pub fn import(&self, pages: u32) -> ProjectId {
        self.api.import_project(&sample_import(pages)).unwrap()
    }

    pub fn status(&self, project_id: ProjectId) -> ProjectStatus {
        self.store.get_project(project_id).unwrap().unwrap().status
    }
}

fn build_api(
    store: &Arc<SledProjectStore>,
    generator: &Arc<ScriptedGenerator>,
    layout: &ArtifactLayout,
    config: &GenerationConfig,
) -> GenerationApi {
    let ctx = GenerationContext {
        store: Arc::clone(store) as Arc<dyn ProjectStore>,
        generator: Arc::clone(generator) as Arc<dyn ImageGenerator>,
        templates: Arc::new(PromptTemplates::default()),
        layout: layout.clone(),
        retry: RetryPolicy::from_config(config),
        registry: Arc::new(JobRegistry::new(config.registry_retention())),
    };
    GenerationApi::new(ctx, config).unwrap()
}

pub fn sample_import(pages: u32) -> ProjectImport {
    ProjectImport {
        workspace_id: 1,
        title: "Quarterly review".to_string(),
        user_prompt: "Summarize the quarter".to_string(),
        pages: (1..=pages)
            .map(|n| ImportedPage {
                title: format!("Slide {}", n),
                content: format!("Key points for slide {}", n),
                image_prompt: None,
            })
            .collect(),
    }
}

/// Write a project straight into the store, bypassing the API
pub fn seed_project(store: &dyn ProjectStore, pages: u32, status: ProjectStatus) -> ProjectId {
    let project_id = store
        .create_project(&NewProject {
            workspace_id: 1,
            title: "Seeded deck".to_string(),
            user_prompt: String::new(),
            expected_pages: pages,
        })
        .unwrap();
    for page_number in 1..=pages {
        store
            .put_outline_page(&OutlinePage {
                project_id,
                page_number,
                title: format!("Slide {}", page_number),
                content: format!("Body {}", page_number),
                image_prompt: None,
            })
            .unwrap();
    }
    store.update_project_status(project_id, status).unwrap();
    project_id
}

/// Global mutex to serialize XDG environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        if let Some(orig) = self.home {
            std::env::set_var("HOME", orig);
        } else {
            std::env::remove_var("HOME");
        }

        if let Some(orig) = self.xdg_config_home {
            std::env::set_var("XDG_CONFIG_HOME", orig);
        } else {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());

    let result = f();

    env_state.restore();

    result
}
