//! Shared test fixtures: tempdir-backed database and storage, plus fake
//! providers standing in for the hosted generators and the external job
//! API.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use forge_common::db::models::{AssetRecord, AssetStatus, AssetType, GenerationTask};
use forge_gen::config::GenConfig;
use forge_gen::db::{assets, tasks};
use forge_gen::services::providers::{
    GeneratedImage, ImageGenerator, JobStatus, ModelArtifacts, ModelJobClient,
    ProceduralImageRenderer, ProceduralPrototypeRenderer, ProviderError,
};
use forge_gen::services::reconciler::TaskObservation;
use forge_gen::services::{Storage, TaskReconciler, TierController};

/// Image generator that always fails, for exercising the fallback chain.
pub struct FailingImageGenerator;

#[async_trait::async_trait]
impl ImageGenerator for FailingImageGenerator {
    fn name(&self) -> &'static str {
        "failing-primary"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _prompt: &str,
        _refinement_notes: Option<&str>,
    ) -> Result<GeneratedImage, ProviderError> {
        Err(ProviderError::Api(503, "forced failure".to_string()))
    }
}

/// Fake external job provider with controllable artifact fetches.
pub struct FakeModelClient {
    pub created_jobs: AtomicUsize,
    pub fetch_count: AtomicUsize,
    pub fail_fetches: AtomicBool,
    pub fetch_delay: Duration,
}

impl FakeModelClient {
    pub fn new() -> Self {
        Self {
            created_jobs: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
            fail_fetches: AtomicBool::new(false),
            fetch_delay: Duration::from_millis(0),
        }
    }

    pub fn with_fetch_delay(delay: Duration) -> Self {
        Self { fetch_delay: delay, ..Self::new() }
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ModelJobClient for FakeModelClient {
    fn name(&self) -> &'static str {
        "fake-model"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn create_job(
        &self,
        _image_url: &str,
        _name: Option<&str>,
    ) -> Result<String, ProviderError> {
        let n = self.created_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{n}"))
    }

    async fn job_status(&self, _task_id: &str) -> Result<JobStatus, ProviderError> {
        Ok(JobStatus { status: "PENDING".to_string(), progress: 0, result: None, error: None })
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("fetch disabled".to_string()));
        }
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(url.as_bytes().to_vec())
    }
}

/// Everything a test needs, rooted in its own tempdir.
pub struct TestContext {
    pub _tmp: TempDir,
    pub db: SqlitePool,
    pub storage: Arc<Storage>,
    pub model_client: Arc<FakeModelClient>,
    pub reconciler: Arc<TaskReconciler>,
    pub tiers: Arc<TierController>,
}

/// Config with a webhook URL configured, so tier 3 does not spawn a
/// background watcher under test.
pub fn test_config() -> GenConfig {
    GenConfig {
        port: 0,
        public_base_url: "http://localhost:5860".to_string(),
        image_api_url: None,
        image_api_key: None,
        model_api_url: "http://unused.test".to_string(),
        model_api_key: Some("test-key".to_string()),
        model_webhook_url: Some("http://localhost:5860/generate/model/webhook".to_string()),
        generate_timeout: Duration::from_secs(30),
        poll_initial_delay: Duration::from_millis(10),
        poll_max_delay: Duration::from_millis(20),
        poll_max_attempts: 3,
    }
}

/// Build a context with a failing primary generator, the real procedural
/// fallback, and a fake job provider.
pub async fn setup() -> TestContext {
    setup_with_model_client(Arc::new(FakeModelClient::new())).await
}

pub async fn setup_with_model_client(model_client: Arc<FakeModelClient>) -> TestContext {
    let tmp = TempDir::new().unwrap();
    let db = forge_common::db::init_database(&tmp.path().join("forge.db")).await.unwrap();
    let storage =
        Arc::new(Storage::init(&tmp.path().join("storage"), "http://localhost:5860").unwrap());

    let dyn_client: Arc<dyn ModelJobClient> = model_client.clone();
    let reconciler =
        Arc::new(TaskReconciler::new(db.clone(), Arc::clone(&storage), Arc::clone(&dyn_client)));

    let image_generators: Vec<Arc<dyn ImageGenerator>> = vec![
        Arc::new(FailingImageGenerator),
        Arc::new(ProceduralImageRenderer::new()),
    ];

    let tiers = Arc::new(TierController::new(
        db.clone(),
        Arc::clone(&storage),
        image_generators,
        Arc::new(ProceduralPrototypeRenderer::new()),
        dyn_client,
        Arc::clone(&reconciler),
        test_config(),
    ));

    TestContext { _tmp: tmp, db, storage, model_client, reconciler, tiers }
}

/// Application state over the context's collaborators, for router-level
/// tests.
pub fn build_state(ctx: &TestContext) -> forge_gen::AppState {
    let dyn_client: Arc<dyn ModelJobClient> = ctx.model_client.clone();
    forge_gen::AppState::new(
        ctx.db.clone(),
        Arc::clone(&ctx.storage),
        Arc::clone(&ctx.tiers),
        Arc::clone(&ctx.reconciler),
        dyn_client,
        test_config(),
    )
}

/// Seed a processing final-model asset with its task row, bypassing the
/// tier controller.
pub async fn seed_final_model_task(ctx: &TestContext, task_id: &str) -> Uuid {
    let record = AssetRecord::new(
        format!("Final - seeded {task_id}"),
        Some("seeded".to_string()),
        AssetType::FinalModel,
        AssetStatus::Processing,
        None,
    );
    assets::insert(&ctx.db, &record).await.unwrap();

    let now = Utc::now();
    let task = GenerationTask {
        task_id: task_id.to_string(),
        asset_id: record.guid,
        status: "pending".to_string(),
        progress: 0,
        result_url: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    };
    tasks::insert(&ctx.db, &task).await.unwrap();
    assets::set_task_id(&ctx.db, record.guid, task_id).await.unwrap();

    record.guid
}

/// A succeeded observation carrying all three artifact URLs.
pub fn succeeded_observation(task_id: &str) -> TaskObservation {
    TaskObservation {
        task_id: task_id.to_string(),
        status: "SUCCEEDED".to_string(),
        progress: Some(100),
        result: Some(ModelArtifacts {
            obj_url: Some("https://provider.test/model.obj".to_string()),
            fbx_url: Some("https://provider.test/model.fbx".to_string()),
            texture_url: Some("https://provider.test/texture.png".to_string()),
        }),
        error: None,
    }
}

/// An in-progress observation at the given progress.
pub fn progress_observation(task_id: &str, progress: i64) -> TaskObservation {
    TaskObservation {
        task_id: task_id.to_string(),
        status: "IN_PROGRESS".to_string(),
        progress: Some(progress),
        result: None,
        error: None,
    }
}

/// A failed observation with an error detail.
pub fn failed_observation(task_id: &str, detail: &str) -> TaskObservation {
    TaskObservation {
        task_id: task_id.to_string(),
        status: "FAILED".to_string(),
        progress: None,
        result: None,
        error: Some(detail.to_string()),
    }
}

/// Count rows in a table.
pub async fn row_count(db: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db)
        .await
        .unwrap()
}
