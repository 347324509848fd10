//! Generation tier orchestration
//!
//! One controller drives all three tiers. Records are created in
//! `processing` before the generator is invoked, so a crash mid-call is
//! observable as a stuck processing row rather than silently missing.
//! Collaborators are injected at construction; nothing here talks to a
//! process-global.

use crate::config::GenConfig;
use crate::db::{assets, tasks};
use crate::services::providers::{ImageGenerator, ModelJobClient, PrototypeGenerator};
use crate::services::reconciler::{ReconcileOutcome, TaskObservation, TaskReconciler};
use crate::services::storage::{Storage, StorageTier};
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType, GenerationTask};
use forge_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-tier orchestration over injected collaborators.
pub struct TierController {
    db: SqlitePool,
    storage: Arc<Storage>,
    /// Consulted in priority order; the last entry is expected to be the
    /// procedural fallback, which cannot fail for a non-empty prompt
    image_generators: Vec<Arc<dyn ImageGenerator>>,
    prototype_generator: Arc<dyn PrototypeGenerator>,
    model_client: Arc<dyn ModelJobClient>,
    reconciler: Arc<TaskReconciler>,
    config: GenConfig,
}

impl TierController {
    pub fn new(
        db: SqlitePool,
        storage: Arc<Storage>,
        image_generators: Vec<Arc<dyn ImageGenerator>>,
        prototype_generator: Arc<dyn PrototypeGenerator>,
        model_client: Arc<dyn ModelJobClient>,
        reconciler: Arc<TaskReconciler>,
        config: GenConfig,
    ) -> Self {
        Self {
            db,
            storage,
            image_generators,
            prototype_generator,
            model_client,
            reconciler,
            config,
        }
    }

    pub fn image_generators(&self) -> &[Arc<dyn ImageGenerator>] {
        &self.image_generators
    }

    pub fn model_client(&self) -> &Arc<dyn ModelJobClient> {
        &self.model_client
    }

    /// Tier 1: generate a 2D concept image from a prompt.
    pub async fn generate_concept(
        &self,
        prompt: &str,
        refinement_notes: Option<&str>,
    ) -> Result<AssetRecord> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let record = AssetRecord::new(
            concept_name(prompt),
            Some(prompt.to_string()),
            AssetType::Image2d,
            AssetStatus::Processing,
            None,
        );
        assets::insert(&self.db, &record).await?;

        self.run_image_generation(record.guid, prompt, refinement_notes).await
    }

    /// Tier 1 refinement: a new concept derived from an existing one.
    /// The stored prompt concatenates original and refinement text so the
    /// full instruction history stays auditable on the record.
    pub async fn refine_concept(&self, source_id: Uuid, refinement_text: &str) -> Result<AssetRecord> {
        let refinement_text = refinement_text.trim();
        if refinement_text.is_empty() {
            return Err(Error::InvalidInput("refinement text must not be empty".to_string()));
        }

        let source = assets::get_typed(&self.db, source_id, AssetType::Image2d)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source image {source_id}")))?;

        let source_prompt = source.prompt.clone().unwrap_or_default();
        let record = AssetRecord::new(
            format!("Refined - {}", source.name),
            Some(format!("{source_prompt}\n\nRefinement: {refinement_text}")),
            AssetType::Image2d,
            AssetStatus::Processing,
            Some(source.guid),
        );
        assets::insert(&self.db, &record).await?;

        self.run_image_generation(record.guid, &source_prompt, Some(refinement_text)).await
    }

    /// Walk the generator chain for an already-inserted processing row.
    async fn run_image_generation(
        &self,
        asset_id: Uuid,
        prompt: &str,
        refinement_notes: Option<&str>,
    ) -> Result<AssetRecord> {
        let mut last_failure = String::from("no image generator available");

        for generator in &self.image_generators {
            if !generator.is_available() {
                continue;
            }

            let generated = match timeout(
                self.config.generate_timeout,
                generator.generate(prompt, refinement_notes),
            )
            .await
            {
                Ok(Ok(generated)) => generated,
                Ok(Err(e)) => {
                    warn!(generator = generator.name(), error = %e, "image generator failed, trying next");
                    last_failure = format!("{}: {e}", generator.name());
                    continue;
                }
                Err(_) => {
                    warn!(generator = generator.name(), "image generator timed out, trying next");
                    last_failure = format!(
                        "{}: timed out after {}s",
                        generator.name(),
                        self.config.generate_timeout.as_secs()
                    );
                    continue;
                }
            };

            match self
                .storage
                .persist(StorageTier::Images, &generated.filename, &generated.bytes)
                .await
            {
                Ok(filename) => {
                    // Every stored concept gets an externally reachable
                    // URL; the image-to-3D provider fetches it from here
                    let remote_url = generated
                        .remote_url
                        .unwrap_or_else(|| self.storage.url_for(StorageTier::Images, &filename));
                    assets::mark_image_completed(&self.db, asset_id, &filename, Some(remote_url.as_str()))
                        .await?;
                    info!(asset_id = %asset_id, generator = generator.name(), "concept image generated");
                    return self.reload(asset_id).await;
                }
                Err(e) => {
                    warn!(generator = generator.name(), error = %e, "failed to persist generated image");
                    last_failure = format!("storage: {e}");
                }
            }
        }

        assets::mark_failed(&self.db, asset_id, &last_failure).await?;
        Err(Error::Generation(format!("2D generation failed: {last_failure}")))
    }

    /// Tier 2: convert a completed 2D concept into a 3D prototype.
    pub async fn generate_prototype(&self, source_id: Uuid) -> Result<AssetRecord> {
        let source = assets::get_typed(&self.db, source_id, AssetType::Image2d)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source image {source_id}")))?;

        let image_path = source.image_path.clone().ok_or_else(|| {
            Error::InvalidInput(format!("source image {source_id} has no stored image file"))
        })?;

        if assets::has_processing_child(&self.db, source.guid, AssetType::Prototype).await? {
            return Err(Error::Conflict(format!(
                "a prototype for image {source_id} is already being generated"
            )));
        }

        let record = AssetRecord::new(
            format!("Prototype - {}", source.name),
            source.prompt.clone(),
            AssetType::Prototype,
            AssetStatus::Processing,
            Some(source.guid),
        );
        assets::insert(&self.db, &record).await?;

        let image_bytes = match self.storage.read(StorageTier::Images, &image_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let detail = format!("source image unreadable: {e}");
                assets::mark_failed(&self.db, record.guid, &detail).await?;
                return Err(Error::Generation(detail));
            }
        };

        let generated = match timeout(
            self.config.generate_timeout,
            self.prototype_generator.generate(&image_bytes, source.prompt.as_deref()),
        )
        .await
        {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                let detail = format!("prototype generation failed: {e}");
                assets::mark_failed(&self.db, record.guid, &detail).await?;
                return Err(Error::Generation(detail));
            }
            Err(_) => {
                let detail = format!(
                    "prototype generation timed out after {}s",
                    self.config.generate_timeout.as_secs()
                );
                assets::mark_failed(&self.db, record.guid, &detail).await?;
                return Err(Error::Timeout(detail));
            }
        };

        let obj_path = self
            .storage
            .persist(StorageTier::Prototypes, &generated.obj.filename, &generated.obj.bytes)
            .await;
        let gif_path = self
            .storage
            .persist(StorageTier::Prototypes, &generated.gif.filename, &generated.gif.bytes)
            .await;

        match (obj_path, gif_path) {
            (Ok(obj), Ok(gif)) => {
                assets::mark_prototype_completed(&self.db, record.guid, &obj, &gif).await?;
                info!(asset_id = %record.guid, parent_id = %source.guid, "prototype generated");
                self.reload(record.guid).await
            }
            (obj, gif) => {
                let detail = format!(
                    "failed to persist prototype artifacts: {:?}",
                    obj.err().or(gif.err())
                );
                assets::mark_failed(&self.db, record.guid, &detail).await?;
                Err(Error::Generation(detail))
            }
        }
    }

    /// Tier 3: kick off a high-fidelity model job with the external
    /// provider. Returns as soon as the job is accepted; completion
    /// arrives later through the reconciler.
    pub async fn generate_final_model(
        &self,
        prototype_id: Uuid,
    ) -> Result<(AssetRecord, GenerationTask)> {
        // All preconditions are checked before any row is created
        let prototype = assets::get_typed(&self.db, prototype_id, AssetType::Prototype)
            .await?
            .ok_or_else(|| Error::NotFound(format!("prototype {prototype_id}")))?;

        let source_image_id = prototype.parent_id.ok_or_else(|| {
            Error::InvalidInput(format!("prototype {prototype_id} has no source image"))
        })?;
        let source_image = assets::get(&self.db, source_image_id).await?.ok_or_else(|| {
            Error::InvalidInput(format!(
                "source image {source_image_id} of prototype {prototype_id} no longer exists"
            ))
        })?;
        let image_url = source_image.remote_image_url.clone().ok_or_else(|| {
            Error::InvalidInput(format!(
                "source image {source_image_id} has no externally reachable URL"
            ))
        })?;

        if assets::has_processing_child(&self.db, prototype.guid, AssetType::FinalModel).await? {
            return Err(Error::Conflict(format!(
                "a final model for prototype {prototype_id} is already being generated"
            )));
        }

        let record = AssetRecord::new(
            format!("Final - {}", prototype.name),
            prototype.prompt.clone(),
            AssetType::FinalModel,
            AssetStatus::Processing,
            Some(prototype.guid),
        );
        assets::insert(&self.db, &record).await?;

        let task_id = match self.model_client.create_job(&image_url, Some(record.name.as_str())).await {
            Ok(task_id) => task_id,
            Err(e) => {
                // No task row exists yet: same classification as a
                // synchronous tier failure
                let detail = format!("model job creation failed: {e}");
                assets::mark_failed(&self.db, record.guid, &detail).await?;
                return Err(Error::Generation(detail));
            }
        };

        let now = chrono::Utc::now();
        let task = GenerationTask {
            task_id: task_id.clone(),
            asset_id: record.guid,
            status: "pending".to_string(),
            progress: 0,
            result_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tasks::insert(&self.db, &task).await?;
        assets::set_task_id(&self.db, record.guid, &task_id).await?;

        info!(asset_id = %record.guid, task_id = %task_id, "model job created");

        if self.config.model_webhook_url.is_none() {
            // No webhook delivery: watch the job ourselves
            self.spawn_task_watcher(task_id);
        }

        let record = self.reload(record.guid).await?;
        Ok((record, task))
    }

    /// Background watcher: poll the provider with backoff and feed each
    /// observation through the reconciler until the job settles or the
    /// poll budget runs out.
    fn spawn_task_watcher(&self, task_id: String) {
        let reconciler = Arc::clone(&self.reconciler);
        let model_client = Arc::clone(&self.model_client);
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut delay = config.poll_initial_delay;
            for attempt in 1..=config.poll_max_attempts {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.poll_max_delay);

                let status = match model_client.job_status(&task_id).await {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(task_id = %task_id, attempt, error = %e, "provider poll failed, will retry");
                        continue;
                    }
                };

                let observation = TaskObservation {
                    task_id: task_id.clone(),
                    status: status.status,
                    progress: Some(status.progress),
                    result: status.result,
                    error: status.error,
                };
                match reconciler.reconcile(observation).await {
                    Ok(
                        ReconcileOutcome::Completed
                        | ReconcileOutcome::Failed
                        | ReconcileOutcome::AlreadyTerminal
                        | ReconcileOutcome::UnknownTask,
                    ) => return,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(task_id = %task_id, attempt, error = %e, "reconcile failed during watch");
                    }
                }
            }

            // Poll budget exhausted: push a synthetic expiry through the
            // reconciler so the asset cannot sit in processing forever.
            // The terminal guard makes a later late success a no-op.
            warn!(task_id = %task_id, attempts = config.poll_max_attempts, "giving up on task watch");
            let expired = TaskObservation {
                task_id: task_id.clone(),
                status: "EXPIRED".to_string(),
                progress: None,
                result: None,
                error: Some(format!(
                    "no terminal status after {} polls",
                    config.poll_max_attempts
                )),
            };
            if let Err(e) = reconciler.reconcile(expired).await {
                warn!(task_id = %task_id, error = %e, "failed to expire watched task");
            }
        });
    }

    async fn reload(&self, id: Uuid) -> Result<AssetRecord> {
        assets::get(&self.db, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("asset {id} vanished mid-operation")))
    }
}

/// Display name for a fresh concept, truncating long prompts.
fn concept_name(prompt: &str) -> String {
    let prefix: String = prompt.chars().take(50).collect();
    if prompt.chars().count() > 50 {
        format!("2D Concept - {prefix}...")
    } else {
        format!("2D Concept - {prefix}")
    }
}
