//! Task reconciliation
//!
//! Single authority for merging an external job observation into local
//! asset state. Both the poll endpoint and the webhook receiver funnel
//! into `reconcile`, which must therefore be idempotent, tolerant of
//! stale or out-of-order observations, and safe to race against itself.
//!
//! Two layers keep a poll/webhook race from double-committing: a per-task
//! async mutex serializes reconciles for the same task id within this
//! process, and every terminal transition is a guarded single-statement
//! update in the database, so at most one caller ever observes itself
//! winning the transition.

use crate::db::{assets, tasks};
use crate::services::providers::{ModelArtifacts, ModelJobClient};
use crate::services::storage::{Storage, StorageTier};
use forge_common::db::models::GenerationTask;
use forge_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Terminal classification of a provider-native status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    InProgress,
    Succeeded,
    Failed,
}

/// Classify a provider status string. Unknown strings are treated as
/// in-progress: never mark an asset failed on an unrecognized status.
pub fn classify_status(status: &str) -> TaskPhase {
    match status.to_ascii_uppercase().as_str() {
        "SUCCEEDED" => TaskPhase::Succeeded,
        "FAILED" | "EXPIRED" | "CANCELED" | "CANCELLED" => TaskPhase::Failed,
        _ => TaskPhase::InProgress,
    }
}

/// One observation of an external job, from either trigger path.
#[derive(Debug, Clone)]
pub struct TaskObservation {
    pub task_id: String,
    pub status: String,
    pub progress: Option<i64>,
    pub result: Option<ModelArtifacts>,
    pub error: Option<String>,
}

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Task id unknown locally; acknowledged without any state change
    UnknownTask,
    /// Owning asset already terminal; observation discarded
    AlreadyTerminal,
    /// Task still running; progress merged monotonically
    InProgress { progress: i64 },
    /// Asset completed with its artifact files persisted
    Completed,
    /// Asset marked failed
    Failed,
    /// Success observed but artifacts could not be materialized; asset
    /// left processing so the next poll or redelivery can finish the job
    RetryLater,
}

impl ReconcileOutcome {
    /// Stable wire label for acknowledgment payloads.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::UnknownTask => "unknown_task",
            ReconcileOutcome::AlreadyTerminal => "already_terminal",
            ReconcileOutcome::InProgress { .. } => "in_progress",
            ReconcileOutcome::Completed => "completed",
            ReconcileOutcome::Failed => "failed",
            ReconcileOutcome::RetryLater => "retry_later",
        }
    }
}

/// Reconciles external job observations into asset state.
pub struct TaskReconciler {
    db: SqlitePool,
    storage: Arc<Storage>,
    model_client: Arc<dyn ModelJobClient>,
    task_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaskReconciler {
    pub fn new(db: SqlitePool, storage: Arc<Storage>, model_client: Arc<dyn ModelJobClient>) -> Self {
        Self { db, storage, model_client, task_locks: Mutex::new(HashMap::new()) }
    }

    /// Lock handle serializing reconciles for one task id.
    async fn task_lock(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.task_locks.lock().await;
        locks.entry(task_id.to_string()).or_default().clone()
    }

    /// Drop the lock entry once the task can no longer transition.
    async fn forget_lock(&self, task_id: &str) {
        self.task_locks.lock().await.remove(task_id);
    }

    /// Merge one observation. Idempotent: replaying a terminal
    /// observation is a no-op, and a stale one can never regress state.
    pub async fn reconcile(&self, observation: TaskObservation) -> Result<ReconcileOutcome> {
        let lock = self.task_lock(&observation.task_id).await;
        let _guard = lock.lock().await;

        let Some(task) = tasks::get(&self.db, &observation.task_id).await? else {
            // A provider may notify about tasks this instance never
            // created (shared account, restarts); acknowledge quietly
            debug!(task_id = %observation.task_id, "observation for unknown task, ignoring");
            return Ok(ReconcileOutcome::UnknownTask);
        };

        let Some(asset) = assets::get(&self.db, task.asset_id).await? else {
            warn!(task_id = %observation.task_id, asset_id = %task.asset_id, "task row without asset, ignoring");
            return Ok(ReconcileOutcome::UnknownTask);
        };

        if asset.status.is_terminal() {
            debug!(task_id = %observation.task_id, status = asset.status.as_str(), "asset already terminal, ignoring");
            self.forget_lock(&observation.task_id).await;
            return Ok(ReconcileOutcome::AlreadyTerminal);
        }

        match classify_status(&observation.status) {
            TaskPhase::InProgress => {
                let observed = observation.progress.unwrap_or(task.progress);
                tasks::merge_progress(&self.db, &observation.task_id, &observation.status, observed)
                    .await?;
                let progress = observed.clamp(0, 100).max(task.progress);
                debug!(task_id = %observation.task_id, progress, "task in progress");
                Ok(ReconcileOutcome::InProgress { progress })
            }

            TaskPhase::Failed => {
                let detail = observation
                    .error
                    .as_deref()
                    .unwrap_or("external generation failed")
                    .to_string();
                if assets::mark_failed(&self.db, task.asset_id, &detail).await? {
                    tasks::record_failure(&self.db, &observation.task_id, &observation.status, &detail)
                        .await?;
                    info!(task_id = %observation.task_id, asset_id = %task.asset_id, detail = %detail, "external job failed");
                    self.forget_lock(&observation.task_id).await;
                    Ok(ReconcileOutcome::Failed)
                } else {
                    Ok(ReconcileOutcome::AlreadyTerminal)
                }
            }

            TaskPhase::Succeeded => self.commit_success(&task, observation).await,
        }
    }

    /// Materialize the artifacts of a succeeded job and commit the
    /// completed transition. Downloads everything before persisting
    /// anything: an asset is never marked completed over partial files.
    /// Filenames derive from the task id, so a retry overwrites its own
    /// earlier partial writes instead of orphaning them.
    async fn commit_success(
        &self,
        task: &GenerationTask,
        observation: TaskObservation,
    ) -> Result<ReconcileOutcome> {
        let Some(result) = observation.result.clone() else {
            // Succeeded without a result payload (e.g. terse webhook):
            // note the status and wait for an observation carrying URLs
            tasks::merge_progress(&self.db, &observation.task_id, &observation.status, 100).await?;
            debug!(task_id = %observation.task_id, "succeeded without result payload, awaiting artifact URLs");
            return Ok(ReconcileOutcome::RetryLater);
        };

        let downloads = [
            (result.obj_url.as_deref(), format!("{}.obj", task.task_id)),
            (result.fbx_url.as_deref(), format!("{}.fbx", task.task_id)),
            (result.texture_url.as_deref(), format!("{}_texture.png", task.task_id)),
        ];

        let mut fetched: Vec<(String, Vec<u8>)> = Vec::new();
        for (url, filename) in &downloads {
            let Some(url) = url else { continue };
            match self.model_client.fetch_artifact(url).await {
                Ok(bytes) => fetched.push((filename.clone(), bytes)),
                Err(e) => {
                    warn!(task_id = %task.task_id, url = %url, error = %e, "artifact fetch failed, leaving asset processing for retry");
                    return Ok(ReconcileOutcome::RetryLater);
                }
            }
        }

        if fetched.is_empty() {
            warn!(task_id = %task.task_id, "succeeded result referenced no artifacts, awaiting retry");
            return Ok(ReconcileOutcome::RetryLater);
        }

        let mut stored: HashMap<&str, String> = HashMap::new();
        for (filename, bytes) in &fetched {
            match self.storage.persist(StorageTier::Models, filename, bytes).await {
                Ok(name) => {
                    let key = if filename.ends_with(".obj") {
                        "obj"
                    } else if filename.ends_with(".fbx") {
                        "fbx"
                    } else {
                        "texture"
                    };
                    stored.insert(key, name);
                }
                Err(e) => {
                    warn!(task_id = %task.task_id, filename = %filename, error = %e, "artifact persist failed, leaving asset processing for retry");
                    return Ok(ReconcileOutcome::RetryLater);
                }
            }
        }

        let won = assets::mark_model_completed(
            &self.db,
            task.asset_id,
            stored.get("obj").map(String::as_str),
            stored.get("fbx").map(String::as_str),
            stored.get("texture").map(String::as_str),
        )
        .await?;

        if won {
            tasks::record_success(
                &self.db,
                &task.task_id,
                &observation.status,
                result.obj_url.as_deref().or(result.fbx_url.as_deref()),
            )
            .await?;
            info!(task_id = %task.task_id, asset_id = %task.asset_id, files = fetched.len(), "external job completed, artifacts persisted");
            self.forget_lock(&task.task_id).await;
            Ok(ReconcileOutcome::Completed)
        } else {
            // A concurrent reconcile won the terminal transition while we
            // were downloading; our writes landed on the same filenames
            debug!(task_id = %task.task_id, "lost terminal transition race, discarding");
            Ok(ReconcileOutcome::AlreadyTerminal)
        }
    }
}
