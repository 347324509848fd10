//! Final model endpoints: job creation, status polling, and the inbound
//! webhook receiver
//!
//! Polling and webhook delivery are independent triggers feeding the same
//! reconciler; either may arrive first, late, repeatedly, or not at all.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::api::ListQuery;
use crate::db::{assets, tasks};
use crate::db::assets::AssetFilter;
use crate::error::{ApiError, ApiResult};
use crate::services::providers::meshy::parse_result_payload;
use crate::services::reconciler::{ReconcileOutcome, TaskObservation};
use crate::services::{Storage, StorageTier};
use crate::AppState;
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType, GenerationTask};

/// POST /generate/model request
#[derive(Debug, Deserialize)]
pub struct GenerateModelRequest {
    pub prototype_id: Uuid,
}

/// Task status response shared by job creation and polling
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub asset_id: Uuid,
    pub status: String,
    pub progress: i64,
    pub asset_status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskStatusResponse {
    fn new(task: &GenerationTask, asset: &AssetRecord) -> Self {
        Self {
            task_id: task.task_id.clone(),
            asset_id: task.asset_id,
            status: task.status.clone(),
            progress: task.progress,
            asset_status: asset.status,
            result_url: task.result_url.clone(),
            error_message: task.error_message.clone(),
        }
    }
}

/// Inbound webhook payload pushed by the job provider
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response for completed final models
#[derive(Debug, Serialize)]
pub struct FinalModelResponse {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub obj_url: Option<String>,
    pub fbx_url: Option<String>,
    pub texture_url: Option<String>,
    pub task_id: Option<String>,
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FinalModelResponse {
    fn from_record(record: &AssetRecord, storage: &Storage) -> Self {
        Self {
            id: record.guid,
            name: record.name.clone(),
            parent_id: record.parent_id,
            obj_url: record.obj_path.as_deref().map(|f| storage.url_for(StorageTier::Models, f)),
            fbx_url: record.fbx_path.as_deref().map(|f| storage.url_for(StorageTier::Models, f)),
            texture_url: record
                .texture_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Models, f)),
            task_id: record.task_id.clone(),
            status: record.status,
            error_detail: record.error_detail.clone(),
            created_at: record.created_at,
        }
    }
}

/// List page of final models
#[derive(Debug, Serialize)]
pub struct FinalModelListResponse {
    pub items: Vec<FinalModelResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// POST /generate/model
///
/// Create an external image-to-3D job for a prototype. Returns
/// immediately with the task handle; completion arrives via polling or
/// webhook.
pub async fn generate_model(
    State(state): State<AppState>,
    Json(request): Json<GenerateModelRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let (record, task) = state.tiers.generate_final_model(request.prototype_id).await?;
    Ok(Json(TaskStatusResponse::new(&task, &record)))
}

/// GET /generate/model/task/{task_id}
///
/// Poll a job: fetch the provider's current view, reconcile it into local
/// state, and return the merged record. A provider transport failure is
/// logged and the last known local state is served instead.
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task = tasks::get(&state.db, &task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    let asset = assets::get(&state.db, task.asset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("asset for task {task_id}")))?;

    if !asset.status.is_terminal() {
        match state.model_client.job_status(&task_id).await {
            Ok(status) => {
                let observation = TaskObservation {
                    task_id: task_id.clone(),
                    status: status.status,
                    progress: Some(status.progress),
                    result: status.result,
                    error: status.error,
                };
                state.reconciler.reconcile(observation).await?;
            }
            Err(e) => {
                // Transient provider trouble never fails the poll; the
                // client re-polls and the task stays processing
                warn!(task_id = %task_id, error = %e, "provider poll failed, serving last known state");
            }
        }
    }

    let task = tasks::get(&state.db, &task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    let asset = assets::get(&state.db, task.asset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("asset for task {task_id}")))?;

    Ok(Json(TaskStatusResponse::new(&task, &asset)))
}

/// POST /generate/model/webhook
///
/// Inbound completion notification from the job provider. Always
/// acknowledged with 200: unknown task ids are ignored (a shared provider
/// account may notify about jobs this instance never created), and
/// internal trouble is reported in the body so the provider does not
/// retry forever.
pub async fn model_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Json<serde_json::Value> {
    let result = payload
        .result
        .as_ref()
        .map(parse_result_payload)
        .filter(|artifacts| !artifacts.is_empty());

    let observation = TaskObservation {
        task_id: payload.task_id.clone(),
        status: payload.status,
        progress: payload.progress,
        result,
        error: payload.error,
    };

    match state.reconciler.reconcile(observation).await {
        Ok(ReconcileOutcome::UnknownTask) => Json(serde_json::json!({
            "status": "ignored",
            "reason": "task not found",
        })),
        Ok(outcome) => Json(serde_json::json!({
            "status": "processed",
            "task_id": payload.task_id,
            "outcome": outcome.label(),
        })),
        Err(e) => {
            warn!(task_id = %payload.task_id, error = %e, "webhook reconciliation failed");
            Json(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            }))
        }
    }
}

/// GET /generate/model/{id}
pub async fn get_final_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FinalModelResponse>> {
    let record = assets::get_typed(&state.db, id, AssetType::FinalModel)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("final model {id}")))?;

    Ok(Json(FinalModelResponse::from_record(&record, &state.storage)))
}

/// GET /generate/model
pub async fn list_final_models(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<FinalModelListResponse>> {
    let (limit, skip) = query.bounded();
    let filter = AssetFilter { asset_type: Some(AssetType::FinalModel), status: None };
    let (records, total) = assets::list(&state.db, &filter, limit, skip).await?;

    Ok(Json(FinalModelListResponse {
        items: records
            .iter()
            .map(|r| FinalModelResponse::from_record(r, &state.storage))
            .collect(),
        total,
        skip,
        limit,
    }))
}

/// Build final model routes
pub fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/generate/model", post(generate_model).get(list_final_models))
        .route("/generate/model/task/:task_id", get(get_task_status))
        .route("/generate/model/webhook", post(model_webhook))
        .route("/generate/model/:id", get(get_final_model))
}
