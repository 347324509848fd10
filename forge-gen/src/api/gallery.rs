//! Gallery endpoints: browsing, saving, statistics, and deletion

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ArtifactUrls, SuccessResponse};
use crate::db::assets::{self, AssetFilter};
use crate::error::{ApiError, ApiResult};
use crate::services::StorageTier;
use crate::AppState;
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType};

/// Gallery list query: pagination plus type/status filters
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
}

fn default_limit() -> i64 {
    50
}

/// Full gallery item view
#[derive(Debug, Serialize)]
pub struct GalleryItemResponse {
    pub id: Uuid,
    pub name: String,
    pub prompt: Option<String>,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub image_path: Option<String>,
    pub gif_path: Option<String>,
    pub obj_path: Option<String>,
    pub fbx_path: Option<String>,
    pub texture_path: Option<String>,
    pub parent_id: Option<Uuid>,
    pub remote_image_url: Option<String>,
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub urls: ArtifactUrls,
}

impl GalleryItemResponse {
    fn from_record(record: &AssetRecord, state: &AppState) -> Self {
        Self {
            id: record.guid,
            name: record.name.clone(),
            prompt: record.prompt.clone(),
            asset_type: record.asset_type,
            status: record.status,
            image_path: record.image_path.clone(),
            gif_path: record.gif_path.clone(),
            obj_path: record.obj_path.clone(),
            fbx_path: record.fbx_path.clone(),
            texture_path: record.texture_path.clone(),
            parent_id: record.parent_id,
            remote_image_url: record.remote_image_url.clone(),
            task_id: record.task_id.clone(),
            error_detail: record.error_detail.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            urls: ArtifactUrls::for_record(record, &state.storage),
        }
    }
}

/// Gallery list page
#[derive(Debug, Serialize)]
pub struct GalleryListResponse {
    pub items: Vec<GalleryItemResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// POST /gallery/save request
#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub item_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

/// GET /gallery/stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_items: i64,
    pub by_type: std::collections::BTreeMap<String, i64>,
    pub by_status: std::collections::BTreeMap<String, i64>,
}

/// GET /gallery
pub async fn list_gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<GalleryListResponse>> {
    let limit = query.limit.clamp(1, 200);
    let skip = query.skip.max(0);
    let filter = AssetFilter { asset_type: query.asset_type, status: query.status };
    let (records, total) = assets::list(&state.db, &filter, limit, skip).await?;

    Ok(Json(GalleryListResponse {
        items: records.iter().map(|r| GalleryItemResponse::from_record(r, &state)).collect(),
        total,
        skip,
        limit,
    }))
}

/// GET /gallery/stats
pub async fn gallery_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let by_type: std::collections::BTreeMap<String, i64> =
        assets::counts_by_type(&state.db).await?.into_iter().collect();
    let by_status: std::collections::BTreeMap<String, i64> =
        assets::counts_by_status(&state.db).await?.into_iter().collect();
    let total_items = by_type.values().sum();

    Ok(Json(StatsResponse { total_items, by_type, by_status }))
}

/// GET /gallery/{id}
pub async fn get_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GalleryItemResponse>> {
    let record = assets::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("gallery item {id}")))?;

    Ok(Json(GalleryItemResponse::from_record(&record, &state)))
}

/// POST /gallery/save
///
/// Keep an item in the gallery under an optional new name.
pub async fn save_to_gallery(
    State(state): State<AppState>,
    Json(request): Json<SaveRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    if let Some(name) = &request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }
        if !assets::rename(&state.db, request.item_id, name).await? {
            return Err(ApiError::NotFound(format!("gallery item {}", request.item_id)));
        }
    } else if assets::get(&state.db, request.item_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("gallery item {}", request.item_id)));
    }

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("item {} saved to gallery", request.item_id),
    }))
}

/// DELETE /gallery/{id}
///
/// Two-phase delete: best-effort removal of every artifact file first,
/// then the row (task rows cascade with it). Individual file misses are
/// logged, never fatal; storage and the record store are not
/// transactional with each other.
pub async fn delete_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let record = assets::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("gallery item {id}")))?;

    for (tier, filename) in artifact_files(&record) {
        if !state.storage.delete(tier, filename).await {
            warn!(asset_id = %id, filename, "artifact file missing or undeletable during delete");
        }
    }

    assets::delete(&state.db, id).await?;
    info!(asset_id = %id, "gallery item deleted");

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("gallery item {id} deleted"),
    }))
}

/// Map an asset's artifact columns onto their storage tiers.
fn artifact_files(record: &AssetRecord) -> Vec<(StorageTier, &str)> {
    let mut files = Vec::new();
    if let Some(path) = record.image_path.as_deref() {
        files.push((StorageTier::Images, path));
    }
    if let Some(path) = record.gif_path.as_deref() {
        files.push((StorageTier::Prototypes, path));
    }
    if let Some(path) = record.obj_path.as_deref() {
        let tier = match record.asset_type {
            AssetType::Prototype => StorageTier::Prototypes,
            _ => StorageTier::Models,
        };
        files.push((tier, path));
    }
    if let Some(path) = record.fbx_path.as_deref() {
        files.push((StorageTier::Models, path));
    }
    if let Some(path) = record.texture_path.as_deref() {
        files.push((StorageTier::Models, path));
    }
    files
}

/// Build gallery routes
pub fn gallery_routes() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(list_gallery))
        .route("/gallery/stats", get(gallery_stats))
        .route("/gallery/save", post(save_to_gallery))
        .route("/gallery/:id", get(get_gallery_item).delete(delete_gallery_item))
}
