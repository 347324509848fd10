//! 2D concept generation endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ListQuery;
use crate::db::assets::{self, AssetFilter};
use crate::error::{ApiError, ApiResult};
use crate::services::{Storage, StorageTier};
use crate::AppState;
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType};

/// POST /generate/2d request
#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub refinement_notes: Option<String>,
}

/// Response for 2D image operations
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub name: String,
    pub prompt: Option<String>,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
    pub parent_id: Option<Uuid>,
    pub status: AssetStatus,
    pub created_at: DateTime<Utc>,
}

impl ImageResponse {
    pub fn from_record(record: &AssetRecord, storage: &Storage) -> Self {
        Self {
            id: record.guid,
            name: record.name.clone(),
            prompt: record.prompt.clone(),
            image_url: record
                .image_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Images, f)),
            image_path: record.image_path.clone(),
            parent_id: record.parent_id,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// List page of 2D images
#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub items: Vec<ImageResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// POST /generate/2d
///
/// Generate a 2D concept image from a text prompt. Falls back from the
/// hosted generator to the procedural renderer, so a valid prompt always
/// yields a completed record.
pub async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> ApiResult<Json<ImageResponse>> {
    let record = state
        .tiers
        .generate_concept(&request.prompt, request.refinement_notes.as_deref())
        .await?;

    Ok(Json(ImageResponse::from_record(&record, &state.storage)))
}

/// GET /generate/2d/{id}
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImageResponse>> {
    let record = assets::get_typed(&state.db, id, AssetType::Image2d)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("image {id}")))?;

    Ok(Json(ImageResponse::from_record(&record, &state.storage)))
}

/// GET /generate/2d
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ImageListResponse>> {
    let (limit, skip) = query.bounded();
    let filter = AssetFilter { asset_type: Some(AssetType::Image2d), status: None };
    let (records, total) = assets::list(&state.db, &filter, limit, skip).await?;

    Ok(Json(ImageListResponse {
        items: records
            .iter()
            .map(|r| ImageResponse::from_record(r, &state.storage))
            .collect(),
        total,
        skip,
        limit,
    }))
}

/// Build 2D concept routes
pub fn concept_routes() -> Router<AppState> {
    Router::new()
        .route("/generate/2d", post(generate_image).get(list_images))
        .route("/generate/2d/:id", get(get_image))
}
