//! 3D prototype generation endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::assets::{self, AssetFilter};
use crate::error::{ApiError, ApiResult};
use crate::services::{Storage, StorageTier};
use crate::AppState;
use forge_common::db::models::{AssetRecord, AssetStatus, AssetType};

/// POST /generate/prototype request
#[derive(Debug, Deserialize)]
pub struct GeneratePrototypeRequest {
    pub image_id: Uuid,
}

/// Prototype list query: pagination plus an optional status filter
#[derive(Debug, Deserialize)]
pub struct PrototypeListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub status: Option<AssetStatus>,
}

fn default_limit() -> i64 {
    50
}

/// Response for prototype operations
#[derive(Debug, Serialize)]
pub struct PrototypeResponse {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub gif_url: Option<String>,
    pub obj_url: Option<String>,
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PrototypeResponse {
    pub fn from_record(record: &AssetRecord, storage: &Storage) -> Self {
        Self {
            id: record.guid,
            name: record.name.clone(),
            parent_id: record.parent_id,
            gif_url: record
                .gif_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Prototypes, f)),
            obj_url: record
                .obj_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Prototypes, f)),
            status: record.status,
            error_detail: record.error_detail.clone(),
            created_at: record.created_at,
        }
    }
}

/// List page of prototypes
#[derive(Debug, Serialize)]
pub struct PrototypeListResponse {
    pub items: Vec<PrototypeResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// POST /generate/prototype
///
/// Convert a 2D concept into a 3D prototype (mesh + turntable preview).
/// Synchronous: the response carries the terminal state.
pub async fn generate_prototype(
    State(state): State<AppState>,
    Json(request): Json<GeneratePrototypeRequest>,
) -> ApiResult<Json<PrototypeResponse>> {
    let record = state.tiers.generate_prototype(request.image_id).await?;
    Ok(Json(PrototypeResponse::from_record(&record, &state.storage)))
}

/// GET /generate/prototype/{id}
pub async fn get_prototype(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PrototypeResponse>> {
    let record = assets::get_typed(&state.db, id, AssetType::Prototype)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("prototype {id}")))?;

    Ok(Json(PrototypeResponse::from_record(&record, &state.storage)))
}

/// GET /generate/prototype
pub async fn list_prototypes(
    State(state): State<AppState>,
    Query(query): Query<PrototypeListQuery>,
) -> ApiResult<Json<PrototypeListResponse>> {
    let limit = query.limit.clamp(1, 200);
    let skip = query.skip.max(0);
    let filter = AssetFilter { asset_type: Some(AssetType::Prototype), status: query.status };
    let (records, total) = assets::list(&state.db, &filter, limit, skip).await?;

    Ok(Json(PrototypeListResponse {
        items: records
            .iter()
            .map(|r| PrototypeResponse::from_record(r, &state.storage))
            .collect(),
        total,
        skip,
        limit,
    }))
}

/// Build prototype routes
pub fn prototype_routes() -> Router<AppState> {
    Router::new()
        .route("/generate/prototype", post(generate_prototype).get(list_prototypes))
        .route("/generate/prototype/:id", get(get_prototype))
}
