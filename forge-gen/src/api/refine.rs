//! 2D refinement endpoints: iterative refinement, batch variants, and
//! version history

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::concepts::ImageResponse;
use crate::error::ApiResult;
use crate::services::lineage;
use crate::AppState;

const MAX_BATCH_VARIANTS: usize = 5;

/// POST /refine/2d request
#[derive(Debug, Deserialize)]
pub struct RefineImageRequest {
    pub image_id: Uuid,
    pub refinement_text: String,
}

/// POST /refine/2d/batch request
#[derive(Debug, Deserialize)]
pub struct BatchRefineRequest {
    pub image_id: Uuid,
    pub refinement_texts: Vec<String>,
}

/// One failed variant in a batch response
#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub refinement_text: String,
    pub error: String,
}

/// POST /refine/2d/batch response
#[derive(Debug, Serialize)]
pub struct BatchRefineResponse {
    pub successful: Vec<ImageResponse>,
    pub failed: Vec<BatchFailure>,
    pub total_requested: usize,
    pub total_successful: usize,
}

/// GET /refine/2d/{id}/history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub root_id: Uuid,
    pub current_id: Uuid,
    pub history: Vec<ImageResponse>,
    pub total_versions: usize,
}

/// POST /refine/2d
///
/// Create a refined version of an existing concept. The new record points
/// back at its source via `parent_id`.
pub async fn refine_image(
    State(state): State<AppState>,
    Json(request): Json<RefineImageRequest>,
) -> ApiResult<Json<ImageResponse>> {
    let record = state
        .tiers
        .refine_concept(request.image_id, &request.refinement_text)
        .await?;

    Ok(Json(ImageResponse::from_record(&record, &state.storage)))
}

/// POST /refine/2d/batch
///
/// Generate several refinement variants in one call; each variant
/// succeeds or fails independently.
pub async fn batch_refine(
    State(state): State<AppState>,
    Json(request): Json<BatchRefineRequest>,
) -> ApiResult<Json<BatchRefineResponse>> {
    if request.refinement_texts.len() > MAX_BATCH_VARIANTS {
        return Err(crate::error::ApiError::BadRequest(format!(
            "at most {MAX_BATCH_VARIANTS} variants can be generated at once"
        )));
    }

    let total_requested = request.refinement_texts.len();
    let mut successful = Vec::new();
    let mut failed = Vec::new();

    for refinement_text in request.refinement_texts {
        match state.tiers.refine_concept(request.image_id, &refinement_text).await {
            Ok(record) => successful.push(ImageResponse::from_record(&record, &state.storage)),
            Err(e) => failed.push(BatchFailure { refinement_text, error: e.to_string() }),
        }
    }

    let total_successful = successful.len();
    Ok(Json(BatchRefineResponse { successful, failed, total_requested, total_successful }))
}

/// GET /refine/2d/{id}/history
///
/// Full version history for any asset in a refinement chain: the chain is
/// resolved up to its root and flattened in creation order.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HistoryResponse>> {
    let chain = lineage::resolve_lineage(&state.db, id).await?;

    Ok(Json(HistoryResponse {
        root_id: chain.root_id,
        current_id: chain.requested_id,
        history: chain
            .history
            .iter()
            .map(|r| ImageResponse::from_record(r, &state.storage))
            .collect(),
        total_versions: chain.version_count,
    }))
}

/// Build refinement routes
pub fn refine_routes() -> Router<AppState> {
    Router::new()
        .route("/refine/2d", post(refine_image))
        .route("/refine/2d/batch", post(batch_refine))
        .route("/refine/2d/:id/history", get(get_history))
}
