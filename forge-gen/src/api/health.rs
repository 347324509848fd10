//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Database reachability
    pub database: String,
    /// Image generators in priority order
    pub image_generators: Vec<ProviderHealth>,
    /// Image-to-3D job provider
    pub model_provider: ProviderHealth,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub available: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => "healthy".to_string(),
        Err(e) => format!("unhealthy: {e}"),
    };

    let image_generators: Vec<ProviderHealth> = state
        .tiers
        .image_generators()
        .iter()
        .map(|g| ProviderHealth { name: g.name().to_string(), available: g.is_available() })
        .collect();

    let model_provider = ProviderHealth {
        name: state.model_client.name().to_string(),
        available: state.model_client.is_available(),
    };

    let status = if database == "healthy" { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        service: "forge-gen".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        database,
        image_generators,
        model_provider,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
