//! forge-gen library interface
//!
//! Exposes the application state, router construction, and the service
//! layer for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::GenConfig;
use crate::services::providers::ModelJobClient;
use crate::services::{Storage, TaskReconciler, TierController};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Artifact blob storage
    pub storage: Arc<Storage>,
    /// Tier orchestration
    pub tiers: Arc<TierController>,
    /// External task reconciliation
    pub reconciler: Arc<TaskReconciler>,
    /// Image-to-3D job provider (polled directly by the status endpoint)
    pub model_client: Arc<dyn ModelJobClient>,
    /// Resolved service configuration
    pub config: GenConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: Arc<Storage>,
        tiers: Arc<TierController>,
        reconciler: Arc<TaskReconciler>,
        model_client: Arc<dyn ModelJobClient>,
        config: GenConfig,
    ) -> Self {
        Self {
            db,
            storage,
            tiers,
            reconciler,
            model_client,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router: API routes, static artifact serving,
/// and a permissive CORS layer for the browser frontend.
pub fn build_router(state: AppState) -> Router {
    let storage_root = state.storage.root().to_path_buf();

    Router::new()
        .merge(api::concepts::concept_routes())
        .merge(api::refine::refine_routes())
        .merge(api::prototypes::prototype_routes())
        .merge(api::models::model_routes())
        .merge(api::gallery::gallery_routes())
        .merge(api::health::health_routes())
        .nest_service("/storage", ServeDir::new(storage_root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
