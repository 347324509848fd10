//! HTTP API handlers

pub mod concepts;
pub mod gallery;
pub mod health;
pub mod models;
pub mod prototypes;
pub mod refine;

use crate::services::{Storage, StorageTier};
use forge_common::db::models::{AssetRecord, AssetType};
use serde::{Deserialize, Serialize};

/// Pagination query parameters shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListQuery {
    /// Clamp to sane bounds before hitting the database.
    pub fn bounded(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.skip.max(0))
    }
}

/// Public download URLs for whichever artifacts an asset carries.
#[derive(Debug, Default, Serialize)]
pub struct ArtifactUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obj_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbx_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_url: Option<String>,
}

impl ArtifactUrls {
    /// Resolve an asset's filenames against the per-tier storage mounts.
    /// Prototype meshes live under the prototypes directory; final-model
    /// files under the models directory.
    pub fn for_record(record: &AssetRecord, storage: &Storage) -> Self {
        let obj_tier = match record.asset_type {
            AssetType::Prototype => StorageTier::Prototypes,
            _ => StorageTier::Models,
        };
        Self {
            image_url: record
                .image_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Images, f)),
            gif_url: record
                .gif_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Prototypes, f)),
            obj_url: record.obj_path.as_deref().map(|f| storage.url_for(obj_tier, f)),
            fbx_url: record
                .fbx_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Models, f)),
            texture_url: record
                .texture_path
                .as_deref()
                .map(|f| storage.url_for(StorageTier::Models, f)),
        }
    }
}

/// Generic success acknowledgment.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}
