//! Persistent entity models
//!
//! `AssetRecord` tracks one generated artifact through its lifecycle;
//! `GenerationTask` tracks one external asynchronous job against the
//! provider that will eventually complete that asset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline tier an asset belongs to. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// 2D concept image
    Image2d,
    /// 3D prototype mesh with turntable preview
    Prototype,
    /// High-fidelity final model from the external job provider
    FinalModel,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image2d => "image_2d",
            AssetType::Prototype => "prototype",
            AssetType::FinalModel => "final_model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image_2d" => Some(AssetType::Image2d),
            "prototype" => Some(AssetType::Prototype),
            "final_model" => Some(AssetType::FinalModel),
            _ => None,
        }
    }
}

/// Asset lifecycle state.
///
/// Transitions are strictly `Pending/Processing -> Completed | Failed`;
/// the terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Processing => "processing",
            AssetStatus::Completed => "completed",
            AssetStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssetStatus::Pending),
            "processing" => Some(AssetStatus::Processing),
            "completed" => Some(AssetStatus::Completed),
            "failed" => Some(AssetStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Completed | AssetStatus::Failed)
    }
}

/// One generated artifact at any tier, with its lineage pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub guid: Uuid,
    pub name: String,
    /// Free-text prompt; refined images carry the concatenated
    /// original + refinement text, derived tiers inherit the parent's.
    pub prompt: Option<String>,
    pub asset_type: AssetType,
    pub status: AssetStatus,

    // Artifact locators: bare filenames, resolved against the per-tier
    // storage directory at read time
    pub image_path: Option<String>,
    pub gif_path: Option<String>,
    pub obj_path: Option<String>,
    pub fbx_path: Option<String>,
    pub texture_path: Option<String>,

    /// Parent asset this one was refined or converted from
    pub parent_id: Option<Uuid>,
    /// Externally reachable URL of the 2D concept, required as job input
    /// by the image-to-3D provider
    pub remote_image_url: Option<String>,
    /// External job id, set while a long-running job is in flight
    pub task_id: Option<String>,
    /// Failure detail for failed rows
    pub error_detail: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    /// Build a fresh record in the given state; the guid and timestamps
    /// are assigned here and never change afterwards.
    pub fn new(
        name: String,
        prompt: Option<String>,
        asset_type: AssetType,
        status: AssetStatus,
        parent_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4(),
            name,
            prompt,
            asset_type,
            status,
            image_path: None,
            gif_path: None,
            obj_path: None,
            fbx_path: None,
            texture_path: None,
            parent_id,
            remote_image_url: None,
            task_id: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// External asynchronous job record.
///
/// The provider-native `status` string is stored verbatim for
/// observability; only the reconciler interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub task_id: String,
    pub asset_id: Uuid,
    pub status: String,
    /// 0-100, monotonically non-decreasing under out-of-order updates
    pub progress: i64,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_round_trips() {
        for t in [AssetType::Image2d, AssetType::Prototype, AssetType::FinalModel] {
            assert_eq!(AssetType::parse(t.as_str()), Some(t));
        }
        assert_eq!(AssetType::parse("sprite"), None);
    }

    #[test]
    fn status_round_trips() {
        for s in [
            AssetStatus::Pending,
            AssetStatus::Processing,
            AssetStatus::Completed,
            AssetStatus::Failed,
        ] {
            assert_eq!(AssetStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AssetStatus::parse("queued"), None);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!AssetStatus::Pending.is_terminal());
        assert!(!AssetStatus::Processing.is_terminal());
        assert!(AssetStatus::Completed.is_terminal());
        assert!(AssetStatus::Failed.is_terminal());
    }

    #[test]
    fn new_record_has_no_artifacts() {
        let record = AssetRecord::new(
            "2D Concept - a red sword".to_string(),
            Some("a red sword".to_string()),
            AssetType::Image2d,
            AssetStatus::Processing,
            None,
        );
        assert!(record.image_path.is_none());
        assert!(record.obj_path.is_none());
        assert!(record.task_id.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }
}
