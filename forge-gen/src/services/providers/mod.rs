//! Generator and job-provider boundary traits
//!
//! The tier controller and reconciler only see these traits; concrete
//! clients are constructed at startup and injected, so tests swap in
//! fakes without touching the orchestration code.

pub mod hosted_image;
pub mod meshy;
pub mod procedural;
pub mod prototype_mesh;

pub use hosted_image::HostedImageClient;
pub use meshy::MeshyClient;
pub use procedural::ProceduralImageRenderer;
pub use prototype_mesh::ProceduralPrototypeRenderer;

use thiserror::Error;

/// Provider-level errors, opaque to callers beyond their class.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl From<ProviderError> for forge_common::Error {
    fn from(err: ProviderError) -> Self {
        forge_common::Error::Provider(err.to_string())
    }
}

/// A generated 2D image ready to persist.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// Provider-hosted URL when the provider exposes one; the stored
    /// copy is served over HTTP either way
    pub remote_url: Option<String>,
    pub filename: String,
}

/// One named artifact byte stream.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A generated 3D prototype: mesh plus turntable preview.
#[derive(Debug, Clone)]
pub struct GeneratedPrototype {
    pub obj: Artifact,
    pub gif: Artifact,
}

/// Artifact URLs referenced by a succeeded external job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelArtifacts {
    pub obj_url: Option<String>,
    pub fbx_url: Option<String>,
    pub texture_url: Option<String>,
}

impl ModelArtifacts {
    pub fn is_empty(&self) -> bool {
        self.obj_url.is_none() && self.fbx_url.is_none() && self.texture_url.is_none()
    }
}

/// Snapshot of an external job as last reported by the provider.
#[derive(Debug, Clone)]
pub struct JobStatus {
    /// Provider-native status string, stored verbatim
    pub status: String,
    pub progress: i64,
    pub result: Option<ModelArtifacts>,
    pub error: Option<String>,
}

/// Text-to-image generator (tier 1).
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generator name for logging and health reporting
    fn name(&self) -> &'static str;

    /// Whether the generator can currently serve requests
    fn is_available(&self) -> bool;

    async fn generate(
        &self,
        prompt: &str,
        refinement_notes: Option<&str>,
    ) -> Result<GeneratedImage, ProviderError>;
}

/// Image-to-prototype generator (tier 2).
#[async_trait::async_trait]
pub trait PrototypeGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        image_bytes: &[u8],
        prompt: Option<&str>,
    ) -> Result<GeneratedPrototype, ProviderError>;
}

/// Asynchronous image-to-3D job provider (tier 3).
#[async_trait::async_trait]
pub trait ModelJobClient: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Create a remote job; returns the provider's opaque task id.
    async fn create_job(
        &self,
        image_url: &str,
        name: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Fetch the current status of a job.
    async fn job_status(&self, task_id: &str) -> Result<JobStatus, ProviderError>;

    /// Download one artifact referenced by a succeeded job.
    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}
