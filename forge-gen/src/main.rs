//! forge-gen - Asset Generation Service
//!
//! Three-tier asset pipeline over HTTP:
//! - Tier 1: 2D concept images (hosted generator with procedural fallback)
//! - Tier 2: 3D prototypes (offline procedural mesh + turntable preview)
//! - Tier 3: high-fidelity final models via an external image-to-3D job
//!   provider, reconciled through polling and webhooks

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forge_gen::config::GenConfig;
use forge_gen::services::providers::{
    HostedImageClient, ImageGenerator, MeshyClient, ModelJobClient, ProceduralImageRenderer,
    ProceduralPrototypeRenderer,
};
use forge_gen::services::{Storage, TaskReconciler, TierController};
use forge_gen::AppState;

#[derive(Debug, Parser)]
#[command(name = "forge-gen", about = "Asset generation service")]
struct Args {
    /// Root data folder (database + artifact storage)
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP port to bind
    #[arg(long, env = "FORGE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Starting forge-gen (asset generation service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the root data folder
    let root_folder = forge_common::config::resolve_root_folder(args.root_folder.as_deref());
    forge_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {e}"))?;
    info!("Root folder: {}", root_folder.display());

    let config = GenConfig::load(&root_folder, args.port);

    // Open or create the database
    let db_path = forge_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db = forge_common::db::init_database(&db_path).await?;

    // Artifact storage tree, served at /storage
    let storage = Arc::new(Storage::init(
        &forge_common::config::storage_root(&root_folder),
        &config.public_base_url,
    )?);

    // Generators in priority order: hosted first when configured, the
    // procedural renderer as the fallback that cannot fail
    let mut image_generators: Vec<Arc<dyn ImageGenerator>> = Vec::new();
    if let Some(hosted) =
        HostedImageClient::new(config.image_api_url.clone(), config.image_api_key.clone())
    {
        info!("Hosted image generator configured");
        image_generators.push(Arc::new(hosted));
    } else {
        info!("No hosted image generator configured, using procedural renderer only");
    }
    image_generators.push(Arc::new(ProceduralImageRenderer::new()));

    let prototype_generator = Arc::new(ProceduralPrototypeRenderer::new());

    let model_client: Arc<dyn ModelJobClient> = Arc::new(
        MeshyClient::new(
            config.model_api_key.clone(),
            Some(config.model_api_url.clone()),
            config.model_webhook_url.clone(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to construct model job client: {e}"))?,
    );
    if !model_client.is_available() {
        info!("Model job provider not configured; tier 3 requests will be rejected");
    }

    let reconciler = Arc::new(TaskReconciler::new(
        db.clone(),
        Arc::clone(&storage),
        Arc::clone(&model_client),
    ));

    let tiers = Arc::new(TierController::new(
        db.clone(),
        Arc::clone(&storage),
        image_generators,
        prototype_generator,
        Arc::clone(&model_client),
        Arc::clone(&reconciler),
        config.clone(),
    ));

    let state = AppState::new(db, storage, tiers, reconciler, model_client, config.clone());
    let app = forge_gen::build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on http://0.0.0.0:{}", config.port);
    info!("Health check: {}/health", config.public_base_url);

    axum::serve(listener, app).await?;

    Ok(())
}
